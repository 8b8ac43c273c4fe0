use serde::Serialize;
use smol_str::SmolStr;

pub use hql_lexer::Span;

// ── S-expressions ─────────────────────────────────────────────────

/// Surface syntax tree. Every node carries a mandatory byte span; line and
/// column positions are derived through [`LineIndex`] at the diagnostics
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    /// Bare symbol, including dotted references like `a.b`.
    Symbol { name: SmolStr, span: Span },
    /// Named-parameter tag: `name:`. Never resolved as a reference.
    Tag { name: SmolStr, span: Span },
    /// Parenthesized list: `(...)`.
    List { elems: Vec<SExp>, span: Span },
    /// Vector literal: `[...]`.
    Vector { elems: Vec<SExp>, span: Span },
    /// Map literal: `{...}`, alternating keys and values.
    Map { elems: Vec<SExp>, span: Span },
    /// Set literal: `#[...]`.
    Set { elems: Vec<SExp>, span: Span },
    /// String literal, split into text and `\(expr)` interpolation segments.
    Str { segments: Vec<StrSegment>, span: Span },
    Int { value: i64, span: Span },
    Float { value: f64, span: Span },
    Bool { value: bool, span: Span },
    Nil { span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrSegment {
    /// Literal text with escape sequences already decoded.
    Text(String),
    /// An interpolation group: the expressions inside `\(...)`.
    Interp(Vec<SExp>),
}

impl SExp {
    pub fn span(&self) -> Span {
        match self {
            SExp::Symbol { span, .. }
            | SExp::Tag { span, .. }
            | SExp::List { span, .. }
            | SExp::Vector { span, .. }
            | SExp::Map { span, .. }
            | SExp::Set { span, .. }
            | SExp::Str { span, .. }
            | SExp::Int { span, .. }
            | SExp::Float { span, .. }
            | SExp::Bool { span, .. }
            | SExp::Nil { span } => *span,
        }
    }

    /// If this is a symbol, return its name.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            SExp::Symbol { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_symbol(&self, expected: &str) -> bool {
        matches!(self, SExp::Symbol { name, .. } if name.as_str() == expected)
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List { elems, .. } => Some(elems),
            _ => None,
        }
    }

    /// Head symbol of a list form, if any.
    pub fn head_symbol(&self) -> Option<&str> {
        self.as_list()?.first()?.as_symbol()
    }

    /// Structural equality ignoring spans. Used by the round-trip and
    /// idempotent-expansion properties.
    pub fn same_shape(&self, other: &SExp) -> bool {
        match (self, other) {
            (SExp::Symbol { name: a, .. }, SExp::Symbol { name: b, .. }) => a == b,
            (SExp::Tag { name: a, .. }, SExp::Tag { name: b, .. }) => a == b,
            (SExp::Int { value: a, .. }, SExp::Int { value: b, .. }) => a == b,
            (SExp::Float { value: a, .. }, SExp::Float { value: b, .. }) => a == b,
            (SExp::Bool { value: a, .. }, SExp::Bool { value: b, .. }) => a == b,
            (SExp::Nil { .. }, SExp::Nil { .. }) => true,
            (SExp::Str { segments: a, .. }, SExp::Str { segments: b, .. }) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| match (x, y) {
                        (StrSegment::Text(t), StrSegment::Text(u)) => t == u,
                        (StrSegment::Interp(xs), StrSegment::Interp(ys)) => {
                            xs.len() == ys.len()
                                && xs.iter().zip(ys).all(|(m, n)| m.same_shape(n))
                        }
                        _ => false,
                    })
            }
            (SExp::List { elems: a, .. }, SExp::List { elems: b, .. })
            | (SExp::Vector { elems: a, .. }, SExp::Vector { elems: b, .. })
            | (SExp::Map { elems: a, .. }, SExp::Map { elems: b, .. })
            | (SExp::Set { elems: a, .. }, SExp::Set { elems: b, .. }) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            _ => false,
        }
    }
}

// ── Canonical printer ─────────────────────────────────────────────

/// Render a form back to canonical source text. Whitespace-insensitive
/// round-trip: `parse(print(form))` is structurally equal to `form`.
pub fn print_sexp(sexp: &SExp) -> String {
    let mut buf = String::new();
    write_sexp(sexp, &mut buf);
    buf
}

/// Render a whole toplevel, one form per line.
pub fn print_toplevel(sexprs: &[SExp]) -> String {
    let mut buf = String::new();
    for (i, sexp) in sexprs.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        write_sexp(sexp, &mut buf);
    }
    buf
}

fn write_sexp(sexp: &SExp, buf: &mut String) {
    match sexp {
        SExp::Symbol { name, .. } => buf.push_str(name),
        SExp::Tag { name, .. } => {
            buf.push_str(name);
            buf.push(':');
        }
        SExp::List { elems, .. } => write_seq(elems, "(", ")", buf),
        SExp::Vector { elems, .. } => write_seq(elems, "[", "]", buf),
        SExp::Map { elems, .. } => write_seq(elems, "{", "}", buf),
        SExp::Set { elems, .. } => write_seq(elems, "#[", "]", buf),
        SExp::Str { segments, .. } => {
            buf.push('"');
            for seg in segments {
                match seg {
                    StrSegment::Text(text) => {
                        for c in text.chars() {
                            match c {
                                '\n' => buf.push_str("\\n"),
                                '\t' => buf.push_str("\\t"),
                                '\r' => buf.push_str("\\r"),
                                '\\' => buf.push_str("\\\\"),
                                '"' => buf.push_str("\\\""),
                                '\0' => buf.push_str("\\0"),
                                c => buf.push(c),
                            }
                        }
                    }
                    StrSegment::Interp(exprs) => {
                        buf.push_str("\\(");
                        for (i, e) in exprs.iter().enumerate() {
                            if i > 0 {
                                buf.push(' ');
                            }
                            write_sexp(e, buf);
                        }
                        buf.push(')');
                    }
                }
            }
            buf.push('"');
        }
        SExp::Int { value, .. } => buf.push_str(&value.to_string()),
        SExp::Float { value, .. } => {
            if value.fract() == 0.0 && value.is_finite() {
                buf.push_str(&format!("{:.1}", value));
            } else {
                buf.push_str(&format!("{}", value));
            }
        }
        SExp::Bool { value, .. } => buf.push_str(if *value { "true" } else { "false" }),
        SExp::Nil { .. } => buf.push_str("nil"),
    }
}

fn write_seq(elems: &[SExp], open: &str, close: &str, buf: &mut String) {
    buf.push_str(open);
    for (i, e) in elems.iter().enumerate() {
        if i > 0 {
            buf.push(' ');
        }
        write_sexp(e, buf);
    }
    buf.push_str(close);
}

// ── Diagnostics ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

/// A staged diagnostic: span-addressed, merged into host-facing line/column
/// records by the analysis pipeline.
#[derive(Debug, Clone)]
pub struct Diag {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diag {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Diag {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Diag {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn hint(message: impl Into<String>, span: Span) -> Self {
        Diag {
            severity: Severity::Hint,
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for Diag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}:{}] {:?}: {}",
            self.span.start, self.span.end, self.severity, self.message
        )
    }
}

// ── Line index ────────────────────────────────────────────────────

/// A 1-indexed line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets (the compiler's span currency) to 1-indexed
/// line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line.
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        LineIndex { line_starts }
    }

    pub fn pos(&self, offset: u32) -> Pos {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next_line) => next_line - 1,
        };
        let line_start = self.line_starts[line];
        Pos {
            line: line as u32 + 1,
            column: offset - line_start + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> SExp {
        SExp::Symbol {
            name: name.into(),
            span: Span::new(0, 0),
        }
    }

    #[test]
    fn print_list() {
        let form = SExp::List {
            elems: vec![
                sym("+"),
                SExp::Int {
                    value: 1,
                    span: Span::new(0, 0),
                },
                SExp::Int {
                    value: 2,
                    span: Span::new(0, 0),
                },
            ],
            span: Span::new(0, 0),
        };
        assert_eq!(print_sexp(&form), "(+ 1 2)");
    }

    #[test]
    fn print_string_with_interpolation() {
        let form = SExp::Str {
            segments: vec![
                StrSegment::Text("hi ".into()),
                StrSegment::Interp(vec![sym("name")]),
                StrSegment::Text("!".into()),
            ],
            span: Span::new(0, 0),
        };
        assert_eq!(print_sexp(&form), "\"hi \\(name)!\"");
    }

    #[test]
    fn print_set_literal() {
        let form = SExp::Set {
            elems: vec![
                SExp::Int {
                    value: 1,
                    span: Span::new(0, 0),
                },
                SExp::Int {
                    value: 2,
                    span: Span::new(0, 0),
                },
            ],
            span: Span::new(0, 0),
        };
        assert_eq!(print_sexp(&form), "#[1 2]");
    }

    #[test]
    fn same_shape_ignores_spans() {
        let a = SExp::Symbol {
            name: "x".into(),
            span: Span::new(0, 1),
        };
        let b = SExp::Symbol {
            name: "x".into(),
            span: Span::new(10, 11),
        };
        assert!(a.same_shape(&b));
    }

    #[test]
    fn line_index_is_one_indexed() {
        let idx = LineIndex::new("abc\ndef");
        assert_eq!(idx.pos(0), Pos { line: 1, column: 1 });
        assert_eq!(idx.pos(2), Pos { line: 1, column: 3 });
        assert_eq!(idx.pos(4), Pos { line: 2, column: 1 });
        assert_eq!(idx.pos(6), Pos { line: 2, column: 3 });
    }

    #[test]
    fn line_index_empty_text() {
        let idx = LineIndex::new("");
        assert_eq!(idx.pos(0), Pos { line: 1, column: 1 });
    }
}
