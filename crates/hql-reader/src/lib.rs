use hql_ast::{LineIndex, SExp, Span, StrSegment};
use hql_lexer::{lex, Token};
use smol_str::SmolStr;

/// A structured parse error with a 1-indexed source position.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Strict parse: the first malformed form aborts with a structured error.
pub fn parse(source: &str) -> Result<Vec<SExp>, ParseError> {
    let (sexprs, errors) = run(source, false);
    match errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(sexprs),
    }
}

/// Tolerant parse: malformed fragments are absorbed as opaque symbols or
/// truncated lists and parsing continues. Diagnostics keep running while
/// the user is mid-edit, so this never fails.
pub fn parse_tolerant(source: &str) -> (Vec<SExp>, Vec<ParseError>) {
    run(source, true)
}

fn run(source: &str, tolerant: bool) -> (Vec<SExp>, Vec<ParseError>) {
    let line_index = LineIndex::new(source);
    let (sexprs, raw_errors) = read_fragment(source, 0, tolerant);
    let errors = raw_errors
        .into_iter()
        .map(|e| {
            let pos = line_index.pos(e.span.start);
            ParseError {
                message: e.message,
                span: e.span,
                line: pos.line,
                column: pos.column,
            }
        })
        .collect();
    (sexprs, errors)
}

struct RawError {
    message: String,
    span: Span,
}

/// Lex and read a source fragment, shifting all spans by `base`. Used for
/// the whole document (base 0) and for `\(...)` interpolation groups.
fn read_fragment(source: &str, base: u32, tolerant: bool) -> (Vec<SExp>, Vec<RawError>) {
    let (mut tokens, lex_errors) = lex(source);
    let mut items: Vec<Item> = Vec::new();

    let mut errors: Vec<RawError> = Vec::new();
    for err in &lex_errors {
        let span = shift(err.span, base);
        errors.push(RawError {
            message: err.message.to_string(),
            span,
        });
        // Absorb the bad slice as an opaque symbol so analysis keeps running.
        let raw = &source[err.span.start as usize..err.span.end as usize];
        items.push(Item::Opaque(SmolStr::new(raw), span));
    }
    for (token, span) in tokens.drain(..) {
        items.push(Item::Token(token, shift(span, base)));
    }
    items.sort_by_key(|item| item.span().start);

    let mut reader = Reader {
        items,
        pos: 0,
        errors,
        tolerant,
        end: base + source.len() as u32,
        open: Vec::new(),
    };
    let mut result = Vec::new();
    while !reader.at_end() {
        if let Some(sexp) = reader.read_toplevel() {
            result.push(sexp);
        }
        if !tolerant && !reader.errors.is_empty() {
            break;
        }
    }
    (result, reader.errors)
}

fn shift(span: Span, base: u32) -> Span {
    Span::new(span.start + base, span.end + base)
}

enum Item {
    Token(Token, Span),
    /// A lexically invalid slice, kept so tolerant mode can absorb it.
    Opaque(SmolStr, Span),
}

impl Item {
    fn span(&self) -> Span {
        match self {
            Item::Token(_, s) | Item::Opaque(_, s) => *s,
        }
    }
}

struct Reader {
    items: Vec<Item>,
    pos: usize,
    errors: Vec<RawError>,
    tolerant: bool,
    /// End-of-fragment offset, used for end-of-document error positions.
    end: u32,
    /// Closers of the currently open sequences, innermost last.
    open: Vec<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Paren,
    Bracket,
    Brace,
}

impl Delim {
    fn closer(self) -> Token {
        match self {
            Delim::Paren => Token::RParen,
            Delim::Bracket => Token::RBracket,
            Delim::Brace => Token::RBrace,
        }
    }

    fn open_str(self) -> &'static str {
        match self {
            Delim::Paren => "(",
            Delim::Bracket => "[",
            Delim::Brace => "{",
        }
    }
}

impl Reader {
    fn at_end(&self) -> bool {
        self.pos >= self.items.len()
    }

    fn peek(&self) -> Option<&Item> {
        self.items.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        match self.peek() {
            Some(Item::Token(t, _)) => Some(t),
            _ => None,
        }
    }

    fn advance(&mut self) -> &Item {
        let item = &self.items[self.pos];
        self.pos += 1;
        item
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(RawError {
            message: message.into(),
            span,
        });
    }

    fn read_toplevel(&mut self) -> Option<SExp> {
        if let Some(Item::Token(t @ (Token::RParen | Token::RBracket | Token::RBrace), _)) =
            self.peek()
        {
            // Stray closer at toplevel.
            let text = closer_text(t);
            let span = self.peek().map(|i| i.span()).unwrap_or(Span::new(0, 0));
            self.advance();
            self.error(format!("unmatched '{}'", text), span);
            return None;
        }
        self.read_sexp()
    }

    fn read_sexp(&mut self) -> Option<SExp> {
        let item = self.peek()?;
        let span = item.span();
        match item {
            Item::Opaque(raw, span) => {
                let node = SExp::Symbol {
                    name: raw.clone(),
                    span: *span,
                };
                self.advance();
                Some(node)
            }
            Item::Token(token, _) => match token {
                Token::LParen => self.read_seq(Delim::Paren),
                Token::LBracket => self.read_seq(Delim::Bracket),
                Token::LBrace => self.read_seq(Delim::Brace),
                Token::HashBracket => self.read_set(),
                Token::RParen | Token::RBracket | Token::RBrace => {
                    // Handled by the enclosing sequence or toplevel loop.
                    None
                }
                Token::Int(value) => {
                    let value = *value;
                    self.advance();
                    Some(SExp::Int { value, span })
                }
                Token::Float(value) => {
                    let value = *value;
                    self.advance();
                    Some(SExp::Float { value, span })
                }
                Token::True => {
                    self.advance();
                    Some(SExp::Bool { value: true, span })
                }
                Token::False => {
                    self.advance();
                    Some(SExp::Bool { value: false, span })
                }
                Token::Nil => {
                    self.advance();
                    Some(SExp::Nil { span })
                }
                Token::Str(raw) => {
                    let raw = raw.clone();
                    self.advance();
                    let (segments, mut errs) =
                        decode_string(&raw, span.start + 1, self.tolerant);
                    self.errors.append(&mut errs);
                    Some(SExp::Str { segments, span })
                }
                Token::NamedParam(name) => {
                    let name = name.clone();
                    self.advance();
                    Some(SExp::Tag { name, span })
                }
                Token::Colon => {
                    self.advance();
                    Some(SExp::Symbol {
                        name: SmolStr::new(":"),
                        span,
                    })
                }
                Token::Symbol(name) => {
                    let name = name.clone();
                    self.advance();
                    Some(SExp::Symbol { name, span })
                }
            },
        }
    }

    /// Read a delimited sequence. Handles the three unmatched-delimiter edge
    /// cases: a wrong closer truncates the current list (tolerant) or errors
    /// at that delimiter (strict); EOF errors at end-of-document (strict) or
    /// at the opening delimiter (tolerant), leaving the list open.
    fn read_seq(&mut self, delim: Delim) -> Option<SExp> {
        let open_span = self.peek().map(|i| i.span()).unwrap_or(Span::new(0, 0));
        self.advance();
        let closer = delim.closer();
        self.open.push(delim.closer());

        let mut elems = Vec::new();
        loop {
            if self.at_end() {
                let at = if self.tolerant {
                    open_span
                } else {
                    Span::new(self.end, self.end)
                };
                self.error(format!("unclosed '{}'", delim.open_str()), at);
                let span = open_span.merge(Span::new(self.end, self.end));
                self.open.pop();
                return Some(self.finish_seq(delim, elems, span));
            }
            if self.peek_token() == Some(&closer) {
                let close_span = self.peek().map(|i| i.span()).unwrap();
                self.advance();
                let span = open_span.merge(close_span);
                self.open.pop();
                return Some(self.finish_seq(delim, elems, span));
            }
            if let Some(Item::Token(t @ (Token::RParen | Token::RBracket | Token::RBrace), _)) =
                self.peek()
            {
                // Wrong closer: truncate the current list here. When the
                // closer belongs to an enclosing sequence, leave it for that
                // frame; otherwise consume it so it is reported once.
                let text = closer_text(t);
                let closes_outer = self.open.iter().rev().skip(1).any(|o| o == t);
                let span = self.peek().map(|i| i.span()).unwrap();
                self.error(format!("mismatched '{}'", text), span);
                if !closes_outer {
                    self.advance();
                }
                let full = open_span.merge(span);
                self.open.pop();
                return Some(self.finish_seq(delim, elems, full));
            }
            if let Some(elem) = self.read_sexp() {
                elems.push(elem);
            }
            if !self.tolerant && !self.errors.is_empty() {
                let span = open_span.merge(Span::new(self.end, self.end));
                self.open.pop();
                return Some(self.finish_seq(delim, elems, span));
            }
        }
    }

    fn read_set(&mut self) -> Option<SExp> {
        let open_span = self.peek().map(|i| i.span()).unwrap_or(Span::new(0, 0));
        self.advance();
        self.open.push(Token::RBracket);

        let mut elems = Vec::new();
        loop {
            if self.at_end() {
                let at = if self.tolerant {
                    open_span
                } else {
                    Span::new(self.end, self.end)
                };
                self.error("unclosed '#['", at);
                let span = open_span.merge(Span::new(self.end, self.end));
                self.open.pop();
                return Some(SExp::Set { elems, span });
            }
            if self.peek_token() == Some(&Token::RBracket) {
                let close_span = self.peek().map(|i| i.span()).unwrap();
                self.advance();
                self.open.pop();
                return Some(SExp::Set {
                    elems,
                    span: open_span.merge(close_span),
                });
            }
            if let Some(Item::Token(t @ (Token::RParen | Token::RBrace), _)) = self.peek() {
                let text = closer_text(t);
                let closes_outer = self.open.iter().rev().skip(1).any(|o| o == t);
                let span = self.peek().map(|i| i.span()).unwrap();
                self.error(format!("mismatched '{}'", text), span);
                if !closes_outer {
                    self.advance();
                }
                self.open.pop();
                return Some(SExp::Set {
                    elems,
                    span: open_span.merge(span),
                });
            }
            if let Some(elem) = self.read_sexp() {
                elems.push(elem);
            }
            if !self.tolerant && !self.errors.is_empty() {
                let span = open_span.merge(Span::new(self.end, self.end));
                self.open.pop();
                return Some(SExp::Set { elems, span });
            }
        }
    }

    fn finish_seq(&mut self, delim: Delim, elems: Vec<SExp>, span: Span) -> SExp {
        match delim {
            Delim::Paren => SExp::List { elems, span },
            Delim::Bracket => SExp::Vector { elems, span },
            Delim::Brace => SExp::Map { elems, span },
        }
    }
}

fn closer_text(token: &Token) -> &'static str {
    match token {
        Token::RParen => ")",
        Token::RBracket => "]",
        Token::RBrace => "}",
        _ => "?",
    }
}

/// Decode the raw inner text of a string literal into segments, splitting
/// out `\(expr)` interpolation groups. `base` is the byte offset of the
/// first inner character in the original document.
fn decode_string(raw: &str, base: u32, tolerant: bool) -> (Vec<StrSegment>, Vec<RawError>) {
    let mut segments = Vec::new();
    let mut errors = Vec::new();
    let mut text = String::new();
    let bytes = raw.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'(' => {
                    // Interpolation group: find the balanced closing paren.
                    let group_start = i + 2;
                    let mut depth = 1usize;
                    let mut j = group_start;
                    let mut in_str = false;
                    while j < bytes.len() && depth > 0 {
                        match bytes[j] {
                            b'"' => in_str = !in_str,
                            b'(' if !in_str => depth += 1,
                            b')' if !in_str => depth -= 1,
                            _ => {}
                        }
                        j += 1;
                    }
                    if depth > 0 {
                        errors.push(RawError {
                            message: "unterminated interpolation group".into(),
                            span: Span::new(base + i as u32, base + raw.len() as u32),
                        });
                        text.push_str(&raw[i..]);
                        i = bytes.len();
                        continue;
                    }
                    if !text.is_empty() {
                        segments.push(StrSegment::Text(std::mem::take(&mut text)));
                    }
                    let inner = &raw[group_start..j - 1];
                    let (exprs, mut errs) =
                        read_fragment(inner, base + group_start as u32, tolerant);
                    errors.append(&mut errs);
                    segments.push(StrSegment::Interp(exprs));
                    i = j;
                }
                b'n' => {
                    text.push('\n');
                    i += 2;
                }
                b't' => {
                    text.push('\t');
                    i += 2;
                }
                b'r' => {
                    text.push('\r');
                    i += 2;
                }
                b'\\' => {
                    text.push('\\');
                    i += 2;
                }
                b'"' => {
                    text.push('"');
                    i += 2;
                }
                b'0' => {
                    text.push('\0');
                    i += 2;
                }
                _ => {
                    // Unknown escape: keep both characters. The escaped one
                    // may be multi-byte, so step by its decoded width.
                    text.push('\\');
                    let c = raw[i + 1..].chars().next().unwrap_or('\u{fffd}');
                    text.push(c);
                    i += 1 + c.len_utf8();
                }
            }
        } else {
            let c = raw[i..].chars().next().unwrap_or('\u{fffd}');
            text.push(c);
            i += c.len_utf8();
        }
    }

    if !text.is_empty() || segments.is_empty() {
        segments.push(StrSegment::Text(text));
    }
    (segments, errors)
}
