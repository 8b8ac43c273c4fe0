use logos::Logos;
use smol_str::SmolStr;

/// Source span as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

fn raw_string(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].to_string()
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n,]+")]
#[logos(skip r";[^\n]*")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    /// Set literal opener: `#[`
    #[token("#[")]
    HashBracket,
    #[token(":")]
    Colon,

    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", priority = 3, callback = |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"-?[0-9]+", priority = 2, callback = |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    /// Raw string contents between the quotes. Escape sequences and `\(...)`
    /// interpolation groups are decoded by the reader, which needs the raw
    /// text to locate group boundaries.
    #[regex(r#""([^"\\]|\\.)*""#, callback = raw_string)]
    Str(String),

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    /// Named-parameter tag: `name:` in params and call sites.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_\-?!]*:", priority = 3, callback = |lex| {
        let s = lex.slice();
        SmolStr::new(&s[..s.len() - 1])
    })]
    NamedParam(SmolStr),

    /// Symbols: identifiers, operators, dotted references (`a.b`), `&`, `->`.
    #[regex(r"[a-zA-Z_+\-*/<>=!&|^~%?][a-zA-Z0-9_+\-*/<>=!&|^~%?.]*", priority = 1, callback = |lex| SmolStr::new(lex.slice()))]
    Symbol(SmolStr),
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub span: Span,
    pub message: &'static str,
}

/// Lex source code into `(token, span)` pairs plus any lex errors.
pub fn lex(source: &str) -> (Vec<(Token, Span)>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start as u32, range.end as u32);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                let message = if source[range.start..].starts_with('"') {
                    "unterminated string literal"
                } else {
                    "unexpected character"
                };
                errors.push(LexError { span, message });
            }
        }
    }

    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_tokens(source: &str) -> Vec<Token> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn delimiters() {
        assert_eq!(
            lex_tokens("( ) [ ] { } #["),
            vec![
                Token::LParen,
                Token::RParen,
                Token::LBracket,
                Token::RBracket,
                Token::LBrace,
                Token::RBrace,
                Token::HashBracket,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(lex_tokens("42"), vec![Token::Int(42)]);
        assert_eq!(lex_tokens("-7"), vec![Token::Int(-7)]);
        assert_eq!(lex_tokens("3.25"), vec![Token::Float(3.25)]);
        assert_eq!(lex_tokens("1.0e10"), vec![Token::Float(1.0e10)]);
    }

    #[test]
    fn strings_stay_raw() {
        assert_eq!(
            lex_tokens(r#""hello\nworld""#),
            vec![Token::Str("hello\\nworld".into())]
        );
        assert_eq!(lex_tokens(r#""""#), vec![Token::Str("".into())]);
    }

    #[test]
    fn string_with_interpolation_group() {
        // The lexer treats `\(` as an ordinary escape pair; the reader splits it.
        assert_eq!(
            lex_tokens(r#""hi \(name)!""#),
            vec![Token::Str("hi \\(name)!".into())]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            lex_tokens("true false nil"),
            vec![Token::True, Token::False, Token::Nil]
        );
    }

    #[test]
    fn named_param_tags() {
        assert_eq!(
            lex_tokens("pos: health:"),
            vec![
                Token::NamedParam("pos".into()),
                Token::NamedParam("health".into()),
            ]
        );
    }

    #[test]
    fn dotted_symbols() {
        assert_eq!(
            lex_tokens("math.floor obj.field"),
            vec![
                Token::Symbol("math.floor".into()),
                Token::Symbol("obj.field".into()),
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            lex_tokens("+ - * / < > = <= >= -> &"),
            vec![
                Token::Symbol("+".into()),
                Token::Symbol("-".into()),
                Token::Symbol("*".into()),
                Token::Symbol("/".into()),
                Token::Symbol("<".into()),
                Token::Symbol(">".into()),
                Token::Symbol("=".into()),
                Token::Symbol("<=".into()),
                Token::Symbol(">=".into()),
                Token::Symbol("->".into()),
                Token::Symbol("&".into()),
            ]
        );
    }

    #[test]
    fn colon_standalone() {
        assert_eq!(
            lex_tokens("Name : Int"),
            vec![
                Token::Symbol("Name".into()),
                Token::Colon,
                Token::Symbol("Int".into()),
            ]
        );
    }

    #[test]
    fn commas_are_whitespace() {
        assert_eq!(
            lex_tokens("[a, b, c]"),
            vec![
                Token::LBracket,
                Token::Symbol("a".into()),
                Token::Symbol("b".into()),
                Token::Symbol("c".into()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn comments_skipped() {
        assert_eq!(lex_tokens("; a comment\n42"), vec![Token::Int(42)]);
    }

    #[test]
    fn unterminated_string_error_at_opening_quote() {
        let (_, errors) = lex("(f \"abc");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span.start, 3);
        assert_eq!(errors[0].message, "unterminated string literal");
    }

    #[test]
    fn simple_expression() {
        assert_eq!(
            lex_tokens("(+ 1 2)"),
            vec![
                Token::LParen,
                Token::Symbol("+".into()),
                Token::Int(1),
                Token::Int(2),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn fx_signature() {
        let tokens = lex_tokens("(fx add (a: Int b: Int) (-> Int) (+ a b))");
        assert_eq!(tokens[0], Token::LParen);
        assert_eq!(tokens[1], Token::Symbol("fx".into()));
        assert_eq!(tokens[3], Token::LParen);
        assert_eq!(tokens[4], Token::NamedParam("a".into()));
        assert_eq!(tokens[5], Token::Symbol("Int".into()));
    }

    #[test]
    fn spans() {
        let (tokens, _) = lex("(+ 1 2)");
        assert_eq!(tokens[0], (Token::LParen, Span::new(0, 1)));
        assert_eq!(tokens[1], (Token::Symbol("+".into()), Span::new(1, 2)));
        assert_eq!(tokens[2], (Token::Int(1), Span::new(3, 4)));
        assert_eq!(tokens[3], (Token::Int(2), Span::new(5, 6)));
        assert_eq!(tokens[4], (Token::RParen, Span::new(6, 7)));
    }
}
