use logos::Logos;

use crate::source::Span;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
pub enum Token {
    // Single-character tokens
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token(";")]
    Semicolon,
    #[token("/")]
    Slash,
    #[token("*")]
    Star,

    // One or two character tokens
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,

    // Keywords
    #[token("and")]
    And,
    #[token("class")]
    Class,
    #[token("else")]
    Else,
    #[token("false")]
    False,
    #[token("for")]
    For,
    #[token("fun")]
    Fun,
    #[token("if")]
    If,
    #[token("nil")]
    Nil,
    #[token("or")]
    Or,
    #[token("print")]
    Print,
    #[token("return")]
    Return,
    #[token("super")]
    Super,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    // Literals
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        Some(s[1..s.len()-1].to_string())
    })]
    Str(String),

    // An opening quote that runs to end of input; reported as an error by `lex`.
    #[regex(r#""[^"]*"#)]
    UnterminatedStr,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexErrorKind {
    #[error("Unexpected character '{0}'.")]
    UnexpectedCharacter(String),
    #[error("Unterminated string.")]
    UnterminatedString,
}

impl LexErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            LexErrorKind::UnexpectedCharacter(_) => "LOX-L001",
            LexErrorKind::UnterminatedString => "LOX-L002",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub position: usize,
    pub snippet: String,
}

impl LexError {
    pub fn span(&self) -> Span {
        Span { start: self.position, end: self.position + self.snippet.len().max(1) }
    }
}

/// Lex source code into a stream of tokens with spans. Stops at the first
/// invalid token.
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span());
        match result {
            Ok(Token::UnterminatedStr) => {
                return Err(LexError {
                    kind: LexErrorKind::UnterminatedString,
                    position: span.start,
                    snippet: lexer.slice().to_string(),
                });
            }
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                let snippet = source[span.start..span.end].to_string();
                return Err(LexError {
                    kind: LexErrorKind::UnexpectedCharacter(snippet.clone()),
                    position: span.start,
                    snippet,
                });
            }
        }
    }

    Ok(tokens)
}
