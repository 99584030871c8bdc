pub use logos::Span;
use logos::{Lexer, Logos};

use crate::world::value::Integer;

fn read_integer(lexer: &mut Lexer<Token>) -> Result<Integer, LexerError> {
    // the regex already guarantees an optional sign followed by digits
    lexer
        .slice()
        .parse::<Integer>()
        .map_err(|_| LexerError::IntegerTooBig(Box::from(lexer.slice())))
}

#[derive(thiserror::Error, Debug, PartialEq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid token encountered")]
    Invalid,
    #[error("integer literal does not fit in 64 bits: {0}")]
    IntegerTooBig(Box<str>),
}

/// Tokens of the definition format: `name = ap ap add 1 x`
#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(error = LexerError)]
pub enum Token {
    #[regex("[ \t]+")]
    IntralineWhitespace,
    #[token("\n")]
    #[token("\r\n")]
    #[token("\r")]
    LineEnding,
    #[token("=")]
    Equals,
    // `ap` wins over the identifier rule by priority, `apple` still lexes as
    // an identifier because logos prefers the longest match
    #[token("ap")]
    Ap,
    #[regex(r"[+-]?[0-9]+", read_integer, priority = 3)]
    Integer(Integer),
    #[regex(r"[^ \t\r\n=]+", |l| Box::from(l.slice()))]
    Identifier(Box<str>),
}

impl Token {
    pub fn lexer(source: &str) -> Lexer<Self> {
        <Self as Logos>::lexer(source)
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self, Self::IntralineWhitespace)
    }
}
