//! Parsing picks up where the lexer leaves off: it folds the prefix `ap`
//! notation into interned application nodes and splits a program listing
//! into `name = <expr>` definitions.
use std::iter::Peekable;

use logos::SpannedIter;

use crate::{
    lexer::{LexerError, Span, Token},
    world::{ExprRef, World},
};

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
pub enum ParseError {
    #[error("{error}")]
    Lexer { error: LexerError, span: Span },
    #[error("expected a definition name")]
    MissingName { span: Span },
    #[error("definition is missing `=`")]
    MissingEquals { span: Span },
    #[error("expression ended early, `ap` needs an operator and an operand")]
    UnexpectedEnd { span: Span },
    #[error("unexpected `=` inside an expression")]
    UnexpectedToken { span: Span },
    #[error("trailing input after a complete expression")]
    TrailingInput { span: Span },
}

impl ParseError {
    /// Byte range of the source this error points at
    pub fn span(&self) -> Span {
        match self {
            Self::Lexer { span, .. }
            | Self::MissingName { span }
            | Self::MissingEquals { span }
            | Self::UnexpectedEnd { span }
            | Self::UnexpectedToken { span }
            | Self::TrailingInput { span } => span.clone(),
        }
    }
}

/// A single `name = <expr>` line
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: Box<str>,
    pub body: ExprRef,
    pub span: Span,
}

struct Parser<'src> {
    tokens: Peekable<SpannedIter<'src, Token>>,
    // last span handed out, used to point at the end of truncated input
    last: Span,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            tokens: Token::lexer(source).spanned().peekable(),
            last: 0..0,
        }
    }

    /// Next significant token on the current line. Line endings are left in
    /// place so callers can see where a line stops.
    fn peek(&mut self) -> Result<Option<(Token, Span)>, ParseError> {
        while let Some((Ok(tok), _)) = self.tokens.peek() {
            if !tok.is_trivia() {
                break;
            }
            _ = self.tokens.next();
        }
        match self.tokens.peek() {
            None => Ok(None),
            Some((Ok(tok), span)) => Ok(Some((tok.clone(), span.clone()))),
            Some((Err(error), span)) => Err(ParseError::Lexer {
                error: error.clone(),
                span: span.clone(),
            }),
        }
    }

    fn bump(&mut self) -> Result<Option<(Token, Span)>, ParseError> {
        let next = self.peek()?;
        if let Some((tok, span)) = &next {
            if *tok != Token::LineEnding {
                self.last = span.clone();
            }
            _ = self.tokens.next();
        }
        Ok(next)
    }

    fn expression(&mut self, world: &mut World) -> Result<ExprRef, ParseError> {
        // each `ap` pushes a frame that first waits for its operator, then
        // for its operand; deep galaxy lines would overflow a recursive parser
        let mut frames: Vec<Option<ExprRef>> = vec![];
        loop {
            let mut done = match self.bump()? {
                None | Some((Token::LineEnding, _)) => {
                    return Err(ParseError::UnexpectedEnd {
                        span: self.last.clone(),
                    })
                }
                Some((Token::Ap, _)) => {
                    frames.push(None);
                    continue;
                }
                Some((Token::Integer(int), _)) => world.intern_integer(int),
                Some((Token::Identifier(name), _)) => world.intern_symbol(name),
                Some((Token::Equals, span)) => return Err(ParseError::UnexpectedToken { span }),
                Some((Token::IntralineWhitespace, _)) => continue,
            };
            loop {
                match frames.pop() {
                    None => return Ok(done),
                    Some(None) => {
                        frames.push(Some(done));
                        break;
                    }
                    Some(Some(op)) => done = world.intern_application(op, done),
                }
            }
        }
    }

    fn end_of_line(&mut self) -> Result<(), ParseError> {
        match self.bump()? {
            None | Some((Token::LineEnding, _)) => Ok(()),
            Some((_, span)) => Err(ParseError::TrailingInput { span }),
        }
    }

    fn definition(&mut self, world: &mut World) -> Result<Definition, ParseError> {
        let (name, start) = match self.bump()? {
            Some((Token::Identifier(name), span)) => (name, span),
            Some((_, span)) => return Err(ParseError::MissingName { span }),
            None => {
                return Err(ParseError::MissingName {
                    span: self.last.clone(),
                })
            }
        };
        match self.bump()? {
            Some((Token::Equals, _)) => {}
            Some((_, span)) => return Err(ParseError::MissingEquals { span }),
            None => return Err(ParseError::MissingEquals { span: start }),
        }
        let body = self.expression(world)?;
        let span = start.start..self.last.end;
        self.end_of_line()?;
        Ok(Definition { name, body, span })
    }
}

/// Parses a single expression such as `ap ap add 1 2`
pub fn parse_expr(world: &mut World, source: &str) -> Result<ExprRef, ParseError> {
    let mut parser = Parser::new(source);
    let expr = parser.expression(world)?;
    match parser.bump()? {
        None => Ok(expr),
        Some((_, span)) => Err(ParseError::TrailingInput { span }),
    }
}

/// Parses a program listing, one `name = <expr>` per line. Blank lines are
/// skipped.
pub fn parse_program(world: &mut World, source: &str) -> Result<Vec<Definition>, ParseError> {
    let mut parser = Parser::new(source);
    let mut definitions = vec![];
    loop {
        match parser.peek()? {
            None => return Ok(definitions),
            Some((Token::LineEnding, _)) => _ = parser.bump()?,
            Some(_) => definitions.push(parser.definition(world)?),
        }
    }
}
