use thiserror::Error;

use crate::lexer::error::LexerError;
use crate::lexer::token::Token;
use crate::range::Position;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token `{0}`")]
    UnexpectedToken(Token),
    #[error("Unexpected end of input")]
    UnexpectedEof(Position),
    #[error("Invalid left-hand side in assignment")]
    InvalidAssignmentTarget(Position),
    #[error("Missing initializer in const declaration")]
    MissingInitializer(Position),
    #[error(transparent)]
    Lexer(#[from] LexerError),
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedToken(token) => token.position,
            ParseError::UnexpectedEof(position)
            | ParseError::InvalidAssignmentTarget(position)
            | ParseError::MissingInitializer(position) => *position,
            ParseError::Lexer(e) => e.position(),
        }
    }
}
