use miette::{Diagnostic, SourceOffset, SourceSpan};
use smol_str::SmolStr;

use crate::ast::error::ParseError;
use crate::eval::error::EvalError;
use crate::lexer::error::LexerError;
use crate::range::Position;

#[derive(Debug, thiserror::Error)]
pub enum InnerError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl InnerError {
    pub fn position(&self) -> Position {
        match self {
            InnerError::Lexer(err) => err.position(),
            InnerError::Parse(err) => err.position(),
            InnerError::Eval(err) => err.position,
        }
    }
}

/// A syntax error or an uncaught exception, located in its script.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// Name of the script the error was raised in.
    pub file: SmolStr,
    /// The source code related to the error.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
    message: String,
}

impl Error {
    pub fn from_error(file: &str, source_code: impl Into<String>, cause: InnerError) -> Self {
        let source_code = source_code.into();
        let position = cause.position();

        let message = match &cause {
            InnerError::Eval(err) => format!("{} at {}:{}", err.value, file, position),
            cause => format!("SyntaxError: {} at {}:{}", cause, file, position),
        };

        let location = if position == Position::END_OF_PROGRAM {
            SourceSpan::new(SourceOffset::from(source_code.len().saturating_sub(1)), 1)
        } else {
            SourceSpan::new(
                SourceOffset::from_location(&source_code, position.line as usize, position.column as usize),
                1,
            )
        };

        Self {
            cause,
            file: SmolStr::new(file),
            source_code,
            location,
            message,
        }
    }

    pub fn is_syntax_error(&self) -> bool {
        !matches!(self.cause, InnerError::Eval(_))
    }

    pub fn position(&self) -> Position {
        self.cause.position()
    }

    /// The thrown value of an uncaught exception.
    pub fn thrown(&self) -> Option<&crate::Value> {
        match &self.cause {
            InnerError::Eval(err) => Some(&err.value),
            _ => None,
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedCharacter(..)) => "LexerError::UnexpectedCharacter",
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEof(_)) => "ParseError::UnexpectedEof",
            InnerError::Parse(ParseError::InvalidAssignmentTarget(_)) => {
                "ParseError::InvalidAssignmentTarget"
            }
            InnerError::Parse(ParseError::MissingInitializer(_)) => "ParseError::MissingInitializer",
            InnerError::Parse(ParseError::Lexer(_)) => "ParseError::Lexer",
            InnerError::Eval(_) => "EvalError::Uncaught",
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Parse(ParseError::UnexpectedEof(_)) => {
                Some("Input ended unexpectedly. Check for missing closing brackets or incomplete statements.")
            }
            InnerError::Parse(ParseError::MissingInitializer(_)) => {
                Some("A const declaration must be initialized.")
            }
            _ => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_error_message() {
        let cause = InnerError::Eval(EvalError::type_error("x is not a function", Position::new(2, 3)));
        let error = Error::from_error("main.js", "let a;\nx();\n", cause);

        assert_eq!(error.to_string(), "TypeError: x is not a function at main.js:2:3");
        assert!(!error.is_syntax_error());
        assert_eq!(error.location.offset(), 9);
    }

    #[test]
    fn test_syntax_error_message() {
        let cause = InnerError::Lexer(LexerError::UnexpectedCharacter('@', Position::new(1, 5)));
        let error = Error::from_error("main.js", "var @", cause);

        assert_eq!(
            error.to_string(),
            "SyntaxError: Invalid or unexpected token `@` at main.js:1:5"
        );
        assert!(error.is_syntax_error());
        assert!(error.code().is_some());
    }
}
