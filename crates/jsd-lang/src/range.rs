use std::fmt::{self, Display, Formatter};

use nom_locate::LocatedSpan;

pub type Span<'a> = LocatedSpan<&'a str>;

/// A 1-based line/column location in a script.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Position {
    /// Position reported to the debugger once the program has run to completion.
    pub const END_OF_PROGRAM: Position = Position { line: 0, column: 0 };

    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    /// Advances this position over `text`, used for code embedded in template literals.
    pub(crate) fn advance(self, text: &str) -> Self {
        text.chars().fold(self, |position, c| {
            if c == '\n' {
                Position::new(position.line + 1, 1)
            } else {
                Position::new(position.line, position.column + 1)
            }
        })
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl<'a> From<Span<'a>> for Position {
    fn from(span: Span<'a>) -> Self {
        Position {
            line: span.location_line(),
            column: span.get_utf8_column() as u32,
        }
    }
}
