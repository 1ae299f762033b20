//! Source positions.
//!
//! A [`Position`] records where a syntax node came from: a 1-based line and
//! column for humans, and a byte range for diagnostic rendering. Nodes the
//! compiler synthesizes itself carry [`Position::none`].

use std::fmt;

use rowan::{TextRange, TextSize};
use serde::Serialize;

/// An immutable source location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    /// 1-based line number. Zero for synthesized nodes.
    pub line: u32,
    /// 1-based column number. Zero for synthesized nodes.
    pub column: u32,
    /// Byte range of the node in its source file.
    #[serde(skip)]
    pub range: TextRange,
}

impl Position {
    /// Create a position with an explicit byte range.
    pub fn new(line: u32, column: u32, range: TextRange) -> Self {
        Position { line, column, range }
    }

    /// Create a position with no known byte range.
    ///
    /// Diagnostic rendering falls back to the line and column to locate
    /// the node in the source text.
    pub fn at(line: u32, column: u32) -> Self {
        Position {
            line,
            column,
            range: TextRange::empty(TextSize::from(0)),
        }
    }

    /// The sentinel position for compiler-synthesized nodes.
    pub fn none() -> Self {
        Position::at(0, 0)
    }

    pub fn is_none(&self) -> bool {
        self.line == 0
    }

    /// Return `self`, or `fallback` when `self` is the sentinel.
    pub fn or(self, fallback: Position) -> Position {
        if self.is_none() {
            fallback
        } else {
            self
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::none()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "<synthesized>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_sentinel() {
        assert!(Position::none().is_none());
        assert!(!Position::at(3, 1).is_none());
    }

    #[test]
    fn or_prefers_real_position() {
        let real = Position::at(4, 2);
        assert_eq!(Position::none().or(real), real);
        assert_eq!(Position::at(1, 1).or(real), Position::at(1, 1));
    }

    #[test]
    fn display() {
        assert_eq!(Position::at(12, 5).to_string(), "12:5");
        assert_eq!(Position::none().to_string(), "<synthesized>");
    }
}
