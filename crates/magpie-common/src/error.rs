use std::fmt;

use serde::Serialize;

use crate::position::Position;

/// A compile error as seen by callers of the compiler.
///
/// Errors are collected during binding rather than aborting immediately,
/// so one run can report several independent problems. The list is
/// ordered by discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileError {
    pub message: String,
    pub position: Position,
}

impl CompileError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

impl std::error::Error for CompileError {}
