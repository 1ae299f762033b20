//! Magpie binder: turns unbound syntax trees into typed, bound trees.
//!
//! The parser produces a [`SourceUnit`] whose declarations and expressions
//! still refer to types and callables by name. [`bind`] resolves those
//! names, instantiates generic structs and unions, assigns every local a
//! frame slot and gives every expression a type. The result is a
//! [`BoundUnit`] ready for the interpreter, plus the errors found along
//! the way.

pub mod bind;
pub mod builtins;
pub mod callable;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod expr;
pub mod resolve;
pub mod scope;
pub mod structs;
pub mod unit;

use magpie_common::CompileError;

use crate::diagnostics::{render_diagnostic, DiagnosticOptions};
use crate::error::BindError;

pub use crate::bind::bind;
pub use crate::unit::{BoundUnit, SourceUnit};

/// The outcome of binding one compilation unit.
///
/// The bound tree is always produced, with error placeholders where
/// binding failed. It must not be executed unless `errors` is empty.
#[derive(Debug)]
pub struct BindResult {
    pub unit: BoundUnit,
    /// Errors in the order they were found.
    pub errors: Vec<BindError>,
}

impl BindResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The errors as plain `(message, position)` pairs.
    pub fn compile_errors(&self) -> Vec<CompileError> {
        self.errors.iter().map(BindError::to_compile_error).collect()
    }

    /// Render every error with ariadne.
    pub fn render_errors(&self, source: &str, filename: &str, options: &DiagnosticOptions) -> Vec<String> {
        self.errors
            .iter()
            .map(|err| render_diagnostic(err, source, filename, options))
            .collect()
    }
}
