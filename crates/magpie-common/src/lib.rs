//! Shared types for the Magpie compiler.
//!
//! - [`position`]: source locations attached to every syntax node
//! - [`error`]: the flat compile error handed to diagnostics consumers

pub mod error;
pub mod position;

pub use error::CompileError;
pub use position::Position;
