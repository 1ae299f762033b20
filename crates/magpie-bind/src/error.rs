//! Bind errors with provenance.
//!
//! Every user-facing problem found while binding becomes a [`BindError`]
//! pushed onto the binder's error list. Nothing here is thrown: binding
//! continues after an error so that one pass reports as much as it can.
//!
//! Type mismatches carry a [`ConstraintOrigin`] recording why the two
//! types had to agree, which the diagnostic renderer turns into labels.

use std::fmt;

use magpie_common::{CompileError, Position};

use crate::decl::BoundDecl;

/// Why two types were required to match.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintOrigin {
    /// `name <- value`: the value must match the local's declared type.
    Assignment,
    /// Argument `index` of a call must match the parameter type.
    CallArg { index: usize },
    /// The condition of an `if` or `while` must be `Bool`.
    Condition,
    /// Both arms of an `if`/`else` must produce the same type.
    IfBranches {
        then_position: Position,
        else_position: Position,
    },
    /// A `return` value must match the function's return type.
    Return,
    /// A function body must match the function's return type.
    FunctionBody,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BindError {
    /// A name that refers to no local, type, or callable.
    UnresolvedName { name: String, position: Position },
    /// A generic type applied to the wrong number of type arguments.
    GenericArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        position: Position,
    },
    /// Two types that must agree do not.
    Mismatch {
        expected: BoundDecl,
        found: BoundDecl,
        origin: ConstraintOrigin,
        position: Position,
    },
    /// A callable invoked with the wrong number of arguments.
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        position: Position,
    },
    /// Several overloads exist but none accepts these argument types.
    NoMatchingOverload {
        name: String,
        arg_types: Vec<BoundDecl>,
        position: Position,
    },
    /// Assignment to a local that was not declared mutable.
    MutabilityViolation { name: String, position: Position },
    /// A local defined while another local of that name is still live.
    DuplicateLocal { name: String, position: Position },
    /// Two type definitions with the same name.
    DuplicateDefinition { name: String, position: Position },
    /// A struct with more than 256 fields, or a union with more than 256 cases.
    TooManyFields { type_name: String, position: Position },
    /// A generic constructor whose type arguments cannot be inferred.
    CannotInferTypeArgs { name: String, position: Position },
    /// A call through a local that does not hold a function.
    NotCallable {
        name: String,
        ty: BoundDecl,
        position: Position,
    },
    /// Generic instantiation nested too deeply (polymorphic recursion).
    InstantiationTooDeep { name: String, position: Position },
}

impl BindError {
    pub fn position(&self) -> Position {
        match self {
            BindError::UnresolvedName { position, .. }
            | BindError::GenericArityMismatch { position, .. }
            | BindError::Mismatch { position, .. }
            | BindError::ArityMismatch { position, .. }
            | BindError::NoMatchingOverload { position, .. }
            | BindError::MutabilityViolation { position, .. }
            | BindError::DuplicateLocal { position, .. }
            | BindError::DuplicateDefinition { position, .. }
            | BindError::TooManyFields { position, .. }
            | BindError::CannotInferTypeArgs { position, .. }
            | BindError::NotCallable { position, .. }
            | BindError::InstantiationTooDeep { position, .. } => *position,
        }
    }

    fn position_mut(&mut self) -> &mut Position {
        match self {
            BindError::UnresolvedName { position, .. }
            | BindError::GenericArityMismatch { position, .. }
            | BindError::Mismatch { position, .. }
            | BindError::ArityMismatch { position, .. }
            | BindError::NoMatchingOverload { position, .. }
            | BindError::MutabilityViolation { position, .. }
            | BindError::DuplicateLocal { position, .. }
            | BindError::DuplicateDefinition { position, .. }
            | BindError::TooManyFields { position, .. }
            | BindError::CannotInferTypeArgs { position, .. }
            | BindError::NotCallable { position, .. }
            | BindError::InstantiationTooDeep { position, .. } => position,
        }
    }

    /// Use `fallback` if this error has no position of its own.
    pub fn with_fallback_position(mut self, fallback: Position) -> Self {
        let position = self.position_mut();
        *position = position.or(fallback);
        self
    }

    /// Flatten into the caller-facing `(message, position)` pair.
    pub fn to_compile_error(&self) -> CompileError {
        CompileError::new(self.to_string(), self.position())
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::UnresolvedName { name, .. } => {
                write!(f, "unresolved name `{}`", name)
            }
            BindError::GenericArityMismatch {
                name,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "`{}` expects {} type argument(s), found {}",
                    name, expected, found
                )
            }
            BindError::Mismatch {
                expected,
                found,
                origin,
                ..
            } => match origin {
                ConstraintOrigin::IfBranches { .. } => write!(
                    f,
                    "branches of if/else do not match: `{}` and `{}`",
                    expected, found
                ),
                ConstraintOrigin::Condition => {
                    write!(f, "condition must be `{}`, found `{}`", expected, found)
                }
                _ => write!(
                    f,
                    "type mismatch: expected `{}`, found `{}`",
                    expected, found
                ),
            },
            BindError::ArityMismatch {
                name,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "`{}` expects {} argument(s), found {}",
                    name, expected, found
                )
            }
            BindError::NoMatchingOverload {
                name, arg_types, ..
            } => {
                let args: Vec<String> = arg_types.iter().map(|t| t.to_string()).collect();
                write!(
                    f,
                    "no overload of `{}` accepts ({})",
                    name,
                    args.join(", ")
                )
            }
            BindError::MutabilityViolation { name, .. } => {
                write!(f, "cannot assign to immutable local `{}`", name)
            }
            BindError::DuplicateLocal { name, .. } => {
                write!(f, "a local named `{}` is already defined in this scope", name)
            }
            BindError::DuplicateDefinition { name, .. } => {
                write!(f, "type `{}` is defined more than once", name)
            }
            BindError::TooManyFields { type_name, .. } => {
                write!(f, "`{}` has more than 256 fields", type_name)
            }
            BindError::CannotInferTypeArgs { name, .. } => {
                write!(f, "cannot infer type arguments for `{}`", name)
            }
            BindError::NotCallable { name, ty, .. } => {
                write!(f, "`{}` has type `{}` and cannot be called", name, ty)
            }
            BindError::InstantiationTooDeep { name, .. } => {
                write!(f, "instantiation of `{}` nests too deeply", name)
            }
        }
    }
}

impl std::error::Error for BindError {}
