//! Expression trees.
//!
//! [`UnboundExpr`] is the parser's output. [`BoundExpr`] is the binder's
//! output: every node carries its resolved type, locals are addressed by
//! slot, and calls point at a specific callable.

use magpie_common::Position;

use crate::decl::{BoundDecl, TypeRef, UnboundDecl};
use crate::unit::FunctionId;

// ── Unbound ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct UnboundExpr {
    pub kind: UnboundExprKind,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UnboundExprKind {
    Unit,
    Bool(bool),
    Int(i64),
    String(String),
    /// A bare identifier: a local variable, or a call with no arguments.
    Name {
        name: String,
        type_args: Vec<UnboundDecl>,
    },
    /// A reference to a function value, selected by parameter types.
    FuncRef {
        name: String,
        params: Vec<UnboundDecl>,
    },
    Tuple(Vec<UnboundExpr>),
    Block(Vec<UnboundExpr>),
    /// Introduce a new local: `def name <- value` or `var name <- value`.
    Define {
        name: String,
        mutable: bool,
        value: Box<UnboundExpr>,
    },
    /// Store into an existing local: `name <- value`.
    Assign {
        name: String,
        value: Box<UnboundExpr>,
    },
    Call {
        name: String,
        type_args: Vec<UnboundDecl>,
        args: Vec<UnboundExpr>,
    },
    If {
        condition: Box<UnboundExpr>,
        then_branch: Box<UnboundExpr>,
        else_branch: Option<Box<UnboundExpr>>,
    },
    While {
        condition: Box<UnboundExpr>,
        body: Box<UnboundExpr>,
    },
    Return(Option<Box<UnboundExpr>>),
}

impl UnboundExpr {
    pub fn new(kind: UnboundExprKind, position: Position) -> Self {
        UnboundExpr { kind, position }
    }

    pub fn unit(position: Position) -> Self {
        Self::new(UnboundExprKind::Unit, position)
    }

    pub fn bool(value: bool, position: Position) -> Self {
        Self::new(UnboundExprKind::Bool(value), position)
    }

    pub fn int(value: i64, position: Position) -> Self {
        Self::new(UnboundExprKind::Int(value), position)
    }

    pub fn string(value: impl Into<String>, position: Position) -> Self {
        Self::new(UnboundExprKind::String(value.into()), position)
    }

    pub fn name(name: impl Into<String>, position: Position) -> Self {
        Self::new(
            UnboundExprKind::Name {
                name: name.into(),
                type_args: Vec::new(),
            },
            position,
        )
    }

    pub fn tuple(elems: Vec<UnboundExpr>, position: Position) -> Self {
        Self::new(UnboundExprKind::Tuple(elems), position)
    }

    pub fn block(exprs: Vec<UnboundExpr>, position: Position) -> Self {
        Self::new(UnboundExprKind::Block(exprs), position)
    }

    pub fn define(name: impl Into<String>, mutable: bool, value: UnboundExpr, position: Position) -> Self {
        Self::new(
            UnboundExprKind::Define {
                name: name.into(),
                mutable,
                value: Box::new(value),
            },
            position,
        )
    }

    pub fn assign(name: impl Into<String>, value: UnboundExpr, position: Position) -> Self {
        Self::new(
            UnboundExprKind::Assign {
                name: name.into(),
                value: Box::new(value),
            },
            position,
        )
    }

    pub fn call(name: impl Into<String>, args: Vec<UnboundExpr>, position: Position) -> Self {
        Self::new(
            UnboundExprKind::Call {
                name: name.into(),
                type_args: Vec::new(),
                args,
            },
            position,
        )
    }

    pub fn generic_call(
        name: impl Into<String>,
        type_args: Vec<UnboundDecl>,
        args: Vec<UnboundExpr>,
        position: Position,
    ) -> Self {
        Self::new(
            UnboundExprKind::Call {
                name: name.into(),
                type_args,
                args,
            },
            position,
        )
    }

    pub fn if_then(condition: UnboundExpr, then_branch: UnboundExpr, position: Position) -> Self {
        Self::new(
            UnboundExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: None,
            },
            position,
        )
    }

    pub fn if_else(
        condition: UnboundExpr,
        then_branch: UnboundExpr,
        else_branch: UnboundExpr,
        position: Position,
    ) -> Self {
        Self::new(
            UnboundExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Some(Box::new(else_branch)),
            },
            position,
        )
    }

    pub fn while_loop(condition: UnboundExpr, body: UnboundExpr, position: Position) -> Self {
        Self::new(
            UnboundExprKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            position,
        )
    }

    pub fn ret(value: Option<UnboundExpr>, position: Position) -> Self {
        Self::new(UnboundExprKind::Return(value.map(Box::new)), position)
    }
}

// ── Bound ──────────────────────────────────────────────────────────────

/// Built-in operations the backend implements directly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntrinsicOp {
    Add,
    Sub,
    Mul,
    Div,
    Negate,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Not,
    Concat,
    ToString,
    Print,
    /// Test whether a union value holds the case with this tag.
    IsCase(u8),
    /// Extract the value of the case with this tag.
    CaseValue(u8),
}

/// What a bound call invokes.
#[derive(Clone, Debug, PartialEq)]
pub enum CallTarget {
    Function(FunctionId),
    StructConstructor(TypeRef),
    UnionConstructor { union: TypeRef, tag: u8 },
    /// Call through a function-typed value.
    Indirect(Box<BoundExpr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundExpr {
    pub kind: BoundExprKind,
    pub ty: BoundDecl,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BoundExprKind {
    Unit,
    Bool(bool),
    Int(i64),
    String(String),
    FuncRef(FunctionId),
    Tuple(Vec<BoundExpr>),
    Block(Vec<BoundExpr>),
    /// Read field `index` of `source`. Locals are fields of [`BoundExprKind::Locals`].
    Load {
        source: Box<BoundExpr>,
        index: usize,
        name: String,
    },
    /// Write `value` into field `index` of `target`.
    Store {
        target: Box<BoundExpr>,
        index: usize,
        name: String,
        value: Box<BoundExpr>,
    },
    /// The current function's local frame.
    Locals { num_variables: usize },
    Call {
        target: CallTarget,
        args: Vec<BoundExpr>,
    },
    Intrinsic {
        op: IntrinsicOp,
        args: Vec<BoundExpr>,
    },
    ForeignCall {
        id: u32,
        name: String,
        args: Vec<BoundExpr>,
    },
    If {
        condition: Box<BoundExpr>,
        then_branch: Box<BoundExpr>,
        else_branch: Option<Box<BoundExpr>>,
    },
    Return(Box<BoundExpr>),
    While {
        condition: Box<BoundExpr>,
        body: Box<BoundExpr>,
    },
}

impl BoundExpr {
    pub fn new(kind: BoundExprKind, ty: BoundDecl, position: Position) -> Self {
        BoundExpr { kind, ty, position }
    }

    pub fn unit(position: Position) -> Self {
        Self::new(BoundExprKind::Unit, BoundDecl::unit(), position)
    }

    /// A placeholder for a sub-tree that failed to bind.
    pub fn error(position: Position) -> Self {
        Self::new(BoundExprKind::Unit, BoundDecl::Error, position)
    }

    pub fn locals(position: Position) -> Self {
        Self::new(
            BoundExprKind::Locals { num_variables: 0 },
            BoundDecl::unit(),
            position,
        )
    }

    /// Visit this node and every descendant, parents first.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut BoundExpr)) {
        f(self);
        match &mut self.kind {
            BoundExprKind::Unit
            | BoundExprKind::Bool(_)
            | BoundExprKind::Int(_)
            | BoundExprKind::String(_)
            | BoundExprKind::FuncRef(_)
            | BoundExprKind::Locals { .. } => {}
            BoundExprKind::Tuple(exprs)
            | BoundExprKind::Block(exprs)
            | BoundExprKind::Intrinsic { args: exprs, .. }
            | BoundExprKind::ForeignCall { args: exprs, .. } => {
                for e in exprs {
                    e.walk_mut(f);
                }
            }
            BoundExprKind::Load { source, .. } => source.walk_mut(f),
            BoundExprKind::Store { target, value, .. } => {
                target.walk_mut(f);
                value.walk_mut(f);
            }
            BoundExprKind::Call { target, args } => {
                if let CallTarget::Indirect(callee) = target {
                    callee.walk_mut(f);
                }
                for e in args {
                    e.walk_mut(f);
                }
            }
            BoundExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.walk_mut(f);
                then_branch.walk_mut(f);
                if let Some(e) = else_branch {
                    e.walk_mut(f);
                }
            }
            BoundExprKind::Return(value) => value.walk_mut(f),
            BoundExprKind::While { condition, body } => {
                condition.walk_mut(f);
                body.walk_mut(f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_mut_reaches_nested_locals() {
        let pos = Position::none();
        let load = BoundExpr::new(
            BoundExprKind::Load {
                source: Box::new(BoundExpr::locals(pos)),
                index: 0,
                name: "a".into(),
            },
            BoundDecl::int(),
            pos,
        );
        let mut tree = BoundExpr::new(
            BoundExprKind::While {
                condition: Box::new(BoundExpr::new(BoundExprKind::Bool(true), BoundDecl::bool(), pos)),
                body: Box::new(BoundExpr::new(
                    BoundExprKind::Block(vec![load]),
                    BoundDecl::int(),
                    pos,
                )),
            },
            BoundDecl::unit(),
            pos,
        );

        tree.walk_mut(&mut |e| {
            if let BoundExprKind::Locals { num_variables } = &mut e.kind {
                *num_variables = 7;
            }
        });

        let mut seen = Vec::new();
        tree.walk_mut(&mut |e| {
            if let BoundExprKind::Locals { num_variables } = e.kind {
                seen.push(num_variables);
            }
        });
        assert_eq!(seen, vec![7]);
    }

    #[test]
    fn unit_expression_has_unit_type() {
        assert!(BoundExpr::unit(Position::none()).ty.is_unit());
    }
}
