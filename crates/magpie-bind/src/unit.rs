//! Compilation units: the binder's input and output.

use std::rc::Rc;

use magpie_common::Position;

use crate::callable::CallableTable;
use crate::decl::{BoundDecl, UnboundDecl};
use crate::expr::{BoundExpr, UnboundExpr};
use crate::structs::{Struct, StructDef, Union, UnionDef};

/// Index of a function within its compilation unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionId(pub usize);

/// A parameter as written in a function signature.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: UnboundDecl,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: UnboundDecl) -> Self {
        Param {
            name: name.into(),
            ty,
        }
    }
}

/// A user function before binding.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub position: Position,
    pub params: Vec<Param>,
    pub ret: UnboundDecl,
    pub body: UnboundExpr,
}

/// A function implemented outside Magpie. Only its shape is known here.
#[derive(Clone, Debug, PartialEq)]
pub struct ForeignFunctionDecl {
    pub name: String,
    pub id: u32,
    pub position: Position,
    pub params: Vec<UnboundDecl>,
    pub ret: UnboundDecl,
}

/// Everything the parser hands to the binder for one compilation unit.
#[derive(Clone, Debug, Default)]
pub struct SourceUnit {
    pub structs: Vec<StructDef>,
    pub unions: Vec<UnionDef>,
    pub foreign_types: Vec<String>,
    pub foreign_functions: Vec<ForeignFunctionDecl>,
    pub functions: Vec<FunctionDef>,
}

/// A bound function, ready for the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundFunction {
    pub id: FunctionId,
    pub name: String,
    pub position: Position,
    pub params: Vec<BoundDecl>,
    pub ret: BoundDecl,
    pub body: BoundExpr,
    /// Frame size: the most locals (parameters included) live at once.
    pub num_locals: usize,
}

/// The bound form of a [`SourceUnit`].
#[derive(Debug, Default)]
pub struct BoundUnit {
    /// Every struct instantiation, in the order it was created.
    pub structs: Vec<Rc<Struct>>,
    /// Every union instantiation, in the order it was created.
    pub unions: Vec<Rc<Union>>,
    pub functions: Vec<BoundFunction>,
    /// Every callable, including members derived from structs and unions.
    pub callables: CallableTable,
}

impl BoundUnit {
    pub fn function(&self, name: &str) -> Option<&BoundFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Every instantiation of the struct named `name`.
    pub fn struct_instances<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Rc<Struct>> + 'a {
        self.structs.iter().filter(move |s| s.name == name)
    }

    pub fn union_instances<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Rc<Union>> + 'a {
        self.unions.iter().filter(move |u| u.name == name)
    }
}
