//! Type declarations.
//!
//! Declarations exist in two forms. [`UnboundDecl`] is what the parser
//! produces: it may name types that have not been looked up yet.
//! [`BoundDecl`] is what the binder produces: every name has been replaced
//! by the referent's declaration, and generic references point at a
//! concrete instantiation.

use std::fmt;

use magpie_common::Position;

/// A built-in primitive type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Atomic {
    Unit,
    Bool,
    Int,
    String,
    /// The type of expressions that never produce a value (`return`).
    Never,
}

impl Atomic {
    /// Look up a primitive by the name it is written with in source.
    ///
    /// `Never` cannot be written by users and is not returned here.
    pub fn from_name(name: &str) -> Option<Atomic> {
        match name {
            "Unit" => Some(Atomic::Unit),
            "Bool" => Some(Atomic::Bool),
            "Int" => Some(Atomic::Int),
            "String" => Some(Atomic::String),
            _ => None,
        }
    }
}

impl fmt::Display for Atomic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atomic::Unit => write!(f, "()"),
            Atomic::Bool => write!(f, "Bool"),
            Atomic::Int => write!(f, "Int"),
            Atomic::String => write!(f, "String"),
            Atomic::Never => write!(f, "Never"),
        }
    }
}

/// A named, indexed slot in a record, struct, or local frame.
///
/// `index` is dense, zero-based and assigned in declaration order. It is a
/// single byte, which caps a struct at 256 fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Field<D> {
    pub name: String,
    pub ty: D,
    pub index: u8,
}

impl<D> Field<D> {
    pub fn new(name: impl Into<String>, ty: D, index: u8) -> Self {
        Field {
            name: name.into(),
            ty,
            index,
        }
    }
}

/// A function signature: parameter types and a return type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FuncType<D> {
    pub params: Vec<D>,
    pub ret: D,
}

/// A reference to a type by name, resolved during binding.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedType {
    pub name: String,
    pub type_args: Vec<UnboundDecl>,
    pub position: Position,
}

/// A type declaration as written in source.
#[derive(Clone, Debug, PartialEq)]
pub enum UnboundDecl {
    Atomic(Atomic),
    Tuple(Vec<UnboundDecl>),
    Record(Vec<Field<UnboundDecl>>),
    Func(Box<FuncType<UnboundDecl>>),
    Array(Box<UnboundDecl>),
    Named(NamedType),
}

impl UnboundDecl {
    pub fn unit() -> UnboundDecl {
        UnboundDecl::Atomic(Atomic::Unit)
    }

    pub fn bool() -> UnboundDecl {
        UnboundDecl::Atomic(Atomic::Bool)
    }

    pub fn int() -> UnboundDecl {
        UnboundDecl::Atomic(Atomic::Int)
    }

    pub fn string() -> UnboundDecl {
        UnboundDecl::Atomic(Atomic::String)
    }

    /// A reference to a non-generic type or type parameter.
    pub fn named(name: impl Into<String>, position: Position) -> UnboundDecl {
        UnboundDecl::Named(NamedType {
            name: name.into(),
            type_args: Vec::new(),
            position,
        })
    }

    /// A reference to a generic type applied to arguments: `Box[Int]`.
    pub fn generic(
        name: impl Into<String>,
        type_args: Vec<UnboundDecl>,
        position: Position,
    ) -> UnboundDecl {
        UnboundDecl::Named(NamedType {
            name: name.into(),
            type_args,
            position,
        })
    }

    pub fn func(params: Vec<UnboundDecl>, ret: UnboundDecl) -> UnboundDecl {
        UnboundDecl::Func(Box::new(FuncType { params, ret }))
    }

    pub fn array(elem: UnboundDecl) -> UnboundDecl {
        UnboundDecl::Array(Box::new(elem))
    }

    /// The position of the first named reference inside this declaration.
    pub fn position(&self) -> Position {
        match self {
            UnboundDecl::Named(named) => named.position,
            UnboundDecl::Tuple(elems) => elems
                .iter()
                .map(UnboundDecl::position)
                .find(|p| !p.is_none())
                .unwrap_or_else(Position::none),
            UnboundDecl::Record(fields) => fields
                .iter()
                .map(|f| f.ty.position())
                .find(|p| !p.is_none())
                .unwrap_or_else(Position::none),
            UnboundDecl::Func(func) => func
                .params
                .iter()
                .chain(std::iter::once(&func.ret))
                .map(UnboundDecl::position)
                .find(|p| !p.is_none())
                .unwrap_or_else(Position::none),
            UnboundDecl::Array(elem) => elem.position(),
            UnboundDecl::Atomic(_) => Position::none(),
        }
    }
}

/// A nominal reference to an instantiated struct or union.
///
/// Two references are equal when their names match and their argument
/// lists are structurally equal, so two separate instantiations of
/// `Box[Int]` name the same type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub type_args: Vec<BoundDecl>,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, type_args: Vec<BoundDecl>) -> Self {
        TypeRef {
            name: name.into(),
            type_args,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.type_args.is_empty() {
            write!(f, "[")?;
            write_list(f, &self.type_args)?;
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// A fully resolved type declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundDecl {
    Atomic(Atomic),
    Tuple(Vec<BoundDecl>),
    Record(Vec<Field<BoundDecl>>),
    Func(Box<FuncType<BoundDecl>>),
    Array(Box<BoundDecl>),
    Struct(TypeRef),
    Union(TypeRef),
    Foreign(String),
    /// Placeholder left behind by a failed resolution.
    Error,
}

impl BoundDecl {
    pub fn unit() -> BoundDecl {
        BoundDecl::Atomic(Atomic::Unit)
    }

    pub fn bool() -> BoundDecl {
        BoundDecl::Atomic(Atomic::Bool)
    }

    pub fn int() -> BoundDecl {
        BoundDecl::Atomic(Atomic::Int)
    }

    pub fn string() -> BoundDecl {
        BoundDecl::Atomic(Atomic::String)
    }

    pub fn never() -> BoundDecl {
        BoundDecl::Atomic(Atomic::Never)
    }

    pub fn func(params: Vec<BoundDecl>, ret: BoundDecl) -> BoundDecl {
        BoundDecl::Func(Box::new(FuncType { params, ret }))
    }

    pub fn array(elem: BoundDecl) -> BoundDecl {
        BoundDecl::Array(Box::new(elem))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, BoundDecl::Atomic(Atomic::Unit))
    }

    pub fn is_never(&self) -> bool {
        matches!(self, BoundDecl::Atomic(Atomic::Never))
    }

    /// Whether an `Error` placeholder appears anywhere in this type.
    pub fn contains_error(&self) -> bool {
        match self {
            BoundDecl::Error => true,
            BoundDecl::Atomic(_) | BoundDecl::Foreign(_) => false,
            BoundDecl::Tuple(elems) => elems.iter().any(BoundDecl::contains_error),
            BoundDecl::Record(fields) => fields.iter().any(|f| f.ty.contains_error()),
            BoundDecl::Func(func) => {
                func.params.iter().any(BoundDecl::contains_error) || func.ret.contains_error()
            }
            BoundDecl::Array(elem) => elem.contains_error(),
            BoundDecl::Struct(r) | BoundDecl::Union(r) => {
                r.type_args.iter().any(BoundDecl::contains_error)
            }
        }
    }

    /// Number of nodes in this type tree, type arguments included.
    pub fn node_count(&self) -> usize {
        1 + match self {
            BoundDecl::Atomic(_) | BoundDecl::Foreign(_) | BoundDecl::Error => 0,
            BoundDecl::Tuple(elems) => elems.iter().map(BoundDecl::node_count).sum(),
            BoundDecl::Record(fields) => fields.iter().map(|f| f.ty.node_count()).sum(),
            BoundDecl::Func(func) => {
                func.params.iter().map(BoundDecl::node_count).sum::<usize>() + func.ret.node_count()
            }
            BoundDecl::Array(elem) => elem.node_count(),
            BoundDecl::Struct(r) | BoundDecl::Union(r) => {
                r.type_args.iter().map(BoundDecl::node_count).sum()
            }
        }
    }

    /// Type compatibility used by every check the binder performs.
    ///
    /// This is structural equality, except that `Error` and `Never` match
    /// any type at any depth.
    pub fn matches(&self, other: &BoundDecl) -> bool {
        match (self, other) {
            (BoundDecl::Error, _) | (_, BoundDecl::Error) => true,
            (BoundDecl::Atomic(Atomic::Never), _) | (_, BoundDecl::Atomic(Atomic::Never)) => true,
            (BoundDecl::Atomic(a), BoundDecl::Atomic(b)) => a == b,
            (BoundDecl::Tuple(a), BoundDecl::Tuple(b)) => all_match(a, b),
            (BoundDecl::Record(a), BoundDecl::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| x.name == y.name && x.ty.matches(&y.ty))
            }
            (BoundDecl::Func(a), BoundDecl::Func(b)) => {
                all_match(&a.params, &b.params) && a.ret.matches(&b.ret)
            }
            (BoundDecl::Array(a), BoundDecl::Array(b)) => a.matches(b),
            (BoundDecl::Struct(a), BoundDecl::Struct(b))
            | (BoundDecl::Union(a), BoundDecl::Union(b)) => {
                a.name == b.name && all_match(&a.type_args, &b.type_args)
            }
            (BoundDecl::Foreign(a), BoundDecl::Foreign(b)) => a == b,
            _ => false,
        }
    }
}

fn all_match(a: &[BoundDecl], b: &[BoundDecl]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_fields<D: fmt::Display>(f: &mut fmt::Formatter<'_>, fields: &[Field<D>]) -> fmt::Result {
    write!(f, "(")?;
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", field.name, field.ty)?;
    }
    write!(f, ")")
}

impl<D: fmt::Display> fmt::Display for FuncType<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn (")?;
        write_list(f, &self.params)?;
        write!(f, ") -> {}", self.ret)
    }
}

impl fmt::Display for UnboundDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnboundDecl::Atomic(a) => write!(f, "{}", a),
            UnboundDecl::Tuple(elems) => {
                write!(f, "(")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
            UnboundDecl::Record(fields) => write_fields(f, fields),
            UnboundDecl::Func(func) => write!(f, "{}", func),
            UnboundDecl::Array(elem) => write!(f, "Array[{}]", elem),
            UnboundDecl::Named(named) => {
                write!(f, "{}", named.name)?;
                if !named.type_args.is_empty() {
                    write!(f, "[")?;
                    write_list(f, &named.type_args)?;
                    write!(f, "]")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for BoundDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundDecl::Atomic(a) => write!(f, "{}", a),
            BoundDecl::Tuple(elems) => {
                write!(f, "(")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
            BoundDecl::Record(fields) => write_fields(f, fields),
            BoundDecl::Func(func) => write!(f, "{}", func),
            BoundDecl::Array(elem) => write!(f, "Array[{}]", elem),
            BoundDecl::Struct(r) | BoundDecl::Union(r) => write!(f, "{}", r),
            BoundDecl::Foreign(name) => write!(f, "{}", name),
            BoundDecl::Error => write!(f, "<error>"),
        }
    }
}
