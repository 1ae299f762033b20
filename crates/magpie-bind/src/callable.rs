//! Everything a call expression can resolve to.
//!
//! User functions, intrinsics, foreign functions and the members derived
//! from struct and union definitions all live in one [`CallableTable`],
//! keyed by name. Several callables may share a name; the binder picks
//! one by matching parameter types against argument types.

use rustc_hash::FxHashMap;

use crate::decl::{BoundDecl, FuncType, TypeRef};
use crate::expr::IntrinsicOp;
use crate::unit::FunctionId;

#[derive(Clone, Debug, PartialEq)]
pub enum CallableKind {
    Function(FunctionId),
    Intrinsic(IntrinsicOp),
    Foreign(u32),
    StructConstructor(TypeRef),
    FieldGetter { owner: TypeRef, index: u8 },
    FieldSetter { owner: TypeRef, index: u8 },
    UnionConstructor { owner: TypeRef, tag: u8 },
    UnionCaseCheck { owner: TypeRef, tag: u8 },
    UnionCaseValue { owner: TypeRef, tag: u8 },
}

impl CallableKind {
    /// The struct or union this callable was derived from, if any.
    pub fn owner(&self) -> Option<&TypeRef> {
        match self {
            CallableKind::StructConstructor(owner)
            | CallableKind::FieldGetter { owner, .. }
            | CallableKind::FieldSetter { owner, .. }
            | CallableKind::UnionConstructor { owner, .. }
            | CallableKind::UnionCaseCheck { owner, .. }
            | CallableKind::UnionCaseValue { owner, .. } => Some(owner),
            CallableKind::Function(_) | CallableKind::Intrinsic(_) | CallableKind::Foreign(_) => None,
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(
            self,
            CallableKind::StructConstructor(_) | CallableKind::UnionConstructor { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Callable {
    pub name: String,
    pub kind: CallableKind,
    pub signature: FuncType<BoundDecl>,
}

impl Callable {
    pub fn new(
        name: impl Into<String>,
        kind: CallableKind,
        params: Vec<BoundDecl>,
        ret: BoundDecl,
    ) -> Self {
        Callable {
            name: name.into(),
            kind,
            signature: FuncType { params, ret },
        }
    }

    pub fn params(&self) -> &[BoundDecl] {
        &self.signature.params
    }

    pub fn ret(&self) -> &BoundDecl {
        &self.signature.ret
    }

    /// Whether this callable can be invoked with arguments of these types.
    pub fn accepts(&self, arg_types: &[BoundDecl]) -> bool {
        self.signature.params.len() == arg_types.len()
            && self
                .signature
                .params
                .iter()
                .zip(arg_types)
                .all(|(param, arg)| param.matches(arg))
    }

    /// The callable's type as a first-class function value.
    pub fn fn_type(&self) -> BoundDecl {
        BoundDecl::func(self.signature.params.clone(), self.signature.ret.clone())
    }
}

/// All callables known to one binder run, in registration order.
#[derive(Clone, Debug, Default)]
pub struct CallableTable {
    callables: Vec<Callable>,
    by_name: FxHashMap<String, Vec<usize>>,
}

impl CallableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callable: Callable) {
        self.by_name
            .entry(callable.name.clone())
            .or_default()
            .push(self.callables.len());
        self.callables.push(callable);
    }

    pub fn extend(&mut self, callables: impl IntoIterator<Item = Callable>) {
        for callable in callables {
            self.add(callable);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Every overload registered under `name`, oldest first.
    pub fn overloads<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Callable> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.callables[i])
    }

    /// The first overload of `name` that accepts these argument types.
    pub fn find(&self, name: &str, arg_types: &[BoundDecl]) -> Option<&Callable> {
        self.overloads(name).find(|c| c.accepts(arg_types))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Callable> {
        self.callables.iter()
    }

    /// Keep only the callables `keep` accepts, preserving their order.
    pub fn retain(&mut self, mut keep: impl FnMut(&Callable) -> bool) {
        self.callables.retain(|c| keep(c));
        self.by_name.clear();
        for (i, callable) in self.callables.iter().enumerate() {
            self.by_name.entry(callable.name.clone()).or_default().push(i);
        }
    }

    pub fn len(&self) -> usize {
        self.callables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callables.is_empty()
    }
}
