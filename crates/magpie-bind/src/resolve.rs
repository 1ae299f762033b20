//! Type resolution and generic instantiation.
//!
//! The [`SearchSpace`] holds every type definition visible to a compilation
//! unit. The [`Resolver`] turns unbound declarations into bound ones against
//! that space, instantiating structs and unions on demand.
//!
//! Instantiations are memoized by [`TypeRef`], so `Box[Int]` is built once
//! no matter how many places mention it. A definition that refers to itself
//! (`List[T]` with a `List[T]` tail) terminates because the memo entry is
//! marked in progress before any field is resolved. Polymorphic recursion
//! that keeps producing new argument lists is cut off at
//! [`MAX_INSTANTIATION_DEPTH`], or sooner once the arguments grow past
//! [`MAX_TYPE_ARG_NODES`].

use std::rc::Rc;

use magpie_common::Position;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::callable::{Callable, CallableTable};
use crate::decl::{Atomic, BoundDecl, Field, NamedType, TypeRef, UnboundDecl};
use crate::error::BindError;
use crate::structs::{Struct, StructDef, Substitution, Union, UnionCase, UnionDef, MAX_FIELDS};
use crate::unit::SourceUnit;

/// Deepest chain of nested instantiations before giving up.
pub const MAX_INSTANTIATION_DEPTH: usize = 64;

/// Largest argument list, counted in type nodes, an instantiation may take.
pub const MAX_TYPE_ARG_NODES: usize = 1024;

// ── Search space ───────────────────────────────────────────────────────

/// A generic definition that a call name can construct.
#[derive(Clone, Debug)]
pub enum GenericOwner {
    Struct(Rc<StructDef>),
    /// A union and the tag of the case the name constructs.
    Union(Rc<UnionDef>, u8),
}

impl GenericOwner {
    /// Name of the struct or union this owner instantiates.
    pub fn type_name(&self) -> &str {
        match self {
            GenericOwner::Struct(def) => &def.name,
            GenericOwner::Union(def, _) => &def.name,
        }
    }
}

/// The type definitions a compilation unit can name.
#[derive(Debug, Default)]
pub struct SearchSpace {
    structs: FxHashMap<String, Rc<StructDef>>,
    unions: FxHashMap<String, Rc<UnionDef>>,
    foreign_types: FxHashSet<String>,
    /// Constructor names of generic definitions, in definition order.
    generic_owners: FxHashMap<String, Vec<GenericOwner>>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every type definition in `unit`.
    ///
    /// A name defined twice keeps its first definition; each later one is
    /// reported as [`BindError::DuplicateDefinition`].
    pub fn from_unit(unit: &SourceUnit, errors: &mut Vec<BindError>) -> Self {
        let mut space = SearchSpace::new();
        for def in &unit.structs {
            if let Err(err) = space.add_struct(def.clone()) {
                errors.push(err);
            }
        }
        for def in &unit.unions {
            if let Err(err) = space.add_union(def.clone()) {
                errors.push(err);
            }
        }
        for name in &unit.foreign_types {
            if let Err(err) = space.add_foreign_type(name, Position::none()) {
                errors.push(err);
            }
        }
        space
    }

    pub fn contains(&self, name: &str) -> bool {
        self.structs.contains_key(name)
            || self.unions.contains_key(name)
            || self.foreign_types.contains(name)
    }

    fn check_unique(&self, name: &str, position: Position) -> Result<(), BindError> {
        if self.contains(name) || Atomic::from_name(name).is_some() {
            return Err(BindError::DuplicateDefinition {
                name: name.to_string(),
                position,
            });
        }
        Ok(())
    }

    pub fn add_struct(&mut self, def: StructDef) -> Result<(), BindError> {
        self.check_unique(&def.name, def.position)?;
        let def = Rc::new(def);
        if def.is_generic() {
            self.generic_owners
                .entry(def.name.clone())
                .or_default()
                .push(GenericOwner::Struct(def.clone()));
        }
        self.structs.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn add_union(&mut self, def: UnionDef) -> Result<(), BindError> {
        self.check_unique(&def.name, def.position)?;
        let def = Rc::new(def);
        if def.is_generic() {
            for case in &def.cases {
                self.generic_owners
                    .entry(case.name.clone())
                    .or_default()
                    .push(GenericOwner::Union(def.clone(), case.tag));
            }
        }
        self.unions.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn add_foreign_type(&mut self, name: &str, position: Position) -> Result<(), BindError> {
        self.check_unique(name, position)?;
        self.foreign_types.insert(name.to_string());
        Ok(())
    }

    pub fn struct_def(&self, name: &str) -> Option<&Rc<StructDef>> {
        self.structs.get(name)
    }

    pub fn union_def(&self, name: &str) -> Option<&Rc<UnionDef>> {
        self.unions.get(name)
    }

    pub fn is_foreign_type(&self, name: &str) -> bool {
        self.foreign_types.contains(name)
    }

    /// The generic definitions constructed by calling `name`.
    pub fn generic_owners(&self, name: &str) -> &[GenericOwner] {
        self.generic_owners.get(name).map_or(&[], Vec::as_slice)
    }
}

// ── Resolver ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Instance {
    InProgress,
    Struct(Rc<Struct>),
    Union(Rc<Union>),
    /// Already reported; later references resolve to `Error` silently.
    Failed,
}

/// Resolves declarations and owns every instantiation made along the way.
#[derive(Debug)]
pub struct Resolver {
    space: SearchSpace,
    instances: FxHashMap<TypeRef, Instance>,
    structs: Vec<Rc<Struct>>,
    unions: Vec<Rc<Union>>,
    callables: CallableTable,
    depth: usize,
}

impl Resolver {
    pub fn new(space: SearchSpace) -> Self {
        Resolver {
            space,
            instances: FxHashMap::default(),
            structs: Vec::new(),
            unions: Vec::new(),
            callables: CallableTable::new(),
            depth: 0,
        }
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn callables(&self) -> &CallableTable {
        &self.callables
    }

    pub fn callables_mut(&mut self) -> &mut CallableTable {
        &mut self.callables
    }

    pub fn add_callable(&mut self, callable: Callable) {
        self.callables.add(callable);
    }

    /// The bound struct for `ty`, if it is a completed struct instantiation.
    pub fn struct_instance(&self, ty: &TypeRef) -> Option<&Rc<Struct>> {
        match self.instances.get(ty) {
            Some(Instance::Struct(s)) => Some(s),
            _ => None,
        }
    }

    pub fn union_instance(&self, ty: &TypeRef) -> Option<&Rc<Union>> {
        match self.instances.get(ty) {
            Some(Instance::Union(u)) => Some(u),
            _ => None,
        }
    }

    /// Hand back every instantiation, in creation order, and the callable table.
    pub fn finish(self) -> (Vec<Rc<Struct>>, Vec<Rc<Union>>, CallableTable) {
        (self.structs, self.unions, self.callables)
    }

    /// Resolve `decl`, reading generic parameters from `subst`.
    pub fn resolve(&mut self, decl: &UnboundDecl, subst: &Substitution) -> Result<BoundDecl, BindError> {
        match decl {
            UnboundDecl::Atomic(a) => Ok(BoundDecl::Atomic(*a)),
            UnboundDecl::Tuple(elems) => Ok(BoundDecl::Tuple(self.resolve_all(elems, subst)?)),
            UnboundDecl::Record(fields) => {
                let mut bound = Vec::with_capacity(fields.len());
                for field in fields {
                    let ty = self.resolve(&field.ty, subst)?;
                    bound.push(Field::new(field.name.clone(), ty, field.index));
                }
                Ok(BoundDecl::Record(bound))
            }
            UnboundDecl::Func(func) => {
                let params = self.resolve_all(&func.params, subst)?;
                let ret = self.resolve(&func.ret, subst)?;
                Ok(BoundDecl::func(params, ret))
            }
            UnboundDecl::Array(elem) => Ok(BoundDecl::array(self.resolve(elem, subst)?)),
            UnboundDecl::Named(named) => self.resolve_named(named, subst),
        }
    }

    pub fn resolve_all(&mut self, decls: &[UnboundDecl], subst: &Substitution) -> Result<Vec<BoundDecl>, BindError> {
        decls.iter().map(|d| self.resolve(d, subst)).collect()
    }

    fn resolve_named(&mut self, named: &NamedType, subst: &Substitution) -> Result<BoundDecl, BindError> {
        if named.type_args.is_empty() {
            if let Some(arg) = subst.get(&named.name) {
                return Ok(arg.clone());
            }
            if let Some(atomic) = Atomic::from_name(&named.name) {
                return Ok(BoundDecl::Atomic(atomic));
            }
        }

        if self.space.struct_def(&named.name).is_some() {
            let args = self.resolve_all(&named.type_args, subst)?;
            return self.instantiate_struct(&named.name, args, named.position);
        }
        if self.space.union_def(&named.name).is_some() {
            let args = self.resolve_all(&named.type_args, subst)?;
            return self.instantiate_union(&named.name, args, named.position);
        }
        if self.space.is_foreign_type(&named.name) {
            if !named.type_args.is_empty() {
                return Err(BindError::GenericArityMismatch {
                    name: named.name.clone(),
                    expected: 0,
                    found: named.type_args.len(),
                    position: named.position,
                });
            }
            return Ok(BoundDecl::Foreign(named.name.clone()));
        }

        Err(BindError::UnresolvedName {
            name: named.name.clone(),
            position: named.position,
        })
    }

    /// Check the memo for `key`. `Some` means no new work is needed.
    fn lookup_instance(&self, key: &TypeRef, wrap: fn(TypeRef) -> BoundDecl) -> Option<BoundDecl> {
        match self.instances.get(key)? {
            Instance::Failed => Some(BoundDecl::Error),
            _ => Some(wrap(key.clone())),
        }
    }

    fn begin_instance(
        &mut self,
        key: &TypeRef,
        expected_arity: usize,
        field_count: usize,
        position: Position,
    ) -> Result<(), BindError> {
        if expected_arity != key.type_args.len() {
            return Err(BindError::GenericArityMismatch {
                name: key.name.clone(),
                expected: expected_arity,
                found: key.type_args.len(),
                position,
            });
        }
        if field_count > MAX_FIELDS {
            self.instances.insert(key.clone(), Instance::Failed);
            return Err(BindError::TooManyFields {
                type_name: key.name.clone(),
                position,
            });
        }
        let arg_nodes: usize = key.type_args.iter().map(BoundDecl::node_count).sum();
        if self.depth >= MAX_INSTANTIATION_DEPTH || arg_nodes > MAX_TYPE_ARG_NODES {
            self.instances.insert(key.clone(), Instance::Failed);
            return Err(BindError::InstantiationTooDeep {
                name: key.name.clone(),
                position,
            });
        }
        self.instances.insert(key.clone(), Instance::InProgress);
        Ok(())
    }

    /// Mark `failed` as failed, along with every instantiation completed
    /// while it was in progress that refers to it.
    ///
    /// `first` holds the lengths of the struct and union lists when `failed`
    /// began; nothing created earlier can refer to it.
    fn discard_dependents(&mut self, failed: TypeRef, first: (usize, usize)) {
        let mut tainted = FxHashSet::default();
        tainted.insert(failed);
        loop {
            let before = tainted.len();
            for s in &self.structs[first.0..] {
                if refers_to(&s.ty(), &tainted) || s.fields.iter().any(|f| refers_to(&f.ty, &tainted)) {
                    tainted.insert(s.type_ref());
                }
            }
            for u in &self.unions[first.1..] {
                if refers_to(&u.ty(), &tainted) || u.cases.iter().any(|c| refers_to(&c.value, &tainted)) {
                    tainted.insert(u.type_ref());
                }
            }
            if tainted.len() == before {
                break;
            }
        }

        if tainted.len() > 1 {
            debug!(discarded = tainted.len() - 1, "discarded dependent instantiations");
            self.structs.retain(|s| !tainted.contains(&s.type_ref()));
            self.unions.retain(|u| !tainted.contains(&u.type_ref()));
            self.callables
                .retain(|c| !c.kind.owner().map_or(false, |owner| tainted.contains(owner)));
        }
        for key in tainted {
            self.instances.insert(key, Instance::Failed);
        }
    }

    /// Instantiate the struct `name` with `type_args`.
    ///
    /// Repeated requests for the same argument list return the same
    /// instantiation. On success the struct's constructor, getters and
    /// setters join the callable table.
    pub fn instantiate_struct(
        &mut self,
        name: &str,
        type_args: Vec<BoundDecl>,
        position: Position,
    ) -> Result<BoundDecl, BindError> {
        let key = TypeRef::new(name, type_args);
        if let Some(ty) = self.lookup_instance(&key, BoundDecl::Struct) {
            return Ok(ty);
        }
        let def = match self.space.struct_def(name) {
            Some(def) => def.clone(),
            None => {
                return Err(BindError::UnresolvedName {
                    name: name.to_string(),
                    position,
                })
            }
        };
        self.begin_instance(&key, def.type_params.len(), def.fields.len(), position)?;

        let first_dependent = (self.structs.len(), self.unions.len());
        let clone = def.clone_with(&key.type_args);
        self.depth += 1;
        let mut fields = Vec::with_capacity(clone.def.fields.len());
        let mut failure = None;
        for field in &clone.def.fields {
            match self.resolve(&field.ty, &clone.substitution) {
                Ok(ty) => fields.push(Field::new(field.name.clone(), ty, field.index)),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.depth -= 1;

        if let Some(err) = failure {
            self.discard_dependents(key, first_dependent);
            return Err(err.with_fallback_position(def.position));
        }

        let bound = Rc::new(Struct {
            name: clone.def.name,
            type_args: clone.type_args,
            position: def.position,
            fields,
        });
        debug!(ty = %key, fields = bound.fields.len(), "instantiated struct");
        self.callables.extend(bound.build_functions());
        self.structs.push(bound.clone());
        self.instances.insert(key.clone(), Instance::Struct(bound));
        Ok(BoundDecl::Struct(key))
    }

    /// Instantiate the union `name` with `type_args`.
    pub fn instantiate_union(
        &mut self,
        name: &str,
        type_args: Vec<BoundDecl>,
        position: Position,
    ) -> Result<BoundDecl, BindError> {
        let key = TypeRef::new(name, type_args);
        if let Some(ty) = self.lookup_instance(&key, BoundDecl::Union) {
            return Ok(ty);
        }
        let def = match self.space.union_def(name) {
            Some(def) => def.clone(),
            None => {
                return Err(BindError::UnresolvedName {
                    name: name.to_string(),
                    position,
                })
            }
        };
        self.begin_instance(&key, def.type_params.len(), def.cases.len(), position)?;

        let first_dependent = (self.structs.len(), self.unions.len());
        let clone = def.clone_with(&key.type_args);
        self.depth += 1;
        let mut cases = Vec::with_capacity(clone.def.cases.len());
        let mut failure = None;
        for case in &clone.def.cases {
            match self.resolve(&case.value, &clone.substitution) {
                Ok(value) => cases.push(UnionCase {
                    name: case.name.clone(),
                    value,
                    tag: case.tag,
                }),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.depth -= 1;

        if let Some(err) = failure {
            self.discard_dependents(key, first_dependent);
            return Err(err.with_fallback_position(def.position));
        }

        let bound = Rc::new(Union {
            name: clone.def.name,
            type_args: clone.type_args,
            position: def.position,
            cases,
        });
        debug!(ty = %key, cases = bound.cases.len(), "instantiated union");
        self.callables.extend(bound.build_functions());
        self.unions.push(bound.clone());
        self.instances.insert(key.clone(), Instance::Union(bound));
        Ok(BoundDecl::Union(key))
    }
}

/// Whether `ty` names any of `keys`, at any depth.
fn refers_to(ty: &BoundDecl, keys: &FxHashSet<TypeRef>) -> bool {
    match ty {
        BoundDecl::Atomic(_) | BoundDecl::Foreign(_) | BoundDecl::Error => false,
        BoundDecl::Tuple(elems) => elems.iter().any(|e| refers_to(e, keys)),
        BoundDecl::Record(fields) => fields.iter().any(|f| refers_to(&f.ty, keys)),
        BoundDecl::Func(func) => {
            func.params.iter().any(|p| refers_to(p, keys)) || refers_to(&func.ret, keys)
        }
        BoundDecl::Array(elem) => refers_to(elem, keys),
        BoundDecl::Struct(r) | BoundDecl::Union(r) => {
            keys.contains(r) || r.type_args.iter().any(|a| refers_to(a, keys))
        }
    }
}

// ── Type argument inference ────────────────────────────────────────────

/// Infer `type_params` by matching declared `patterns` against `actuals`.
///
/// Returns the arguments in parameter order, or `None` if some parameter
/// is not mentioned by any pattern.
pub fn infer_type_args(
    type_params: &[String],
    patterns: &[UnboundDecl],
    actuals: &[BoundDecl],
) -> Option<Vec<BoundDecl>> {
    let mut found = Substitution::default();
    for (pattern, actual) in patterns.iter().zip(actuals) {
        collect_bindings(pattern, actual, type_params, &mut found);
    }
    type_params.iter().map(|p| found.get(p).cloned()).collect()
}

fn collect_bindings(pattern: &UnboundDecl, actual: &BoundDecl, params: &[String], found: &mut Substitution) {
    match (pattern, actual) {
        (UnboundDecl::Named(named), _) if named.type_args.is_empty() && params.contains(&named.name) => {
            // The first binding wins unless it was a placeholder.
            let slot = found.entry(named.name.clone()).or_insert_with(|| actual.clone());
            if matches!(slot, BoundDecl::Error | BoundDecl::Atomic(Atomic::Never)) {
                *slot = actual.clone();
            }
        }
        (UnboundDecl::Named(named), BoundDecl::Struct(r) | BoundDecl::Union(r))
            if named.name == r.name && named.type_args.len() == r.type_args.len() =>
        {
            for (p, a) in named.type_args.iter().zip(&r.type_args) {
                collect_bindings(p, a, params, found);
            }
        }
        (UnboundDecl::Tuple(ps), BoundDecl::Tuple(elems)) if ps.len() == elems.len() => {
            for (p, a) in ps.iter().zip(elems) {
                collect_bindings(p, a, params, found);
            }
        }
        (UnboundDecl::Record(ps), BoundDecl::Record(fields)) if ps.len() == fields.len() => {
            for (p, a) in ps.iter().zip(fields) {
                collect_bindings(&p.ty, &a.ty, params, found);
            }
        }
        (UnboundDecl::Array(p), BoundDecl::Array(a)) => collect_bindings(p, a, params, found),
        (UnboundDecl::Func(p), BoundDecl::Func(a)) if p.params.len() == a.params.len() => {
            for (pp, ap) in p.params.iter().zip(&a.params) {
                collect_bindings(pp, ap, params, found);
            }
            collect_bindings(&p.ret, &a.ret, params, found);
        }
        _ => {}
    }
}
