//! The unbound→bound pass.
//!
//! Binding runs in three phases over a [`SourceUnit`]:
//!
//! 1. Collect type definitions into a [`SearchSpace`] and instantiate every
//!    non-generic struct and union, registering their derived callables.
//! 2. Resolve the signatures of foreign and user functions and register
//!    them as callables, so bodies can call functions defined later.
//! 3. Bind each function body under a fresh [`Scope`].
//!
//! Errors are collected, never thrown. A sub-tree that fails to bind is
//! replaced by a node of type [`BoundDecl::Error`], which matches every
//! type, so one mistake yields one diagnostic.

use magpie_common::Position;
use tracing::trace;

use crate::builtins;
use crate::callable::{Callable, CallableKind};
use crate::decl::{BoundDecl, TypeRef, UnboundDecl};
use crate::error::{BindError, ConstraintOrigin};
use crate::expr::{BoundExpr, BoundExprKind, CallTarget, IntrinsicOp, UnboundExpr, UnboundExprKind};
use crate::resolve::{infer_type_args, GenericOwner, Resolver, SearchSpace};
use crate::scope::{Local, Scope};
use crate::structs::Substitution;
use crate::unit::{BoundFunction, BoundUnit, FunctionDef, FunctionId, SourceUnit};
use crate::BindResult;

/// Bind a whole compilation unit.
pub fn bind(unit: &SourceUnit) -> BindResult {
    let mut errors = Vec::new();
    let space = SearchSpace::from_unit(unit, &mut errors);
    let mut binder = Binder::new(space, errors);
    binder.instantiate_concrete_types(unit);
    let signatures = binder.register_functions(unit);

    let mut functions = Vec::with_capacity(unit.functions.len());
    for (index, (def, signature)) in unit.functions.iter().zip(signatures).enumerate() {
        let id = FunctionId(index);
        functions.push(binder.bind_function(id, def, signature));
    }

    let (structs, unions, callables) = binder.resolver.finish();
    BindResult {
        unit: BoundUnit {
            structs,
            unions,
            functions,
            callables,
        },
        errors: binder.errors,
    }
}

/// A resolved function signature.
struct Signature {
    params: Vec<BoundDecl>,
    ret: BoundDecl,
}

/// Binding state for one compilation unit.
pub struct Binder {
    resolver: Resolver,
    errors: Vec<BindError>,
    /// Locals of the function currently being bound.
    scope: Scope,
    /// Declared return type of the function currently being bound.
    return_type: BoundDecl,
}

impl Binder {
    pub fn new(space: SearchSpace, errors: Vec<BindError>) -> Self {
        let mut resolver = Resolver::new(space);
        builtins::register_intrinsics(resolver.callables_mut());
        Binder {
            resolver,
            errors,
            scope: Scope::new(),
            return_type: BoundDecl::unit(),
        }
    }

    pub fn errors(&self) -> &[BindError] {
        &self.errors
    }

    fn error(&mut self, err: BindError) {
        self.errors.push(err);
    }

    /// Resolve `decl` with no generic parameters in scope, reporting failure.
    fn resolve_or_error(&mut self, decl: &UnboundDecl) -> BoundDecl {
        match self.resolver.resolve(decl, &Substitution::default()) {
            Ok(ty) => ty,
            Err(err) => {
                self.error(err);
                BoundDecl::Error
            }
        }
    }

    // ── Definitions ────────────────────────────────────────────────────

    fn instantiate_concrete_types(&mut self, unit: &SourceUnit) {
        for def in unit.structs.iter().filter(|d| !d.is_generic()) {
            if let Err(err) = self.resolver.instantiate_struct(&def.name, Vec::new(), def.position) {
                self.error(err);
            }
        }
        for def in unit.unions.iter().filter(|d| !d.is_generic()) {
            if let Err(err) = self.resolver.instantiate_union(&def.name, Vec::new(), def.position) {
                self.error(err);
            }
        }
    }

    fn register_functions(&mut self, unit: &SourceUnit) -> Vec<Signature> {
        for foreign in &unit.foreign_functions {
            let params = foreign
                .params
                .iter()
                .map(|p| self.resolve_or_error(p))
                .collect();
            let ret = self.resolve_or_error(&foreign.ret);
            self.resolver.add_callable(Callable::new(
                foreign.name.clone(),
                CallableKind::Foreign(foreign.id),
                params,
                ret,
            ));
        }

        let mut signatures = Vec::with_capacity(unit.functions.len());
        for (index, def) in unit.functions.iter().enumerate() {
            let params: Vec<BoundDecl> = def
                .params
                .iter()
                .map(|p| self.resolve_or_error(&p.ty))
                .collect();
            let ret = self.resolve_or_error(&def.ret);
            self.resolver.add_callable(Callable::new(
                def.name.clone(),
                CallableKind::Function(FunctionId(index)),
                params.clone(),
                ret.clone(),
            ));
            signatures.push(Signature { params, ret });
        }
        signatures
    }

    fn bind_function(&mut self, id: FunctionId, def: &FunctionDef, signature: Signature) -> BoundFunction {
        self.scope = Scope::new();
        self.return_type = signature.ret.clone();

        self.scope.push();
        for (param, ty) in def.params.iter().zip(&signature.params) {
            if self.scope.contains(&param.name) {
                self.error(BindError::DuplicateLocal {
                    name: param.name.clone(),
                    position: def.position,
                });
            }
            self.scope.define(param.name.clone(), ty.clone(), false);
        }
        let mut body = self.bind_expr(&def.body);
        self.scope.pop();

        // A unit function discards whatever its body evaluates to.
        if !signature.ret.is_unit() && !signature.ret.matches(&body.ty) {
            self.error(BindError::Mismatch {
                expected: signature.ret.clone(),
                found: body.ty.clone(),
                origin: ConstraintOrigin::FunctionBody,
                position: body.position.or(def.position),
            });
        }

        let num_locals = self.scope.num_variables();
        body.walk_mut(&mut |e| {
            if let BoundExprKind::Locals { num_variables } = &mut e.kind {
                *num_variables = num_locals;
            }
        });
        trace!(function = %def.name, num_locals, "bound function");

        BoundFunction {
            id,
            name: def.name.clone(),
            position: def.position,
            params: signature.params,
            ret: signature.ret,
            body,
            num_locals,
        }
    }

    // ── Expressions ────────────────────────────────────────────────────

    /// Bind one expression. The unbound tree is only read.
    pub fn bind_expr(&mut self, expr: &UnboundExpr) -> BoundExpr {
        let position = expr.position;
        match &expr.kind {
            UnboundExprKind::Unit => BoundExpr::unit(position),
            UnboundExprKind::Bool(value) => {
                BoundExpr::new(BoundExprKind::Bool(*value), BoundDecl::bool(), position)
            }
            UnboundExprKind::Int(value) => {
                BoundExpr::new(BoundExprKind::Int(*value), BoundDecl::int(), position)
            }
            UnboundExprKind::String(value) => BoundExpr::new(
                BoundExprKind::String(value.clone()),
                BoundDecl::string(),
                position,
            ),
            UnboundExprKind::Name { name, type_args } => {
                if type_args.is_empty() {
                    if let Some(local) = self.scope.lookup(name).cloned() {
                        return load_local(&local, position);
                    }
                }
                self.bind_call(name, type_args, Vec::new(), position)
            }
            UnboundExprKind::FuncRef { name, params } => self.bind_func_ref(name, params, position),
            UnboundExprKind::Tuple(elems) => {
                if elems.is_empty() {
                    return BoundExpr::unit(position);
                }
                let elems: Vec<BoundExpr> = elems.iter().map(|e| self.bind_expr(e)).collect();
                let ty = BoundDecl::Tuple(elems.iter().map(|e| e.ty.clone()).collect());
                BoundExpr::new(BoundExprKind::Tuple(elems), ty, position)
            }
            UnboundExprKind::Block(exprs) => {
                self.scope.push();
                let exprs: Vec<BoundExpr> = exprs.iter().map(|e| self.bind_expr(e)).collect();
                self.scope.pop();
                let ty = exprs.last().map_or_else(BoundDecl::unit, |e| e.ty.clone());
                BoundExpr::new(BoundExprKind::Block(exprs), ty, position)
            }
            UnboundExprKind::Define {
                name,
                mutable,
                value,
            } => self.bind_define(name, *mutable, value, position),
            UnboundExprKind::Assign { name, value } => self.bind_assign(name, value, position),
            UnboundExprKind::Call {
                name,
                type_args,
                args,
            } => {
                let args = args.iter().map(|a| self.bind_expr(a)).collect();
                self.bind_call(name, type_args, args, position)
            }
            UnboundExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.bind_if(condition, then_branch, else_branch.as_deref(), position),
            UnboundExprKind::While { condition, body } => {
                let condition = self.bind_condition(condition);
                self.scope.push();
                let body = self.bind_expr(body);
                self.scope.pop();
                BoundExpr::new(
                    BoundExprKind::While {
                        condition: Box::new(condition),
                        body: Box::new(body),
                    },
                    BoundDecl::unit(),
                    position,
                )
            }
            UnboundExprKind::Return(value) => {
                let value = match value {
                    Some(value) => self.bind_expr(value),
                    None => BoundExpr::unit(position),
                };
                if !self.return_type.matches(&value.ty) {
                    self.error(BindError::Mismatch {
                        expected: self.return_type.clone(),
                        found: value.ty.clone(),
                        origin: ConstraintOrigin::Return,
                        position: value.position.or(position),
                    });
                }
                BoundExpr::new(
                    BoundExprKind::Return(Box::new(value)),
                    BoundDecl::never(),
                    position,
                )
            }
        }
    }

    fn bind_condition(&mut self, condition: &UnboundExpr) -> BoundExpr {
        let condition = self.bind_expr(condition);
        if !condition.ty.matches(&BoundDecl::bool()) {
            self.error(BindError::Mismatch {
                expected: BoundDecl::bool(),
                found: condition.ty.clone(),
                origin: ConstraintOrigin::Condition,
                position: condition.position,
            });
        }
        condition
    }

    fn bind_define(&mut self, name: &str, mutable: bool, value: &UnboundExpr, position: Position) -> BoundExpr {
        let value = self.bind_expr(value);
        if self.scope.contains(name) {
            self.error(BindError::DuplicateLocal {
                name: name.to_string(),
                position,
            });
        }
        let slot = self.scope.define(name, value.ty.clone(), mutable);
        store_local(name, slot, value, position)
    }

    fn bind_assign(&mut self, name: &str, value: &UnboundExpr, position: Position) -> BoundExpr {
        let value = self.bind_expr(value);
        let Some(local) = self.scope.lookup(name).cloned() else {
            self.error(BindError::UnresolvedName {
                name: name.to_string(),
                position,
            });
            return BoundExpr::error(position);
        };
        if !local.mutable {
            self.error(BindError::MutabilityViolation {
                name: name.to_string(),
                position,
            });
        }
        if !local.ty.matches(&value.ty) {
            self.error(BindError::Mismatch {
                expected: local.ty.clone(),
                found: value.ty.clone(),
                origin: ConstraintOrigin::Assignment,
                position: value.position.or(position),
            });
        }
        store_local(name, local.slot, value, position)
    }

    fn bind_if(
        &mut self,
        condition: &UnboundExpr,
        then_branch: &UnboundExpr,
        else_branch: Option<&UnboundExpr>,
        position: Position,
    ) -> BoundExpr {
        let condition = self.bind_condition(condition);

        self.scope.push();
        let then_branch = self.bind_expr(then_branch);
        self.scope.pop();

        let else_branch = else_branch.map(|e| {
            self.scope.push();
            let bound = self.bind_expr(e);
            self.scope.pop();
            bound
        });

        let ty = match &else_branch {
            None => BoundDecl::unit(),
            Some(else_branch) => self.unify_branches(&then_branch, else_branch),
        };

        BoundExpr::new(
            BoundExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
            ty,
            position,
        )
    }

    /// The type of an `if`/`else` given the types of its arms.
    fn unify_branches(&mut self, then_branch: &BoundExpr, else_branch: &BoundExpr) -> BoundDecl {
        let (a, b) = (&then_branch.ty, &else_branch.ty);
        if a.is_never() {
            return b.clone();
        }
        if b.is_never() || a == b {
            return a.clone();
        }
        if a.is_unit() || b.is_unit() {
            return BoundDecl::unit();
        }
        if a.matches(b) {
            // One side is an error placeholder.
            return if matches!(a, BoundDecl::Error) { b.clone() } else { a.clone() };
        }
        self.error(BindError::Mismatch {
            expected: a.clone(),
            found: b.clone(),
            origin: ConstraintOrigin::IfBranches {
                then_position: then_branch.position,
                else_position: else_branch.position,
            },
            position: else_branch.position,
        });
        a.clone()
    }

    fn bind_func_ref(&mut self, name: &str, params: &[UnboundDecl], position: Position) -> BoundExpr {
        let params: Vec<BoundDecl> = params.iter().map(|p| self.resolve_or_error(p)).collect();
        let found = self
            .resolver
            .callables()
            .overloads(name)
            .filter(|c| c.params() == params.as_slice())
            .find_map(|c| match c.kind {
                CallableKind::Function(id) => Some((id, c.fn_type())),
                _ => None,
            });
        if let Some((id, ty)) = found {
            return BoundExpr::new(BoundExprKind::FuncRef(id), ty, position);
        }
        if params.iter().any(BoundDecl::contains_error) {
            return BoundExpr::error(position);
        }

        let any_function = self
            .resolver
            .callables()
            .overloads(name)
            .any(|c| matches!(c.kind, CallableKind::Function(_)));
        self.error(if any_function {
            BindError::NoMatchingOverload {
                name: name.to_string(),
                arg_types: params,
                position,
            }
        } else {
            BindError::UnresolvedName {
                name: name.to_string(),
                position,
            }
        });
        BoundExpr::error(position)
    }

    // ── Calls ──────────────────────────────────────────────────────────

    /// Resolve a call by name and lower it to the node its callee needs.
    fn bind_call(
        &mut self,
        name: &str,
        type_args: &[UnboundDecl],
        args: Vec<BoundExpr>,
        position: Position,
    ) -> BoundExpr {
        let arg_types: Vec<BoundDecl> = args.iter().map(|a| a.ty.clone()).collect();

        let local = if type_args.is_empty() {
            self.scope.lookup(name).cloned()
        } else {
            None
        };
        if let Some(local) = &local {
            if let BoundDecl::Func(_) = local.ty {
                return self.bind_indirect_call(local, args, position);
            }
        }

        let owners = self.resolver.space().generic_owners(name).to_vec();
        if owners.is_empty() && !type_args.is_empty() {
            self.error(BindError::GenericArityMismatch {
                name: name.to_string(),
                expected: 0,
                found: type_args.len(),
                position,
            });
            return BoundExpr::error(position);
        }

        // Constructors of generic owners come first, then every other
        // overload of the name. An owner failure is reported only when no
        // candidate is left.
        let mut candidates: Vec<Callable> = Vec::new();
        let mut owner_error = None;
        let mut already_reported = false;
        for owner in &owners {
            match self.instantiate_owner(name, owner, type_args, &arg_types, position) {
                Ok(Some(owner_ref)) => candidates.extend(
                    self.resolver
                        .callables()
                        .overloads(name)
                        .filter(|c| c.kind.is_constructor() && c.kind.owner() == Some(&owner_ref))
                        .cloned(),
                ),
                Ok(None) => already_reported = true,
                Err(err) => {
                    owner_error.get_or_insert(err);
                }
            }
        }
        if type_args.is_empty() {
            let generic_types: Vec<&str> = owners.iter().map(GenericOwner::type_name).collect();
            candidates.extend(
                self.resolver
                    .callables()
                    .overloads(name)
                    .filter(|c| {
                        !(c.kind.is_constructor()
                            && c.kind.owner().map_or(false, |o| generic_types.contains(&o.name.as_str())))
                    })
                    .cloned(),
            );
        }

        if let Some(callable) = candidates.iter().find(|c| c.accepts(&arg_types)) {
            return lower_call(callable, args, position);
        }

        if candidates.is_empty() {
            if let Some(err) = owner_error {
                self.error(err);
                return BoundExpr::error(position);
            }
            if already_reported {
                return BoundExpr::error(position);
            }
            self.error(match local {
                Some(local) => BindError::NotCallable {
                    name: name.to_string(),
                    ty: local.ty,
                    position,
                },
                None => BindError::UnresolvedName {
                    name: name.to_string(),
                    position,
                },
            });
            return BoundExpr::error(position);
        }

        if let [only] = candidates.as_slice() {
            self.report_signature_mismatch(name, only.params(), &args, position);
        } else {
            self.error(BindError::NoMatchingOverload {
                name: name.to_string(),
                arg_types,
                position,
            });
        }
        BoundExpr::error(position)
    }

    /// Explain why a single candidate rejected the arguments.
    fn report_signature_mismatch(&mut self, name: &str, params: &[BoundDecl], args: &[BoundExpr], position: Position) {
        if params.len() != args.len() {
            self.error(BindError::ArityMismatch {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
                position,
            });
            return;
        }
        for (index, (param, arg)) in params.iter().zip(args).enumerate() {
            if !param.matches(&arg.ty) {
                self.error(BindError::Mismatch {
                    expected: param.clone(),
                    found: arg.ty.clone(),
                    origin: ConstraintOrigin::CallArg { index },
                    position: arg.position.or(position),
                });
                return;
            }
        }
    }

    fn bind_indirect_call(&mut self, local: &Local, args: Vec<BoundExpr>, position: Position) -> BoundExpr {
        let BoundDecl::Func(func) = &local.ty else {
            return BoundExpr::error(position);
        };
        let ret = func.ret.clone();
        let accepted = func.params.len() == args.len()
            && func.params.iter().zip(&args).all(|(p, a)| p.matches(&a.ty));
        if !accepted {
            let params = func.params.clone();
            self.report_signature_mismatch(&local.name, &params, &args, position);
            return BoundExpr::error(position);
        }
        BoundExpr::new(
            BoundExprKind::Call {
                target: CallTarget::Indirect(Box::new(load_local(local, position))),
                args,
            },
            ret,
            position,
        )
    }

    /// Instantiate the generic definition a constructor call names.
    ///
    /// Type arguments come from the call if it spells them out and are
    /// inferred from the argument types otherwise. `Ok(None)` means the
    /// instantiation failed earlier and has already been reported.
    fn instantiate_owner(
        &mut self,
        name: &str,
        owner: &GenericOwner,
        type_args: &[UnboundDecl],
        arg_types: &[BoundDecl],
        position: Position,
    ) -> Result<Option<TypeRef>, BindError> {
        let (type_params, patterns): (&[String], Vec<UnboundDecl>) = match owner {
            GenericOwner::Struct(def) => (
                def.type_params.as_slice(),
                def.fields.iter().map(|f| f.ty.clone()).collect(),
            ),
            GenericOwner::Union(def, tag) => {
                let value = def
                    .cases
                    .iter()
                    .find(|c| c.tag == *tag)
                    .map(|c| c.value.clone())
                    .unwrap_or_else(UnboundDecl::unit);
                let patterns = if value == UnboundDecl::unit() { Vec::new() } else { vec![value] };
                (def.type_params.as_slice(), patterns)
            }
        };

        let resolved_args = if type_args.is_empty() {
            if patterns.len() != arg_types.len() {
                return Err(BindError::ArityMismatch {
                    name: name.to_string(),
                    expected: patterns.len(),
                    found: arg_types.len(),
                    position,
                });
            }
            if arg_types.iter().any(BoundDecl::contains_error) {
                return Ok(None);
            }
            infer_type_args(type_params, &patterns, arg_types).ok_or_else(|| {
                BindError::CannotInferTypeArgs {
                    name: name.to_string(),
                    position,
                }
            })?
        } else {
            self.resolver.resolve_all(type_args, &Substitution::default())?
        };

        let ty = match owner {
            GenericOwner::Struct(def) => self.resolver.instantiate_struct(&def.name, resolved_args, position)?,
            GenericOwner::Union(def, _) => self.resolver.instantiate_union(&def.name, resolved_args, position)?,
        };
        Ok(match ty {
            BoundDecl::Struct(r) | BoundDecl::Union(r) => Some(r),
            _ => None,
        })
    }
}

// ── Lowering ───────────────────────────────────────────────────────────

fn load_local(local: &Local, position: Position) -> BoundExpr {
    BoundExpr::new(
        BoundExprKind::Load {
            source: Box::new(BoundExpr::locals(position)),
            index: local.slot,
            name: local.name.clone(),
        },
        local.ty.clone(),
        position,
    )
}

fn store_local(name: &str, slot: usize, value: BoundExpr, position: Position) -> BoundExpr {
    BoundExpr::new(
        BoundExprKind::Store {
            target: Box::new(BoundExpr::locals(position)),
            index: slot,
            name: name.to_string(),
            value: Box::new(value),
        },
        BoundDecl::unit(),
        position,
    )
}

/// Turn a resolved call into the bound node its callee kind requires.
fn lower_call(callable: &Callable, args: Vec<BoundExpr>, position: Position) -> BoundExpr {
    let ty = callable.ret().clone();
    let kind = match &callable.kind {
        CallableKind::Function(id) => BoundExprKind::Call {
            target: CallTarget::Function(*id),
            args,
        },
        CallableKind::Intrinsic(op) => BoundExprKind::Intrinsic { op: *op, args },
        CallableKind::Foreign(id) => BoundExprKind::ForeignCall {
            id: *id,
            name: callable.name.clone(),
            args,
        },
        CallableKind::StructConstructor(owner) => BoundExprKind::Call {
            target: CallTarget::StructConstructor(owner.clone()),
            args,
        },
        CallableKind::UnionConstructor { owner, tag } => BoundExprKind::Call {
            target: CallTarget::UnionConstructor {
                union: owner.clone(),
                tag: *tag,
            },
            args,
        },
        CallableKind::UnionCaseCheck { tag, .. } => BoundExprKind::Intrinsic {
            op: IntrinsicOp::IsCase(*tag),
            args,
        },
        CallableKind::UnionCaseValue { tag, .. } => BoundExprKind::Intrinsic {
            op: IntrinsicOp::CaseValue(*tag),
            args,
        },
        CallableKind::FieldGetter { index, .. } => {
            let Some(source) = args.into_iter().next() else {
                return BoundExpr::error(position);
            };
            BoundExprKind::Load {
                source: Box::new(source),
                index: usize::from(*index),
                name: callable.name.clone(),
            }
        }
        CallableKind::FieldSetter { index, .. } => {
            let mut args = args.into_iter();
            let (Some(target), Some(value)) = (args.next(), args.next()) else {
                return BoundExpr::error(position);
            };
            BoundExprKind::Store {
                target: Box::new(target),
                index: usize::from(*index),
                name: callable.name.trim_end_matches("<-").to_string(),
                value: Box::new(value),
            }
        }
    };
    BoundExpr::new(kind, ty, position)
}
