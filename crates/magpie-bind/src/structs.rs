//! Struct and union definitions.
//!
//! A definition comes in two shapes. [`StructDef`]/[`UnionDef`] are the
//! templates the parser produces, with unbound field types that may name
//! generic parameters. [`Struct`]/[`Union`] are what binding produces: one
//! per concrete argument list, with every field type resolved.
//!
//! Instantiating a generic template never touches the template itself.
//! [`StructDef::clone_with`] hands back an owned deep copy together with
//! the parameter→argument substitution, and the resolver binds that copy.

use magpie_common::Position;
use rustc_hash::FxHashMap;

use crate::callable::{Callable, CallableKind};
use crate::decl::{BoundDecl, Field, TypeRef, UnboundDecl};
use crate::error::BindError;

/// Maps generic parameter names to the concrete types they stand for.
pub type Substitution = FxHashMap<String, BoundDecl>;

/// Largest number of fields (or cases) a single definition may hold.
pub const MAX_FIELDS: usize = 256;

fn next_index(len: usize, type_name: &str, position: Position) -> Result<u8, BindError> {
    u8::try_from(len).map_err(|_| BindError::TooManyFields {
        type_name: type_name.to_string(),
        position,
    })
}

fn substitution_for(type_params: &[String], type_args: &[BoundDecl]) -> Substitution {
    debug_assert_eq!(type_params.len(), type_args.len());
    type_params
        .iter()
        .cloned()
        .zip(type_args.iter().cloned())
        .collect()
}

// ── Structs ────────────────────────────────────────────────────────────

/// A struct definition as written in source.
#[derive(Clone, Debug, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub position: Position,
    pub type_params: Vec<String>,
    pub fields: Vec<Field<UnboundDecl>>,
}

impl StructDef {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        StructDef {
            name: name.into(),
            position,
            type_params: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, position: Position, type_params: Vec<String>) -> Self {
        StructDef {
            type_params,
            ..StructDef::new(name, position)
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    /// Append a field at the next index.
    ///
    /// Fails once the struct already has [`MAX_FIELDS`] fields.
    pub fn define(&mut self, name: impl Into<String>, ty: UnboundDecl) -> Result<u8, BindError> {
        let index = next_index(self.fields.len(), &self.name, self.position)?;
        self.fields.push(Field::new(name, ty, index));
        Ok(index)
    }

    pub fn field(&self, name: &str) -> Option<&Field<UnboundDecl>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Deep-copy this template for one concrete argument list.
    pub fn clone_with(&self, type_args: &[BoundDecl]) -> StructClone {
        StructClone {
            def: self.clone(),
            type_args: type_args.to_vec(),
            substitution: substitution_for(&self.type_params, type_args),
        }
    }
}

/// An owned copy of a [`StructDef`] waiting to be resolved under `substitution`.
#[derive(Clone, Debug)]
pub struct StructClone {
    pub def: StructDef,
    pub type_args: Vec<BoundDecl>,
    pub substitution: Substitution,
}

/// A fully bound struct: one instantiation of a [`StructDef`].
#[derive(Clone, Debug, PartialEq)]
pub struct Struct {
    pub name: String,
    pub type_args: Vec<BoundDecl>,
    pub position: Position,
    pub fields: Vec<Field<BoundDecl>>,
}

impl Struct {
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.name.clone(), self.type_args.clone())
    }

    pub fn ty(&self) -> BoundDecl {
        BoundDecl::Struct(self.type_ref())
    }

    pub fn field(&self, name: &str) -> Option<&Field<BoundDecl>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// The constructor, then a getter and a setter for every field.
    pub fn build_functions(&self) -> Vec<Callable> {
        let owner = self.type_ref();
        let ty = self.ty();
        let mut callables = Vec::with_capacity(1 + 2 * self.fields.len());

        callables.push(Callable::new(
            self.name.clone(),
            CallableKind::StructConstructor(owner.clone()),
            self.fields.iter().map(|f| f.ty.clone()).collect(),
            ty.clone(),
        ));

        for field in &self.fields {
            callables.push(Callable::new(
                field.name.clone(),
                CallableKind::FieldGetter {
                    owner: owner.clone(),
                    index: field.index,
                },
                vec![ty.clone()],
                field.ty.clone(),
            ));
            callables.push(Callable::new(
                format!("{}<-", field.name),
                CallableKind::FieldSetter {
                    owner: owner.clone(),
                    index: field.index,
                },
                vec![ty.clone(), field.ty.clone()],
                BoundDecl::unit(),
            ));
        }

        callables
    }
}

// ── Unions ─────────────────────────────────────────────────────────────

/// One alternative of a union. Cases that carry nothing have a `Unit` value.
#[derive(Clone, Debug, PartialEq)]
pub struct UnionCase<D> {
    pub name: String,
    pub value: D,
    pub tag: u8,
}

/// A union definition as written in source.
#[derive(Clone, Debug, PartialEq)]
pub struct UnionDef {
    pub name: String,
    pub position: Position,
    pub type_params: Vec<String>,
    pub cases: Vec<UnionCase<UnboundDecl>>,
}

impl UnionDef {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        UnionDef {
            name: name.into(),
            position,
            type_params: Vec::new(),
            cases: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, position: Position, type_params: Vec<String>) -> Self {
        UnionDef {
            type_params,
            ..UnionDef::new(name, position)
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    /// Append a case at the next tag.
    pub fn define(&mut self, name: impl Into<String>, value: UnboundDecl) -> Result<u8, BindError> {
        let tag = next_index(self.cases.len(), &self.name, self.position)?;
        self.cases.push(UnionCase {
            name: name.into(),
            value,
            tag,
        });
        Ok(tag)
    }

    pub fn case(&self, name: &str) -> Option<&UnionCase<UnboundDecl>> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn clone_with(&self, type_args: &[BoundDecl]) -> UnionClone {
        UnionClone {
            def: self.clone(),
            type_args: type_args.to_vec(),
            substitution: substitution_for(&self.type_params, type_args),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UnionClone {
    pub def: UnionDef,
    pub type_args: Vec<BoundDecl>,
    pub substitution: Substitution,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Union {
    pub name: String,
    pub type_args: Vec<BoundDecl>,
    pub position: Position,
    pub cases: Vec<UnionCase<BoundDecl>>,
}

impl Union {
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.name.clone(), self.type_args.clone())
    }

    pub fn ty(&self) -> BoundDecl {
        BoundDecl::Union(self.type_ref())
    }

    pub fn case(&self, name: &str) -> Option<&UnionCase<BoundDecl>> {
        self.cases.iter().find(|c| c.name == name)
    }

    /// For every case: a constructor, an `isCase` check and an `asCase` extractor.
    pub fn build_functions(&self) -> Vec<Callable> {
        let owner = self.type_ref();
        let ty = self.ty();
        let mut callables = Vec::with_capacity(3 * self.cases.len());

        for case in &self.cases {
            let params = if case.value.is_unit() {
                Vec::new()
            } else {
                vec![case.value.clone()]
            };
            callables.push(Callable::new(
                case.name.clone(),
                CallableKind::UnionConstructor {
                    owner: owner.clone(),
                    tag: case.tag,
                },
                params,
                ty.clone(),
            ));
            callables.push(Callable::new(
                format!("is{}", case.name),
                CallableKind::UnionCaseCheck {
                    owner: owner.clone(),
                    tag: case.tag,
                },
                vec![ty.clone()],
                BoundDecl::bool(),
            ));
            if !case.value.is_unit() {
                callables.push(Callable::new(
                    format!("as{}", case.name),
                    CallableKind::UnionCaseValue {
                        owner: owner.clone(),
                        tag: case.tag,
                    },
                    vec![ty.clone()],
                    case.value.clone(),
                ));
            }
        }

        callables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Struct {
        Struct {
            name: "Point".into(),
            type_args: vec![],
            position: Position::at(1, 1),
            fields: vec![
                Field::new("x", BoundDecl::int(), 0),
                Field::new("y", BoundDecl::int(), 1),
            ],
        }
    }

    #[test]
    fn define_assigns_dense_indices() {
        let mut def = StructDef::new("Point", Position::at(1, 1));
        assert_eq!(def.define("x", UnboundDecl::int()).unwrap(), 0);
        assert_eq!(def.define("y", UnboundDecl::int()).unwrap(), 1);
        assert_eq!(def.field("y").unwrap().index, 1);
    }

    #[test]
    fn define_rejects_the_257th_field() {
        let mut def = StructDef::new("Wide", Position::at(1, 1));
        for i in 0..MAX_FIELDS {
            def.define(format!("f{}", i), UnboundDecl::int()).unwrap();
        }
        assert_eq!(def.fields.last().unwrap().index, 255);

        let err = def.define("overflow", UnboundDecl::int()).unwrap_err();
        assert!(matches!(err, BindError::TooManyFields { .. }));
        assert_eq!(def.fields.len(), MAX_FIELDS);
    }

    #[test]
    fn clone_with_leaves_template_untouched() {
        let mut def = StructDef::generic("Box", Position::at(1, 1), vec!["T".into()]);
        def.define("value", UnboundDecl::named("T", Position::at(1, 12))).unwrap();

        let mut copy = def.clone_with(&[BoundDecl::int()]);
        copy.def.fields[0].name = "renamed".into();

        assert_eq!(def.fields[0].name, "value");
        assert_eq!(copy.substitution.get("T"), Some(&BoundDecl::int()));
        assert_eq!(copy.type_args, vec![BoundDecl::int()]);
    }

    #[test]
    fn struct_functions() {
        let names: Vec<_> = point().build_functions().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Point", "x", "x<-", "y", "y<-"]);
    }

    #[test]
    fn struct_constructor_takes_fields_in_order() {
        let functions = point().build_functions();
        let ctor = &functions[0];
        assert_eq!(ctor.params(), &[BoundDecl::int(), BoundDecl::int()]);
        assert_eq!(ctor.ret(), &point().ty());
    }

    #[test]
    fn union_functions_skip_extractor_for_empty_cases() {
        let option = Union {
            name: "Option".into(),
            type_args: vec![BoundDecl::int()],
            position: Position::at(1, 1),
            cases: vec![
                UnionCase { name: "None".into(), value: BoundDecl::unit(), tag: 0 },
                UnionCase { name: "Some".into(), value: BoundDecl::int(), tag: 1 },
            ],
        };
        let functions = option.build_functions();
        let names: Vec<_> = functions.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["None", "isNone", "Some", "isSome", "asSome"]);
        assert!(functions[0].params().is_empty());
        assert_eq!(functions[4].ret(), &BoundDecl::int());
    }
}
