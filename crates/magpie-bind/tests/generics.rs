//! Integration tests for generic struct and union instantiation.

use magpie_bind::decl::{BoundDecl, TypeRef, UnboundDecl};
use magpie_bind::error::BindError;
use magpie_bind::expr::{BoundExpr, BoundExprKind, CallTarget, UnboundExpr};
use magpie_bind::structs::{StructDef, UnionDef};
use magpie_bind::unit::{FunctionDef, FunctionId, Param, SourceUnit};
use magpie_bind::BindResult;
use magpie_common::Position;

// ── Helpers ────────────────────────────────────────────────────────────

fn p(line: u32, column: u32) -> Position {
    Position::at(line, column)
}

fn t() -> UnboundDecl {
    UnboundDecl::named("T", p(1, 20))
}

fn box_of(arg: UnboundDecl) -> UnboundDecl {
    UnboundDecl::generic("Box", vec![arg], p(3, 10))
}

fn box_def() -> StructDef {
    let mut def = StructDef::generic("Box", p(1, 1), vec!["T".into()]);
    def.define("value", t()).unwrap();
    def
}

fn option_def() -> UnionDef {
    let mut def = UnionDef::generic("Option", p(2, 1), vec!["T".into()]);
    def.define("None", UnboundDecl::unit()).unwrap();
    def.define("Some", t()).unwrap();
    def
}

fn main_with(params: Vec<Param>, ret: UnboundDecl, body: Vec<UnboundExpr>) -> FunctionDef {
    FunctionDef {
        name: "main".into(),
        position: p(3, 1),
        params,
        ret,
        body: UnboundExpr::block(body, p(3, 1)),
    }
}

fn bind_unit(structs: Vec<StructDef>, unions: Vec<UnionDef>, main: FunctionDef) -> BindResult {
    magpie_bind::bind(&SourceUnit {
        structs,
        unions,
        functions: vec![main],
        ..SourceUnit::default()
    })
}

fn body(result: &BindResult) -> &[BoundExpr] {
    match &result.unit.functions[0].body.kind {
        BoundExprKind::Block(exprs) => exprs,
        other => panic!("expected block, got {:?}", other),
    }
}

fn assert_no_errors(result: &BindResult) {
    assert!(result.is_ok(), "unexpected errors: {:?}", result.errors);
}

// ── Structs ────────────────────────────────────────────────────────────

#[test]
fn same_arguments_share_one_instantiation() {
    let main = main_with(
        vec![
            Param::new("a", box_of(UnboundDecl::int())),
            Param::new("b", box_of(UnboundDecl::int())),
        ],
        UnboundDecl::unit(),
        vec![],
    );
    let result = bind_unit(vec![box_def()], vec![], main);
    assert_no_errors(&result);

    let main = &result.unit.functions[0];
    assert_eq!(main.params[0], main.params[1]);
    assert_eq!(result.unit.struct_instances("Box").count(), 1);

    let instance = &result.unit.structs[0];
    assert_eq!(instance.fields[0].index, 0);
    assert_eq!(instance.fields[0].ty, BoundDecl::int());
}

#[test]
fn different_arguments_instantiate_separately() {
    let main = main_with(
        vec![
            Param::new("a", box_of(UnboundDecl::int())),
            Param::new("b", box_of(UnboundDecl::string())),
        ],
        UnboundDecl::unit(),
        vec![],
    );
    let result = bind_unit(vec![box_def()], vec![], main);
    assert_no_errors(&result);

    let names: Vec<String> = result
        .unit
        .struct_instances("Box")
        .map(|s| s.type_ref().to_string())
        .collect();
    insta::assert_snapshot!(names.join(" "), @"Box[Int] Box[String]");
    assert_ne!(result.unit.functions[0].params[0], result.unit.functions[0].params[1]);
    // One getter per instantiation, told apart by receiver type.
    assert_eq!(result.unit.callables.overloads("value").count(), 2);
}

#[test]
fn generic_template_is_left_untouched() {
    let template = box_def();
    let unit = SourceUnit {
        structs: vec![template.clone()],
        functions: vec![main_with(
            vec![Param::new("a", box_of(UnboundDecl::bool()))],
            UnboundDecl::unit(),
            vec![],
        )],
        ..SourceUnit::default()
    };
    let result = magpie_bind::bind(&unit);
    assert_no_errors(&result);
    assert_eq!(unit.structs[0], template);
    assert_eq!(unit.structs[0].fields[0].ty, t());
}

#[test]
fn constructor_infers_type_arguments() {
    let main = main_with(
        Vec::new(),
        UnboundDecl::string(),
        vec![
            UnboundExpr::define(
                "b",
                false,
                UnboundExpr::call("Box", vec![UnboundExpr::string("hi", p(4, 18))], p(4, 14)),
                p(4, 5),
            ),
            UnboundExpr::call("value", vec![UnboundExpr::name("b", p(5, 11))], p(5, 5)),
        ],
    );
    let result = bind_unit(vec![box_def()], vec![], main);
    assert_no_errors(&result);

    let exprs = body(&result);
    let BoundExprKind::Store { value, .. } = &exprs[0].kind else {
        panic!("expected store");
    };
    let expected = TypeRef::new("Box", vec![BoundDecl::string()]);
    assert_eq!(value.ty, BoundDecl::Struct(expected.clone()));
    assert!(matches!(
        &value.kind,
        BoundExprKind::Call { target: CallTarget::StructConstructor(r), .. } if *r == expected
    ));
    assert_eq!(exprs[1].ty, BoundDecl::string());
}

#[test]
fn constructor_picks_the_matching_instantiation() {
    let main = main_with(
        Vec::new(),
        UnboundDecl::unit(),
        vec![
            UnboundExpr::call("Box", vec![UnboundExpr::int(1, p(4, 9))], p(4, 5)),
            UnboundExpr::call("Box", vec![UnboundExpr::bool(true, p(5, 9))], p(5, 5)),
        ],
    );
    let result = bind_unit(vec![box_def()], vec![], main);
    assert_no_errors(&result);
    let exprs = body(&result);
    insta::assert_snapshot!(exprs[0].ty.to_string(), @"Box[Int]");
    insta::assert_snapshot!(exprs[1].ty.to_string(), @"Box[Bool]");
}

#[test]
fn explicit_type_arguments_are_checked_against_fields() {
    let main = main_with(
        Vec::new(),
        UnboundDecl::unit(),
        vec![UnboundExpr::generic_call(
            "Box",
            vec![UnboundDecl::int()],
            vec![UnboundExpr::string("no", p(4, 14))],
            p(4, 5),
        )],
    );
    let result = bind_unit(vec![box_def()], vec![], main);
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(result.errors[0], BindError::Mismatch { .. }));
}

#[test]
fn wrong_number_of_type_arguments() {
    let main = main_with(
        vec![Param::new(
            "pair",
            UnboundDecl::generic("Box", vec![UnboundDecl::int(), UnboundDecl::int()], p(3, 15)),
        )],
        UnboundDecl::unit(),
        vec![],
    );
    let result = bind_unit(vec![box_def()], vec![], main);
    assert_eq!(
        result.errors,
        vec![BindError::GenericArityMismatch {
            name: "Box".into(),
            expected: 1,
            found: 2,
            position: p(3, 15),
        }]
    );
}

#[test]
fn recursive_struct_refers_to_itself() {
    let mut list = StructDef::generic("List", p(1, 1), vec!["T".into()]);
    list.define("head", t()).unwrap();
    list.define("tail", UnboundDecl::generic("List", vec![t()], p(1, 30)))
        .unwrap();
    let main = main_with(
        vec![Param::new(
            "xs",
            UnboundDecl::generic("List", vec![UnboundDecl::int()], p(3, 12)),
        )],
        UnboundDecl::unit(),
        vec![],
    );
    let result = bind_unit(vec![list], vec![], main);
    assert_no_errors(&result);

    let list = &result.unit.structs[0];
    assert_eq!(list.fields[1].ty, list.ty());
    assert_eq!(result.unit.structs.len(), 1);
}

#[test]
fn broken_field_is_reported_once_at_the_definition() {
    let mut bad = StructDef::generic("Bad", p(1, 1), vec!["T".into()]);
    bad.define("x", UnboundDecl::named("Missing", Position::none()))
        .unwrap();
    let bad_int = || UnboundDecl::generic("Bad", vec![UnboundDecl::int()], p(3, 10));
    let main = main_with(
        vec![Param::new("a", bad_int()), Param::new("b", bad_int())],
        UnboundDecl::unit(),
        vec![],
    );
    let result = bind_unit(vec![bad], vec![], main);
    assert_eq!(
        result.errors,
        vec![BindError::UnresolvedName {
            name: "Missing".into(),
            position: p(1, 1),
        }]
    );
    assert_eq!(result.unit.functions[0].params, vec![BoundDecl::Error, BoundDecl::Error]);
}

#[test]
fn non_generic_structs_are_instantiated_eagerly() {
    let mut point = StructDef::new("Point", p(1, 1));
    point.define("x", UnboundDecl::int()).unwrap();
    let result = bind_unit(vec![point], vec![], main_with(vec![], UnboundDecl::unit(), vec![]));
    assert_no_errors(&result);
    assert_eq!(result.unit.struct_instances("Point").count(), 1);
    assert!(result.unit.callables.contains("x<-"));
}

// ── Unions ─────────────────────────────────────────────────────────────

#[test]
fn case_constructor_infers_from_its_value() {
    let main = main_with(
        Vec::new(),
        UnboundDecl::generic("Option", vec![UnboundDecl::int()], p(3, 15)),
        vec![UnboundExpr::call("Some", vec![UnboundExpr::int(3, p(4, 10))], p(4, 5))],
    );
    let result = bind_unit(vec![], vec![option_def()], main);
    assert_no_errors(&result);
    let exprs = body(&result);
    assert!(matches!(
        exprs[0].kind,
        BoundExprKind::Call {
            target: CallTarget::UnionConstructor { tag: 1, .. },
            ..
        }
    ));
}

#[test]
fn empty_case_needs_explicit_type_arguments() {
    let main = main_with(
        Vec::new(),
        UnboundDecl::unit(),
        vec![UnboundExpr::name("None", p(4, 5))],
    );
    let result = bind_unit(vec![], vec![option_def()], main);
    assert_eq!(
        result.errors,
        vec![BindError::CannotInferTypeArgs {
            name: "None".into(),
            position: p(4, 5),
        }]
    );
}

#[test]
fn empty_case_with_explicit_type_arguments() {
    let none = UnboundExpr::new(
        magpie_bind::expr::UnboundExprKind::Name {
            name: "None".into(),
            type_args: vec![UnboundDecl::string()],
        },
        p(4, 5),
    );
    let main = main_with(
        Vec::new(),
        UnboundDecl::generic("Option", vec![UnboundDecl::string()], p(3, 15)),
        vec![none],
    );
    let result = bind_unit(vec![], vec![option_def()], main);
    assert_no_errors(&result);
    insta::assert_snapshot!(body(&result)[0].ty.to_string(), @"Option[String]");
}

/// `def Some(a: Int, b: Int) -> Int`, defined after `main`.
fn some_of_two_ints() -> FunctionDef {
    FunctionDef {
        name: "Some".into(),
        position: p(6, 1),
        params: vec![Param::new("a", UnboundDecl::int()), Param::new("b", UnboundDecl::int())],
        ret: UnboundDecl::int(),
        body: UnboundExpr::block(vec![UnboundExpr::name("a", p(7, 5))], p(6, 1)),
    }
}

#[test]
fn case_name_does_not_hide_a_function_of_the_same_name() {
    let main = main_with(
        Vec::new(),
        UnboundDecl::int(),
        vec![
            UnboundExpr::call("Some", vec![UnboundExpr::int(3, p(4, 10))], p(4, 5)),
            UnboundExpr::call(
                "Some",
                vec![UnboundExpr::int(1, p(5, 10)), UnboundExpr::int(2, p(5, 13))],
                p(5, 5),
            ),
        ],
    );
    let result = magpie_bind::bind(&SourceUnit {
        unions: vec![option_def()],
        functions: vec![main, some_of_two_ints()],
        ..SourceUnit::default()
    });
    assert_no_errors(&result);

    let exprs = body(&result);
    assert!(matches!(
        exprs[0].kind,
        BoundExprKind::Call {
            target: CallTarget::UnionConstructor { tag: 1, .. },
            ..
        }
    ));
    assert!(matches!(
        exprs[1].kind,
        BoundExprKind::Call {
            target: CallTarget::Function(FunctionId(1)),
            ..
        }
    ));
    assert_eq!(exprs[1].ty, BoundDecl::int());
}

#[test]
fn unmatched_call_still_reports_the_constructor_failure() {
    let main = main_with(
        Vec::new(),
        UnboundDecl::unit(),
        vec![UnboundExpr::call(
            "Some",
            vec![UnboundExpr::int(1, p(4, 10)), UnboundExpr::int(2, p(4, 13))],
            p(4, 5),
        )],
    );
    let result = bind_unit(vec![], vec![option_def()], main);
    assert_eq!(
        result.errors,
        vec![BindError::ArityMismatch {
            name: "Some".into(),
            expected: 1,
            found: 2,
            position: p(4, 5),
        }]
    );
}

#[test]
fn unions_sharing_a_case_name_are_both_considered() {
    // `Many[T] { Some: [T] }` is defined first but cannot take an `Int`.
    let mut many = UnionDef::generic("Many", p(1, 1), vec!["T".into()]);
    many.define("Some", UnboundDecl::array(t())).unwrap();
    let main = main_with(
        Vec::new(),
        UnboundDecl::unit(),
        vec![UnboundExpr::call("Some", vec![UnboundExpr::int(3, p(4, 10))], p(4, 5))],
    );
    let result = bind_unit(vec![], vec![many, option_def()], main);
    assert_no_errors(&result);
    insta::assert_snapshot!(body(&result)[0].ty.to_string(), @"Option[Int]");
}
