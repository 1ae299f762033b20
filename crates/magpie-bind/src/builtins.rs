//! Built-in callable registration.
//!
//! Registers the operators and primitive functions the backend implements
//! directly. Operators are ordinary overloaded names, so `+` on `Int` and
//! `+` on `String` resolve to different intrinsics.

use crate::callable::{Callable, CallableKind, CallableTable};
use crate::decl::BoundDecl;
use crate::expr::IntrinsicOp;

fn intrinsic(table: &mut CallableTable, name: &str, op: IntrinsicOp, params: Vec<BoundDecl>, ret: BoundDecl) {
    table.add(Callable::new(name, CallableKind::Intrinsic(op), params, ret));
}

/// Register every intrinsic into `table`.
///
/// After this call the table contains:
/// - Int arithmetic: `+`, `-`, `*`, `/` and unary `-`
/// - Int comparison: `<`, `>`, `<=`, `>=`
/// - Equality `=` and `!=` for Int, Bool and String
/// - `not` on Bool, `+` on String
/// - `toString` for Int and Bool, `print` for String
pub fn register_intrinsics(table: &mut CallableTable) {
    let int = BoundDecl::int;
    let boolean = BoundDecl::bool;
    let string = BoundDecl::string;

    // ── Arithmetic ──────────────────────────────────────────────────

    for (name, op) in [
        ("+", IntrinsicOp::Add),
        ("-", IntrinsicOp::Sub),
        ("*", IntrinsicOp::Mul),
        ("/", IntrinsicOp::Div),
    ] {
        intrinsic(table, name, op, vec![int(), int()], int());
    }
    intrinsic(table, "-", IntrinsicOp::Negate, vec![int()], int());

    // ── Comparison ──────────────────────────────────────────────────

    for (name, op) in [
        ("<", IntrinsicOp::Less),
        (">", IntrinsicOp::Greater),
        ("<=", IntrinsicOp::LessEqual),
        (">=", IntrinsicOp::GreaterEqual),
    ] {
        intrinsic(table, name, op, vec![int(), int()], boolean());
    }

    for operand in [int(), boolean(), string()] {
        intrinsic(table, "=", IntrinsicOp::Equal, vec![operand.clone(), operand.clone()], boolean());
        intrinsic(table, "!=", IntrinsicOp::NotEqual, vec![operand.clone(), operand], boolean());
    }

    // ── Bool and String ─────────────────────────────────────────────

    intrinsic(table, "not", IntrinsicOp::Not, vec![boolean()], boolean());
    intrinsic(table, "+", IntrinsicOp::Concat, vec![string(), string()], string());
    intrinsic(table, "toString", IntrinsicOp::ToString, vec![int()], string());
    intrinsic(table, "toString", IntrinsicOp::ToString, vec![boolean()], string());

    // ── I/O ─────────────────────────────────────────────────────────

    intrinsic(table, "print", IntrinsicOp::Print, vec![string()], BoundDecl::unit());
}
