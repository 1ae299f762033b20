//! Rendering tests for bind diagnostics.
//!
//! Errors are produced by binding small hand-built units whose positions
//! point into a matching source string, then rendered through ariadne.

use magpie_bind::decl::{BoundDecl, UnboundDecl};
use magpie_bind::diagnostics::{render_diagnostic, DiagnosticOptions};
use magpie_bind::error::{BindError, ConstraintOrigin};
use magpie_bind::expr::UnboundExpr;
use magpie_bind::unit::{FunctionDef, SourceUnit};
use magpie_bind::BindResult;
use magpie_common::Position;

// ── Helpers ────────────────────────────────────────────────────────────

fn opts() -> DiagnosticOptions {
    DiagnosticOptions::colorless()
}

fn p(line: u32, column: u32) -> Position {
    Position::at(line, column)
}

fn bind_main(body: Vec<UnboundExpr>) -> BindResult {
    magpie_bind::bind(&SourceUnit {
        functions: vec![FunctionDef {
            name: "main".into(),
            position: p(1, 1),
            params: Vec::new(),
            ret: UnboundDecl::unit(),
            body: UnboundExpr::block(body, p(1, 1)),
        }],
        ..SourceUnit::default()
    })
}

/// `def x <- 1` followed by `x <- 2`.
const IMMUTABLE_SRC: &str = "def main()\n    def x <- 1\n    x <- 2\nend\n";

fn immutable_assignment() -> BindResult {
    bind_main(vec![
        UnboundExpr::define("x", false, UnboundExpr::int(1, p(2, 14)), p(2, 5)),
        UnboundExpr::assign("x", UnboundExpr::int(2, p(3, 10)), p(3, 5)),
    ])
}

// ── Text output ────────────────────────────────────────────────────────

#[test]
fn text_output_has_code_message_and_help() {
    let result = immutable_assignment();
    let rendered = result.render_errors(IMMUTABLE_SRC, "test.mag", &opts());
    assert_eq!(rendered.len(), 1);
    let output = &rendered[0];
    assert!(output.contains("E0006"), "missing code: {}", output);
    assert!(output.contains("cannot assign to immutable local `x`"), "{}", output);
    assert!(output.contains("var x <- ..."), "missing help: {}", output);
    assert!(output.contains("x <- 2"), "missing source line: {}", output);
}

#[test]
fn colorless_output_has_no_escapes() {
    let result = immutable_assignment();
    let output = render_diagnostic(&result.errors[0], IMMUTABLE_SRC, "test.mag", &opts());
    assert!(!output.contains('\u{1b}'), "unexpected ANSI escape: {:?}", output);
}

#[test]
fn if_branch_mismatch_labels_both_arms() {
    let src = "if true then 1 else \"one\"";
    let err = BindError::Mismatch {
        expected: BoundDecl::int(),
        found: BoundDecl::string(),
        origin: ConstraintOrigin::IfBranches {
            then_position: p(1, 14),
            else_position: p(1, 21),
        },
        position: p(1, 21),
    };
    let output = render_diagnostic(&err, src, "test.mag", &opts());
    assert!(output.contains("E0001"), "{}", output);
    assert!(output.contains("this is `Int`"), "{}", output);
    assert!(output.contains("this is `String`"), "{}", output);
}

#[test]
fn synthesized_positions_still_render() {
    let err = BindError::UnresolvedName {
        name: "Ghost".into(),
        position: Position::none(),
    };
    let output = render_diagnostic(&err, "def main()\nend\n", "test.mag", &opts());
    assert!(output.contains("unresolved name `Ghost`"), "{}", output);
}

// ── JSON output ────────────────────────────────────────────────────────

#[test]
fn json_output_mode() {
    let result = immutable_assignment();
    let output = render_diagnostic(
        &result.errors[0],
        IMMUTABLE_SRC,
        "test.mag",
        &DiagnosticOptions::json_mode(),
    );
    let parsed: serde_json::Value = serde_json::from_str(&output)
        .unwrap_or_else(|e| panic!("invalid JSON output: {}\n{}", e, output));
    assert_eq!(parsed["code"], "E0006");
    assert_eq!(parsed["severity"], "error");
    assert_eq!(parsed["file"], "test.mag");
    assert_eq!(parsed["position"]["line"], 3);
    assert_eq!(parsed["position"]["column"], 5);
    let spans = parsed["spans"].as_array().unwrap();
    assert_eq!(spans.len(), 1);
    // Line 3, column 5 is the `x` of `x <- 2`.
    assert_eq!(spans[0]["start"], 30);
    assert_eq!(spans[0]["end"], 31);
}

#[test]
fn json_is_one_line() {
    let result = bind_main(vec![UnboundExpr::name("missing", p(2, 5))]);
    let output = render_diagnostic(
        &result.errors[0],
        "def main()\n    missing\nend\n",
        "test.mag",
        &DiagnosticOptions::json_mode(),
    );
    assert!(!output.contains('\n'), "JSON output should be one line: {}", output);
}
