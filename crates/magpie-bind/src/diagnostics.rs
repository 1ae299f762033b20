//! Ariadne-based rendering of bind errors.
//!
//! Each [`BindError`] becomes a report with a stable error code, a terse
//! message, a label on the offending node and, where a likely fix exists,
//! a help line. [`DiagnosticOptions::json_mode`] emits the same content as
//! a single line of JSON for tools.

use std::ops::Range;

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use magpie_common::Position;
use serde::Serialize;

use crate::error::{BindError, ConstraintOrigin};

/// How diagnostics are rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions {
            color: true,
            json: false,
        }
    }
}

impl DiagnosticOptions {
    /// Plain text with no ANSI escapes, for snapshots and pipes.
    pub fn colorless() -> Self {
        DiagnosticOptions {
            color: false,
            json: false,
        }
    }

    pub fn json_mode() -> Self {
        DiagnosticOptions {
            color: false,
            json: true,
        }
    }
}

// ── Error Codes ────────────────────────────────────────────────────────

pub fn error_code(err: &BindError) -> &'static str {
    match err {
        BindError::Mismatch { .. } => "E0001",
        BindError::UnresolvedName { .. } => "E0002",
        BindError::GenericArityMismatch { .. } => "E0003",
        BindError::ArityMismatch { .. } => "E0004",
        BindError::NoMatchingOverload { .. } => "E0005",
        BindError::MutabilityViolation { .. } => "E0006",
        BindError::DuplicateLocal { .. } => "E0007",
        BindError::DuplicateDefinition { .. } => "E0008",
        BindError::TooManyFields { .. } => "E0009",
        BindError::CannotInferTypeArgs { .. } => "E0010",
        BindError::NotCallable { .. } => "E0011",
        BindError::InstantiationTooDeep { .. } => "E0012",
    }
}

fn help(err: &BindError) -> Option<String> {
    match err {
        BindError::Mismatch {
            origin: ConstraintOrigin::Condition,
            ..
        } => Some("expected a boolean expression".to_string()),
        BindError::MutabilityViolation { name, .. } => {
            Some(format!("declare it with `var {} <- ...` to allow assignment", name))
        }
        BindError::DuplicateLocal { .. } => Some("choose a different name".to_string()),
        BindError::CannotInferTypeArgs { name, .. } => {
            Some(format!("spell out the type arguments: `{}[...]`", name))
        }
        BindError::TooManyFields { .. } => {
            Some("split the definition into smaller types".to_string())
        }
        _ => None,
    }
}

// ── Span Helpers ───────────────────────────────────────────────────────

/// Byte range of `position` in `source`.
///
/// Uses the recorded range when it is non-empty and falls back to the
/// line and column otherwise.
fn span(position: Position, source: &str) -> Range<usize> {
    if !position.range.is_empty() {
        let start: usize = position.range.start().into();
        let end: usize = position.range.end().into();
        return start..end;
    }
    if position.is_none() {
        return 0..0;
    }
    let line_start: usize = source
        .split_inclusive('\n')
        .take(position.line.saturating_sub(1) as usize)
        .map(str::len)
        .sum();
    let line = source[line_start.min(source.len())..]
        .split('\n')
        .next()
        .unwrap_or("");
    let column: usize = line
        .char_indices()
        .nth(position.column.saturating_sub(1) as usize)
        .map_or(line.len(), |(offset, _)| offset);
    let start = line_start + column;
    start..start + 1
}

/// Clamp a range into `source`, keeping it at least one byte wide.
fn clamp(range: Range<usize>, source_len: usize) -> Range<usize> {
    let start = range.start.min(source_len);
    let end = range.end.min(source_len).max(start);
    if start == end {
        start..end.saturating_add(1).min(source_len)
    } else {
        start..end
    }
}

struct LabelInfo {
    range: Range<usize>,
    message: String,
    color: Color,
}

fn labels(err: &BindError, source: &str) -> Vec<LabelInfo> {
    let at = |position: Position| clamp(span(position, source), source.len());
    match err {
        BindError::Mismatch {
            expected,
            found,
            origin:
                ConstraintOrigin::IfBranches {
                    then_position,
                    else_position,
                },
            ..
        } => vec![
            LabelInfo {
                range: at(*then_position),
                message: format!("this is `{}`", expected),
                color: Color::Red,
            },
            LabelInfo {
                range: at(*else_position),
                message: format!("this is `{}`", found),
                color: Color::Blue,
            },
        ],
        BindError::Mismatch {
            expected,
            found,
            origin,
            position,
        } => {
            let message = match origin {
                ConstraintOrigin::CallArg { index } => {
                    format!("argument {} expected `{}`, found `{}`", index + 1, expected, found)
                }
                _ => format!("expected `{}`, found `{}`", expected, found),
            };
            vec![LabelInfo {
                range: at(*position),
                message,
                color: Color::Red,
            }]
        }
        other => vec![LabelInfo {
            range: at(other.position()),
            message: other.to_string(),
            color: Color::Red,
        }],
    }
}

// ── JSON ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonSpan {
    start: usize,
    end: usize,
    label: String,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    code: &'static str,
    severity: &'static str,
    message: String,
    file: &'a str,
    position: Position,
    spans: Vec<JsonSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<String>,
}

// ── Main Rendering Function ────────────────────────────────────────────

/// Render one bind error against the source it came from.
pub fn render_diagnostic(err: &BindError, source: &str, filename: &str, options: &DiagnosticOptions) -> String {
    let code = error_code(err);
    let message = err.to_string();
    let labels = labels(err, source);

    if options.json {
        let diagnostic = JsonDiagnostic {
            code,
            severity: "error",
            message,
            file: filename,
            position: err.position(),
            spans: labels
                .into_iter()
                .map(|l| JsonSpan {
                    start: l.range.start,
                    end: l.range.end,
                    label: l.message,
                })
                .collect(),
            help: help(err),
        };
        return serde_json::to_string(&diagnostic).expect("diagnostic JSON serialization cannot fail");
    }

    let config = Config::default()
        .with_color(options.color)
        .with_index_type(IndexType::Byte);
    let primary = labels.first().map_or(0..0, |l| l.range.clone());

    let mut builder = Report::build(ReportKind::Error, primary)
        .with_code(code)
        .with_message(&message)
        .with_config(config);
    for label in labels {
        builder.add_label(
            Label::new(label.range)
                .with_message(label.message)
                .with_color(label.color),
        );
    }
    if let Some(help) = help(err) {
        builder = builder.with_help(help);
    }

    let mut buf = Vec::new();
    builder
        .finish()
        .write(Source::from(source), &mut buf)
        .expect("failed to write diagnostic");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_falls_back_to_line_and_column() {
        let source = "def x <- 1\nx <- 2\n";
        assert_eq!(span(Position::at(2, 1), source), 11..12);
        assert_eq!(span(Position::at(1, 5), source), 4..5);
    }

    #[test]
    fn span_prefers_recorded_range() {
        let position = Position::new(1, 1, rowan::TextRange::new(3.into(), 7.into()));
        assert_eq!(span(position, "whatever source"), 3..7);
    }

    #[test]
    fn clamp_keeps_ranges_in_bounds() {
        assert_eq!(clamp(40..50, 10), 10..10);
        assert_eq!(clamp(2..2, 10), 2..3);
        assert_eq!(clamp(0..0, 0), 0..0);
    }

    #[test]
    fn every_variant_has_a_code() {
        let err = BindError::InstantiationTooDeep {
            name: "Nest".into(),
            position: Position::none(),
        };
        assert_eq!(error_code(&err), "E0012");
    }
}
