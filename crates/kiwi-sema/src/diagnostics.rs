//! Ariadne rendering for semantic errors.
//!
//! Each error gets a stable code, a labeled source span, and help text
//! when a plausible fix exists. Output is colorless so snapshots stay
//! stable across terminals.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::errors::SemaError;

/// Render one semantic error against its source text.
pub fn render_diagnostic(error: &SemaError, source: &str) -> String {
    let config = Config::default().with_color(false);
    let source_len = source.len();

    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s == e {
            s..(s + 1).min(source_len.max(1))
        } else {
            s..e
        }
    };

    let span = error.span();
    let range = clamp(span.start as usize..span.end as usize);
    let code = error.code();
    let message = error.to_string();

    let mut builder = Report::build(ReportKind::Error, range.clone())
        .with_code(code)
        .with_message(&message)
        .with_config(config);

    match error {
        SemaError::NameError { .. } => {
            builder.add_label(
                Label::new(range)
                    .with_message("not found in this scope")
                    .with_color(Color::Red),
            );
        }
        SemaError::TypeError { lhs_t, rhs_t, .. } => {
            let label = match (lhs_t, rhs_t) {
                (Some(lhs), Some(rhs)) => format!("expected {lhs}, found {rhs}"),
                _ => "type mismatch here".to_string(),
            };
            builder.add_label(Label::new(range).with_message(label).with_color(Color::Red));
        }
        SemaError::AttributeError { class, attr, .. } => {
            builder.add_label(
                Label::new(range)
                    .with_message(format!("'{class}' has no member '{attr}'"))
                    .with_color(Color::Red),
            );
        }
        SemaError::UnsupportedOperand { op, lhs_t, rhs_t, .. } => {
            let label = match rhs_t {
                Some(rhs_t) => format!("no handler for {op} on '{lhs_t}' and '{rhs_t}'"),
                None => format!("no handler for unary {op} on '{lhs_t}'"),
            };
            builder.add_label(Label::new(range).with_message(label).with_color(Color::Red));
            builder.set_help("define the matching __dunder__ method on the class");
        }
        SemaError::ModuleNotFoundError { .. } | SemaError::ImportError { .. } => {
            builder.add_label(
                Label::new(range)
                    .with_message("import could not be resolved")
                    .with_color(Color::Red),
            );
        }
        SemaError::RecursiveDefinition { name, .. } => {
            builder.add_label(
                Label::new(range)
                    .with_message(format!("'{name}' refers to itself here"))
                    .with_color(Color::Red),
            );
        }
    }

    let mut buf = Vec::new();
    builder
        .finish()
        .write(Source::from(source), &mut buf)
        .expect("diagnostic rendering never fails on in-memory buffers");
    String::from_utf8(buf).expect("ariadne output is UTF-8")
}
