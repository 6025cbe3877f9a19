use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::codes;
use crate::prediction::PredictionResult;
use crate::record::{FieldKind, FieldSpec, Section, StudentRecord};

/// Markdown summary of one offline prediction.
pub fn build_report(
    record: &StudentRecord,
    result: &PredictionResult,
    model_source: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let values = serde_json::to_value(record).unwrap_or(Value::Null);
    let mut output = String::new();

    let _ = writeln!(output, "# Student Outcome Report");
    let _ = writeln!(
        output,
        "Generated {} using {}",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        model_source
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Prediction");
    let _ = writeln!(output, "- Outcome: {}", result.prediction);
    let _ = writeln!(
        output,
        "- Confidence: {:.1}%",
        result.probability * 100.0
    );

    for section in Section::ALL {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", section.title());
        for field in section.fields() {
            let _ = writeln!(
                output,
                "- {}: {}",
                field.label,
                describe_value(field, &values[field.name])
            );
        }
    }

    output
}

fn describe_value(field: &FieldSpec, value: &Value) -> String {
    match (field.kind, value.as_i64()) {
        (FieldKind::Code(table), Some(code)) => match codes::label_for(table, code) {
            Some(label) => format!("{label} ({code})"),
            None => code.to_string(),
        },
        _ => value.to_string(),
    }
}
