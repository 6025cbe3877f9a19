use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::record::{FieldIssue, FieldKind, FieldSpec, StudentRecord, ValidationError, FIELDS};

/// Input widget used for a record field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Widget {
    Select(&'static [(i64, &'static str)]),
    Integer { min: i64, max: i64 },
    Float { min: f64, max: f64 },
}

impl Widget {
    pub fn for_field(field: &FieldSpec) -> Self {
        match field.kind {
            FieldKind::Code(codes) => Widget::Select(codes),
            FieldKind::Integer => match field.name {
                "age_at_enrollment" => Widget::Integer { min: 15, max: 100 },
                "curricular_units_2nd_sem_without_evaluations" => Widget::Integer { min: 0, max: 10 },
                _ => Widget::Integer { min: 0, max: 30 },
            },
            FieldKind::Float if field.name.starts_with("curricular_units") => {
                Widget::Float { min: 0.0, max: 20.0 }
            }
            FieldKind::Float => Widget::Float {
                min: 0.0,
                max: 200.0,
            },
        }
    }

    fn bounds(self) -> Option<(f64, f64)> {
        match self {
            Widget::Select(_) => None,
            Widget::Integer { min, max } => Some((min as f64, max as f64)),
            Widget::Float { min, max } => Some((min, max)),
        }
    }
}

/// Field values exactly as they appear in the form inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValues(HashMap<String, String>);

impl From<HashMap<String, String>> for FormValues {
    fn from(values: HashMap<String, String>) -> Self {
        Self(values)
    }
}

impl FormValues {
    pub fn from_record(record: &StudentRecord) -> Self {
        let Ok(Value::Object(values)) = serde_json::to_value(record) else {
            return Self::default();
        };
        Self(
            values
                .into_iter()
                .map(|(name, value)| (name, value.to_string()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or("")
    }

    /// Builds the record the service will receive, enforcing widget bounds on top
    /// of the record's own validation.
    pub fn parse(&self) -> Result<StudentRecord, ValidationError> {
        let payload: Map<String, Value> = FIELDS
            .iter()
            .filter_map(|field| {
                self.0
                    .get(field.name)
                    .map(|value| (field.name.to_string(), Value::String(value.clone())))
            })
            .collect();

        let record = StudentRecord::from_value(&Value::Object(payload))?;
        let issues = out_of_bounds(&record);
        if issues.is_empty() {
            Ok(record)
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn out_of_bounds(record: &StudentRecord) -> Vec<FieldIssue> {
    let Ok(Value::Object(values)) = serde_json::to_value(record) else {
        return Vec::new();
    };

    FIELDS
        .iter()
        .filter_map(|field| {
            let value = values.get(field.name)?.as_f64()?;
            let (min, max) = Widget::for_field(field).bounds()?;
            (value < min || value > max).then(|| FieldIssue {
                field: field.name.to_string(),
                message: format!("must be between {min} and {max}"),
            })
        })
        .collect()
}
