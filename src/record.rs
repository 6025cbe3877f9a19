use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codes::{self, Attendance, Gender, MaritalStatus, PreviousQualification, YesNo};

pub const FEATURE_COUNT: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Demographics,
    AcademicHistory,
    PersonalSituation,
    FirstSemester,
    SecondSemester,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Demographics,
        Section::AcademicHistory,
        Section::PersonalSituation,
        Section::FirstSemester,
        Section::SecondSemester,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Section::Demographics => "Demographics",
            Section::AcademicHistory => "Academic History",
            Section::PersonalSituation => "Personal Situation",
            Section::FirstSemester => "1st Semester Performance",
            Section::SecondSemester => "2nd Semester Performance",
        }
    }

    pub fn fields(self) -> impl Iterator<Item = &'static FieldSpec> {
        FIELDS.iter().filter(move |field| field.section == self)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Integer,
    Float,
    Code(&'static [(i64, &'static str)]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub section: Section,
    pub kind: FieldKind,
}

const fn field(
    name: &'static str,
    label: &'static str,
    section: Section,
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec {
        name,
        label,
        section,
        kind,
    }
}

/// Record fields in the column order the model was trained on.
pub static FIELDS: [FieldSpec; FEATURE_COUNT] = [
    field("marital_status", "Marital Status", Section::Demographics, FieldKind::Code(MaritalStatus::CODES)),
    field("daytime_evening_attendance", "Attendance", Section::Demographics, FieldKind::Code(Attendance::CODES)),
    field("previous_qualification", "Prev. Qualification", Section::AcademicHistory, FieldKind::Code(PreviousQualification::CODES)),
    field("previous_qualification_grade", "Prev. Qual. Grade (0-200)", Section::AcademicHistory, FieldKind::Float),
    field("admission_grade", "Admission Grade (0-200)", Section::AcademicHistory, FieldKind::Float),
    field("is_displaced", "Is Displaced?", Section::PersonalSituation, FieldKind::Code(YesNo::CODES)),
    field("educational_special_needs", "Special Needs?", Section::PersonalSituation, FieldKind::Code(YesNo::CODES)),
    field("is_debtor", "Has Unpaid Debt?", Section::PersonalSituation, FieldKind::Code(YesNo::CODES)),
    field("tuition_fees_up_to_date", "Tuition Fees Up to Date?", Section::PersonalSituation, FieldKind::Code(YesNo::CODES)),
    field("gender", "Gender", Section::PersonalSituation, FieldKind::Code(Gender::CODES)),
    field("is_scholarship_holder", "Scholarship Holder?", Section::PersonalSituation, FieldKind::Code(YesNo::CODES)),
    field("age_at_enrollment", "Enrollment Age", Section::PersonalSituation, FieldKind::Integer),
    field("curricular_units_1st_sem_approved", "Approved Units (Sem 1)", Section::FirstSemester, FieldKind::Integer),
    field("curricular_units_1st_sem_grade", "Average Grade (Sem 1)", Section::FirstSemester, FieldKind::Float),
    field("curricular_units_2nd_sem_approved", "Approved Units (Sem 2)", Section::SecondSemester, FieldKind::Integer),
    field("curricular_units_2nd_sem_grade", "Average Grade (Sem 2)", Section::SecondSemester, FieldKind::Float),
    field("curricular_units_2nd_sem_without_evaluations", "Units Without Eval (Sem 2)", Section::SecondSemester, FieldKind::Integer),
];

pub fn feature_names() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|field| field.name)
}

/// One student's attributes, as submitted for a single prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub marital_status: MaritalStatus,
    pub daytime_evening_attendance: Attendance,
    pub previous_qualification: PreviousQualification,
    pub previous_qualification_grade: f64,
    pub admission_grade: f64,
    pub is_displaced: YesNo,
    pub educational_special_needs: YesNo,
    pub is_debtor: YesNo,
    pub tuition_fees_up_to_date: YesNo,
    pub gender: Gender,
    pub is_scholarship_holder: YesNo,
    pub age_at_enrollment: i64,
    pub curricular_units_1st_sem_approved: i64,
    pub curricular_units_1st_sem_grade: f64,
    pub curricular_units_2nd_sem_approved: i64,
    pub curricular_units_2nd_sem_grade: f64,
    pub curricular_units_2nd_sem_without_evaluations: i64,
}

impl Default for StudentRecord {
    fn default() -> Self {
        Self {
            marital_status: MaritalStatus::Single,
            daytime_evening_attendance: Attendance::Daytime,
            previous_qualification: PreviousQualification::SecondaryEducation,
            previous_qualification_grade: 120.0,
            admission_grade: 120.0,
            is_displaced: YesNo::No,
            educational_special_needs: YesNo::No,
            is_debtor: YesNo::No,
            tuition_fees_up_to_date: YesNo::Yes,
            gender: Gender::Male,
            is_scholarship_holder: YesNo::No,
            age_at_enrollment: 20,
            curricular_units_1st_sem_approved: 5,
            curricular_units_1st_sem_grade: 12.0,
            curricular_units_2nd_sem_approved: 5,
            curricular_units_2nd_sem_grade: 12.0,
            curricular_units_2nd_sem_without_evaluations: 0,
        }
    }
}

impl StudentRecord {
    /// Validates and coerces an untyped payload, reporting every bad field.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::single(
                "body",
                format!("expected a JSON object, got {}", kind_of(value)),
            ));
        };

        let mut normalized = Map::with_capacity(FEATURE_COUNT);
        let mut issues = Vec::new();

        for field in FIELDS.iter() {
            match field.coerce(object.get(field.name)) {
                Ok(value) => {
                    normalized.insert(field.name.to_string(), value);
                }
                Err(message) => issues.push(FieldIssue {
                    field: field.name.to_string(),
                    message,
                }),
            }
        }

        if !issues.is_empty() {
            return Err(ValidationError { issues });
        }

        serde_json::from_value(Value::Object(normalized))
            .map_err(|err| ValidationError::single("body", err.to_string()))
    }

    /// Frames the record as one feature row, in training column order.
    pub fn to_features(&self) -> [f32; FEATURE_COUNT] {
        [
            self.marital_status.code() as f32,
            self.daytime_evening_attendance.code() as f32,
            self.previous_qualification.code() as f32,
            self.previous_qualification_grade as f32,
            self.admission_grade as f32,
            self.is_displaced.code() as f32,
            self.educational_special_needs.code() as f32,
            self.is_debtor.code() as f32,
            self.tuition_fees_up_to_date.code() as f32,
            self.gender.code() as f32,
            self.is_scholarship_holder.code() as f32,
            self.age_at_enrollment as f32,
            self.curricular_units_1st_sem_approved as f32,
            self.curricular_units_1st_sem_grade as f32,
            self.curricular_units_2nd_sem_approved as f32,
            self.curricular_units_2nd_sem_grade as f32,
            self.curricular_units_2nd_sem_without_evaluations as f32,
        ]
    }
}

impl FieldSpec {
    fn coerce(&self, raw: Option<&Value>) -> Result<Value, String> {
        let raw = match raw {
            None | Some(Value::Null) => return Err("field required".to_string()),
            Some(raw) => raw,
        };

        match self.kind {
            FieldKind::Integer => coerce_int(raw).map(Value::from),
            FieldKind::Float => coerce_float(raw).map(Value::from),
            FieldKind::Code(codes) => {
                let code = coerce_int(raw)?;
                if codes.iter().any(|(candidate, _)| *candidate == code) {
                    Ok(Value::from(code))
                } else {
                    Err(codes::unknown_code(code, codes))
                }
            }
        }
    }
}

fn coerce_int(raw: &Value) -> Result<i64, String> {
    match raw {
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                return Ok(value);
            }
            number
                .as_f64()
                .and_then(integral)
                .ok_or_else(|| format!("expected an integer, got {number}"))
        }
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
                .ok_or_else(|| format!("expected an integer, got {text:?}"))
        }
        other => Err(format!("expected an integer, got {}", kind_of(other))),
    }
}

fn coerce_float(raw: &Value) -> Result<f64, String> {
    match raw {
        Value::Number(number) => number
            .as_f64()
            .filter(|value| value.is_finite())
            .ok_or_else(|| format!("expected a number, got {number}")),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| format!("expected a number, got {text:?}")),
        other => Err(format!("expected a number, got {}", kind_of(other))),
    }
}

fn integral(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|issue| issue.field.as_str())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid student record:")?;
        for (index, issue) in self.issues.iter().enumerate() {
            let separator = if index == 0 { " " } else { "; " };
            write!(f, "{separator}{}: {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn neutral_payload() -> Value {
        json!({
            "marital_status": 1,
            "daytime_evening_attendance": 1,
            "previous_qualification": 1,
            "previous_qualification_grade": 120.0,
            "admission_grade": 120.0,
            "is_displaced": 0,
            "educational_special_needs": 0,
            "is_debtor": 0,
            "tuition_fees_up_to_date": 1,
            "gender": 1,
            "is_scholarship_holder": 0,
            "age_at_enrollment": 20,
            "curricular_units_1st_sem_approved": 5,
            "curricular_units_1st_sem_grade": 12.0,
            "curricular_units_2nd_sem_approved": 5,
            "curricular_units_2nd_sem_grade": 12.0,
            "curricular_units_2nd_sem_without_evaluations": 0
        })
    }

    #[test]
    fn accepts_neutral_payload() {
        let record = StudentRecord::from_value(&neutral_payload()).unwrap();
        assert_eq!(record, StudentRecord::default());
    }

    #[test]
    fn every_missing_field_is_reported_by_name() {
        for field in FIELDS.iter() {
            let mut payload = neutral_payload();
            payload.as_object_mut().unwrap().remove(field.name);

            let err = StudentRecord::from_value(&payload).unwrap_err();
            assert_eq!(err.fields().collect::<Vec<_>>(), vec![field.name]);
            assert_eq!(err.issues[0].message, "field required");
        }
    }

    #[test]
    fn null_is_treated_as_missing() {
        let mut payload = neutral_payload();
        payload["admission_grade"] = Value::Null;
        let err = StudentRecord::from_value(&payload).unwrap_err();
        assert_eq!(err.issues[0].message, "field required");
    }

    #[test]
    fn reports_all_malformed_fields_together() {
        let mut payload = neutral_payload();
        payload["age_at_enrollment"] = json!(20.5);
        payload["admission_grade"] = json!("high");
        payload["gender"] = json!(true);
        payload.as_object_mut().unwrap().remove("is_debtor");

        let err = StudentRecord::from_value(&payload).unwrap_err();
        assert_eq!(
            err.fields().collect::<Vec<_>>(),
            vec!["admission_grade", "is_debtor", "gender", "age_at_enrollment"]
        );
        assert!(err.to_string().starts_with("invalid student record: admission_grade"));
    }

    #[test]
    fn coerces_lax_numeric_inputs() {
        let mut payload = neutral_payload();
        payload["age_at_enrollment"] = json!("23");
        payload["curricular_units_1st_sem_approved"] = json!(6.0);
        payload["curricular_units_2nd_sem_grade"] = json!(14);
        payload["admission_grade"] = json!(" 133.5 ");

        let record = StudentRecord::from_value(&payload).unwrap();
        assert_eq!(record.age_at_enrollment, 23);
        assert_eq!(record.curricular_units_1st_sem_approved, 6);
        assert_eq!(record.curricular_units_2nd_sem_grade, 14.0);
        assert_eq!(record.admission_grade, 133.5);
    }

    #[test]
    fn rejects_codes_outside_their_table() {
        let mut payload = neutral_payload();
        payload["marital_status"] = json!(9);
        payload["is_displaced"] = json!(2);
        payload["previous_qualification"] = json!(7);

        let err = StudentRecord::from_value(&payload).unwrap_err();
        assert_eq!(
            err.fields().collect::<Vec<_>>(),
            vec!["marital_status", "previous_qualification", "is_displaced"]
        );
        assert_eq!(
            err.issues[0].message,
            "unknown code 9, expected one of 1, 2, 3, 4, 5, 6"
        );
    }

    #[test]
    fn rejects_non_finite_strings() {
        let mut payload = neutral_payload();
        payload["curricular_units_1st_sem_grade"] = json!("NaN");
        let err = StudentRecord::from_value(&payload).unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["curricular_units_1st_sem_grade"]);
    }

    #[test]
    fn ignores_unknown_keys() {
        let mut payload = neutral_payload();
        payload["student_name"] = json!("Avery Lee");
        assert!(StudentRecord::from_value(&payload).is_ok());
    }

    #[test]
    fn rejects_non_object_body() {
        let err = StudentRecord::from_value(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.issues[0].field, "body");
        assert_eq!(err.issues[0].message, "expected a JSON object, got array");
    }

    #[test]
    fn features_follow_field_order() {
        let record = StudentRecord {
            previous_qualification: PreviousQualification::TechnologicalSpecialization,
            age_at_enrollment: 31,
            curricular_units_2nd_sem_without_evaluations: 2,
            ..StudentRecord::default()
        };
        let serialized = serde_json::to_value(record).unwrap();
        let features = record.to_features();

        for (index, field) in FIELDS.iter().enumerate() {
            let expected = serialized[field.name].as_f64().unwrap() as f32;
            assert_eq!(features[index], expected, "feature {} out of order", field.name);
        }
    }

    #[test]
    fn sections_cover_every_field_once() {
        let total: usize = Section::ALL.iter().map(|section| section.fields().count()).sum();
        assert_eq!(total, FEATURE_COUNT);
        assert_eq!(feature_names().count(), FEATURE_COUNT);
    }
}
