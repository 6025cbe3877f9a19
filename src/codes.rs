//! Code tables for the categorical fields of a student record.
//!
//! The model was trained on the bare integer codes of the institutional
//! dataset, so every enum serializes to and from its code.

use serde::{Deserialize, Serialize};

macro_rules! code_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident = $code:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const CODES: &'static [(i64, &'static str)] = &[$(($code, $label),)+];

            pub fn code(self) -> i64 {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn from_code(code: i64) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> i64 {
                value.code()
            }
        }

        impl TryFrom<i64> for $name {
            type Error = String;

            fn try_from(code: i64) -> Result<Self, Self::Error> {
                Self::from_code(code).ok_or_else(|| unknown_code(code, Self::CODES))
            }
        }
    };
}

code_table! {
    MaritalStatus {
        Single = 1 => "Single",
        Married = 2 => "Married",
        Widower = 3 => "Widower",
        Divorced = 4 => "Divorced",
        FactoUnion = 5 => "Facto union",
        LegallySeparated = 6 => "Legally separated",
    }
}

code_table! {
    /// Whether classes are attended during the day or at night.
    Attendance {
        Daytime = 1 => "Daytime",
        Evening = 0 => "Evening",
    }
}

code_table! {
    /// Education level completed before enrollment.
    PreviousQualification {
        SecondaryEducation = 1 => "Secondary education",
        Bachelor = 2 => "Higher education (bachelor's)",
        Degree = 3 => "Higher education (degree)",
        Master = 4 => "Higher education (master's)",
        Doctorate = 5 => "Higher education (doctorate)",
        HigherEducationFrequency = 6 => "Frequency of higher education",
        TwelfthYearIncomplete = 9 => "12th year not completed",
        EleventhYearIncomplete = 10 => "11th year not completed",
        EleventhYearOther = 12 => "Other (11th year)",
        TenthYear = 14 => "10th year",
        TenthYearIncomplete = 15 => "10th year not completed",
        BasicEducationThirdCycle = 19 => "Basic education 3rd cycle",
        BasicEducationSecondCycle = 38 => "Basic education 2nd cycle",
        TechnologicalSpecialization = 39 => "Technological specialization course",
        DegreeFirstCycle = 40 => "Higher education (degree, 1st cycle)",
        ProfessionalTechnical = 42 => "Professional higher technical course",
        MasterSecondCycle = 43 => "Higher education (master, 2nd cycle)",
    }
}

code_table! {
    YesNo {
        Yes = 1 => "Yes",
        No = 0 => "No",
    }
}

code_table! {
    Gender {
        Male = 1 => "Male",
        Female = 0 => "Female",
    }
}

pub(crate) fn unknown_code(code: i64, codes: &[(i64, &str)]) -> String {
    let expected: Vec<String> = codes.iter().map(|(code, _)| code.to_string()).collect();
    format!("unknown code {code}, expected one of {}", expected.join(", "))
}

/// Label for `code` in `codes`, if the code is part of the table.
pub fn label_for(codes: &[(i64, &'static str)], code: i64) -> Option<&'static str> {
    codes
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, label)| *label)
}
