use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// -------------------------------------------------------------------------------------------------
// ValidationStatus
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Undetermined,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Undetermined => "undetermined",
        };
        write!(f, "{s}")
    }
}

mod sql {
    use super::*;
    use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

    impl ToSql for ValidationStatus {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(self.to_string().into())
        }
    }

    impl FromSql for ValidationStatus {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            match value.as_str()? {
                "valid" => Ok(Self::Valid),
                "invalid" => Ok(Self::Invalid),
                "undetermined" => Ok(Self::Undetermined),
                _ => Err(FromSqlError::InvalidType),
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
// ValidationResult
// -------------------------------------------------------------------------------------------------
/// The outcome of submitting a match's captured groups to an out-of-band validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationResult {
    pub status: ValidationStatus,

    /// A confidence score in `[0, 1]`
    pub confidence: f64,

    pub message: Option<String>,

    /// Seconds since the Unix epoch at which validation ran
    pub validated_at: i64,
}

impl ValidationResult {
    pub fn undetermined(message: impl Into<String>, validated_at: i64) -> Self {
        ValidationResult {
            status: ValidationStatus::Undetermined,
            confidence: 0.0,
            message: Some(message.into()),
            validated_at,
        }
    }
}
