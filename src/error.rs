use crate::resolver::RowFailure;

/// Domain failures surfaced by the core services.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("no valid rows found; check column headers: Class, Roll No (or Name), Subject, Marks")]
    NoValidRows { failures: Vec<RowFailure> },
    #[error("student {identity} is marked absent on {date}")]
    StudentAbsent { identity: String, date: String },
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("settings store error: {0:#}")]
    Settings(anyhow::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::Validation(_) => "bad_params",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::NoValidRows { .. } => "no_valid_rows",
            CoreError::StudentAbsent { .. } => "student_absent",
            CoreError::Store(_) | CoreError::Settings(_) => "db_query_failed",
            CoreError::Serialization(_) => "serialization_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CoreError::NoValidRows { failures } => {
                Some(serde_json::json!({ "failures": failures }))
            }
            CoreError::StudentAbsent { identity, date } => {
                Some(serde_json::json!({ "identity": identity, "date": date }))
            }
            _ => None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
