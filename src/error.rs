use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// A test that already occupies the (date, type) slot a caller asked for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingTest {
    pub test_id: String,
    #[serde(rename = "type")]
    pub test_type: String,
    pub title: String,
}

/// Domain failures surfaced over IPC. Every variant maps to a stable
/// snake_case code so the UI can branch on it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("test not found: {test_id}")]
    NotFound { test_id: String },

    #[error("a test with id {test_id} already exists")]
    Duplicate { test_id: String },

    #[error("a test of this type already exists on this date")]
    Conflict { conflicts: Vec<ConflictingTest> },

    #[error("student {student_id} has already submitted test {test_id}")]
    AlreadySubmitted { test_id: String, student_id: String },

    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        StoreError::Validation {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(
        code: &'static str,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        StoreError::Validation {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Validation { code, .. } => code,
            StoreError::NotFound { .. } => "test_not_found",
            StoreError::Duplicate { .. } => "duplicate_test",
            StoreError::Conflict { .. } => "schedule_conflict",
            StoreError::AlreadySubmitted { .. } => "already_submitted",
            StoreError::Unavailable(_) => "store_unavailable",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            StoreError::Validation { details, .. } => details.clone(),
            StoreError::NotFound { test_id } => Some(json!({ "testId": test_id })),
            StoreError::Duplicate { test_id } => Some(json!({ "testId": test_id })),
            StoreError::Conflict { conflicts } => Some(json!({ "conflicts": conflicts })),
            StoreError::AlreadySubmitted {
                test_id,
                student_id,
            } => Some(json!({ "testId": test_id, "studentId": student_id })),
            StoreError::Unavailable(_) => None,
        }
    }
}
