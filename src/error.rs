//! Error types for continuation requests.
//!
//! Every failure carries a stable [`ErrorCode`] so transports can map it
//! without parsing messages. All errors are recoverable from the caller's
//! perspective; none is retried internally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::ExecutorError;
use crate::model::ActivityStatus;
use crate::schema::SchemaError;
use crate::store::StoreError;

/// Stable machine-readable error codes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ActivityNotFound,
    InvalidActivityState,
    TemplateNotFound,
    WorkflowNotFound,
    ValidationFailed,
    InvalidInput,
    SchemaResolutionFailed,
    ExecutorNotFound,
    ExecutionFailed,
    ConcurrentModification,
    Storage,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ActivityNotFound => "ActivityNotFound",
            Self::InvalidActivityState => "InvalidActivityState",
            Self::TemplateNotFound => "TemplateNotFound",
            Self::WorkflowNotFound => "WorkflowNotFound",
            Self::ValidationFailed => "ValidationFailed",
            Self::InvalidInput => "InvalidInput",
            Self::SchemaResolutionFailed => "SchemaResolutionFailed",
            Self::ExecutorNotFound => "ExecutorNotFound",
            Self::ExecutionFailed => "ExecutionFailed",
            Self::ConcurrentModification => "ConcurrentModification",
            Self::Storage => "Storage",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the continuation engine.
#[derive(Error, Debug)]
pub enum ContinuationError {
    #[error("activity '{0}' not found")]
    ActivityNotFound(String),

    #[error("activity '{id}' is {status}, only pending activities can be continued")]
    InvalidActivityState { id: String, status: ActivityStatus },

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("schema resolution failed: {0}")]
    SchemaResolutionFailed(String),

    #[error("executor '{0}' is not registered")]
    ExecutorNotFound(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ContinuationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ActivityNotFound(_) => ErrorCode::ActivityNotFound,
            Self::InvalidActivityState { .. } => ErrorCode::InvalidActivityState,
            Self::TemplateNotFound(_) => ErrorCode::TemplateNotFound,
            Self::WorkflowNotFound(_) => ErrorCode::WorkflowNotFound,
            Self::ValidationFailed(_) => ErrorCode::ValidationFailed,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::SchemaResolutionFailed(_) => ErrorCode::SchemaResolutionFailed,
            Self::ExecutorNotFound(_) => ErrorCode::ExecutorNotFound,
            Self::ExecutionFailed(_) => ErrorCode::ExecutionFailed,
            Self::ConcurrentModification(_) => ErrorCode::ConcurrentModification,
            Self::Storage(_) => ErrorCode::Storage,
        }
    }
}

impl From<SchemaError> for ContinuationError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::InvalidInput(_) => Self::InvalidInput(err.to_string()),
            SchemaError::ValidationFailed(_) => Self::ValidationFailed(err.to_string()),
            SchemaError::InvalidSchema(_) | SchemaError::ResolutionFailed { .. } => {
                Self::SchemaResolutionFailed(err.to_string())
            }
        }
    }
}

impl From<ExecutorError> for ContinuationError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::NotFound(code) => Self::ExecutorNotFound(code),
            other => Self::ExecutionFailed(other.to_string()),
        }
    }
}

/// Store failures that are not a lookup miss on a specific record.
///
/// Lookups map `NotFound` to the record-specific code themselves.
impl From<StoreError> for ContinuationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::ConcurrentModification(err.to_string()),
            other => Self::Storage(other.to_string()),
        }
    }
}

pub type ContinuationResult<T> = Result<T, ContinuationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Violation;
    use crate::store::RecordKind;

    #[test]
    fn test_error_codes() {
        let err = ContinuationError::InvalidActivityState {
            id: "act-1".into(),
            status: ActivityStatus::Completed,
        };
        assert_eq!(err.code(), ErrorCode::InvalidActivityState);
        assert_eq!(
            err.to_string(),
            "activity 'act-1' is completed, only pending activities can be continued"
        );
    }

    #[test]
    fn test_schema_error_mapping() {
        let err: ContinuationError =
            SchemaError::ValidationFailed(vec![Violation::new("notes", "is required")]).into();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);

        let err: ContinuationError = SchemaError::InvalidInput("eof".into()).into();
        assert_eq!(err.code(), ErrorCode::InvalidInput);

        let err: ContinuationError = SchemaError::ResolutionFailed {
            field: "total".into(),
            reason: "required field is missing".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::SchemaResolutionFailed);
    }

    #[test]
    fn test_executor_error_mapping() {
        let err: ContinuationError = ExecutorError::NotFound("send_email".into()).into();
        assert_eq!(err.code(), ErrorCode::ExecutorNotFound);

        let err: ContinuationError = ExecutorError::Failed("smtp down".into()).into();
        assert_eq!(err.code(), ErrorCode::ExecutionFailed);
        assert_eq!(err.to_string(), "execution failed: smtp down");
    }

    #[test]
    fn test_store_error_mapping() {
        let err: ContinuationError = StoreError::Conflict {
            kind: RecordKind::Activity,
            id: "act-1".into(),
            expected: 0,
            found: 1,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::ConcurrentModification);

        let err: ContinuationError = StoreError::Backend("disk full".into()).into();
        assert_eq!(err.code(), ErrorCode::Storage);
    }

    #[test]
    fn test_error_code_serializes_as_name() {
        let json = serde_json::to_string(&ErrorCode::SchemaResolutionFailed).unwrap();
        assert_eq!(json, "\"SchemaResolutionFailed\"");
    }
}
