//! Schema Processing Module
//!
//! The single place that imposes structure on the otherwise schema-less
//! workflow context.
//!
//! - [`model`]: Schema documents and per-field constraints
//! - [`processor`]: Input validation, field resolution and context merging

pub mod model;
pub mod processor;

use thiserror::Error;

pub use model::{FieldSchema, FieldType, Schema};
pub use processor::{merge_into_context, resolve, validate_input};

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' {}", self.field, self.reason)
    }
}

/// Errors raised while parsing schemas or processing payloads.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("malformed input: {0}")]
    InvalidInput(String),

    #[error("validation failed: {}", join_violations(.0))]
    ValidationFailed(Vec<Violation>),

    #[error("cannot resolve field '{field}': {reason}")]
    ResolutionFailed { field: String, reason: String },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_message_lists_fields() {
        let err = SchemaError::ValidationFailed(vec![
            Violation::new("notes", "is required"),
            Violation::new("amount", "must be at least 0"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: 'notes' is required; 'amount' must be at least 0"
        );
    }
}
