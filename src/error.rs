//! Error types for relq.
//!
//! Everything the compiler raises is a pre-execution failure: the query was
//! malformed, asked for something the dialect cannot express, or referenced
//! schema that does not exist. None of these are worth retrying.

use thiserror::Error;

/// The main error type for relq operations.
#[derive(Debug, Error)]
pub enum RelqError {
    /// A write had no data to write.
    #[error("Empty payload: {operation} requires at least one column")]
    EmptyPayload { operation: String },

    /// UPDATE/DELETE without a filter.
    #[error("Refusing to compile {operation} on '{model}' without a filter")]
    MissingSafetyPredicate { operation: String, model: String },

    /// Nested connect/disconnect without conditions.
    #[error("Nested {operation} on relation '{relation}' requires a where filter")]
    MissingWhere { operation: String, relation: String },

    /// createMany rows whose columns disagree with the first row.
    #[error("Shape mismatch in row {row}: {problem} column '{column}'")]
    ShapeMismatch {
        row: usize,
        column: String,
        problem: &'static str,
    },

    /// A payload names the same field twice.
    #[error("Field '{field}' appears more than once in {operation} payload")]
    DuplicateField { operation: String, field: String },

    /// A nested create names the relation's foreign key, which is bound to the parent key.
    #[error("Nested {operation} on relation '{relation}' sets foreign key '{column}'; it is taken from the parent")]
    ForeignKeyInPayload {
        operation: String,
        relation: String,
        column: String,
    },

    /// Nested writes attached to an operation that has no single parent row.
    #[error("Operation {operation} cannot carry nested writes")]
    NestedWritesNotAllowed { operation: String },

    /// Operator given a value of the wrong shape, or not available in the dialect.
    #[error("Unsupported operator '{operator}' on field '{field}': {reason}")]
    UnsupportedOperator {
        field: String,
        operator: String,
        reason: String,
    },

    /// SUM/AVG/MIN/MAX need a concrete field.
    #[error("Aggregation {function} requires a named field")]
    MissingAggregationField { function: String },

    /// Aggregate query without aggregations.
    #[error("Aggregate on '{model}' requires at least one aggregation")]
    MissingAggregation { model: String },

    /// GroupBy query without group-by fields.
    #[error("GroupBy on '{model}' requires at least one group-by field")]
    MissingGroupBy { model: String },

    /// Upsert without conflict keys.
    #[error("Upsert on '{model}' requires at least one conflict key")]
    MissingUpsertKeys { model: String },

    /// Payload kind does not match the operation.
    #[error("Operation {operation} expects {expected} payload, got {found}")]
    PayloadMismatch {
        operation: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown model '{model}'{}", did_you_mean(.suggestion))]
    UnknownModel {
        model: String,
        suggestion: Option<String>,
    },

    #[error("Unknown field '{field}' on model '{model}'{}", did_you_mean(.suggestion))]
    UnknownField {
        model: String,
        field: String,
        suggestion: Option<String>,
    },

    #[error("Unknown relation '{relation}' on model '{model}'{}", did_you_mean(.suggestion))]
    UnknownRelation {
        model: String,
        relation: String,
        suggestion: Option<String>,
    },

    /// Filter or inclusion tree nested deeper than the configured bound.
    #[error("{what} nested deeper than {limit} levels")]
    DepthExceeded { what: &'static str, limit: usize },

    /// Configuration or schema file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{}'?", s),
        None => String::new(),
    }
}

impl RelqError {
    /// Create an unsupported-operator error.
    pub fn unsupported(
        field: impl Into<String>,
        operator: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedOperator {
            field: field.into(),
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    /// Create an empty-payload error.
    pub fn empty_payload(operation: impl Into<String>) -> Self {
        Self::EmptyPayload {
            operation: operation.into(),
        }
    }

    /// Compile errors are logic or schema bugs; only IO may succeed on a second try.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Result type alias for relq operations.
pub type RelqResult<T> = Result<T, RelqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelqError::ShapeMismatch {
            row: 2,
            column: "email".to_string(),
            problem: "missing",
        };
        assert_eq!(err.to_string(), "Shape mismatch in row 2: missing column 'email'");
    }

    #[test]
    fn test_suggestion_display() {
        let err = RelqError::UnknownRelation {
            model: "User".to_string(),
            relation: "post".to_string(),
            suggestion: Some("posts".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Unknown relation 'post' on model 'User'. Did you mean 'posts'?"
        );

        let err = RelqError::UnknownModel {
            model: "Nope".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Unknown model 'Nope'");
    }

    #[test]
    fn test_duplicate_field_display() {
        let err = RelqError::DuplicateField {
            operation: "update".to_string(),
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "Field 'name' appears more than once in update payload");
    }

    #[test]
    fn test_compile_errors_not_retryable() {
        assert!(!RelqError::empty_payload("create").is_retryable());
        assert!(!RelqError::unsupported("tags", "has", "no arrays").is_retryable());
    }
}
