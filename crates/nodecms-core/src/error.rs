//! Core error types.

use thiserror::Error;

/// Core errors for criteria compilation, execution, and persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// A dotted criteria or ordering path leaves the known relation graph.
    #[error("unsupported path '{path}' on entity '{entity}'")]
    UnsupportedPath {
        /// Root entity the path was resolved from.
        entity: String,
        /// Offending path as supplied by the caller.
        path: String,
    },

    /// An operator tuple carries the wrong number of operands.
    #[error("operator '{operator}' on '{field}' expects {expected} operand(s), got {actual}")]
    InvalidOperatorArity {
        /// Criteria key.
        field: String,
        /// Operator keyword.
        operator: String,
        /// Human readable expectation (e.g. "exactly 2").
        expected: String,
        /// Number of operands supplied.
        actual: usize,
    },

    /// The first element of an operator tuple is not a known operator.
    #[error("unknown operator '{operator}' on '{field}'")]
    InvalidOperator {
        /// Criteria key.
        field: String,
        /// Operator keyword as supplied.
        operator: String,
    },

    /// The final path segment does not name a field of the resolved entity.
    #[error("unknown field '{field}' on entity '{entity}'")]
    UnknownField {
        /// Entity owning the field.
        entity: String,
        /// Field name.
        field: String,
    },

    /// A criteria value could not be interpreted.
    #[error("invalid criterion '{key}': {reason}")]
    InvalidCriterion {
        /// Criteria key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A node status change that the workflow does not allow.
    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status name.
        from: String,
        /// Requested status name.
        to: String,
    },

    /// Record not found.
    #[error("record not found")]
    NotFound,

    /// Full-text search provider failure.
    #[error("search provider error: {0}")]
    Search(String),

    /// Relational backend error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an `InvalidCriterion` error.
    pub fn invalid_criterion(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidCriterion {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any statement reached the database.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedPath { .. }
                | Error::InvalidOperatorArity { .. }
                | Error::InvalidOperator { .. }
                | Error::UnknownField { .. }
                | Error::InvalidCriterion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedPath {
            entity: "node".into(),
            path: "author.name".into(),
        };
        assert!(err.to_string().contains("author.name"));

        let err = Error::InvalidOperatorArity {
            field: "createdAt".into(),
            operator: "BETWEEN".into(),
            expected: "exactly 2".into(),
            actual: 1,
        };
        assert!(err.to_string().contains("BETWEEN"));
        assert!(err.to_string().contains("exactly 2"));
    }

    #[test]
    fn test_compile_error_classification() {
        assert!(Error::invalid_criterion("tags", "not a list").is_compile_error());
        assert!(!Error::NotFound.is_compile_error());
        assert!(!Error::Search("down".into()).is_compile_error());
    }
}
