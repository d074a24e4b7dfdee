//! Error types for cascade operations.

use crate::FieldPath;
use thiserror::Error;

/// Result type alias for cascade operations.
pub type CascadeResult<T> = Result<T, CascadeError>;

/// Errors that can occur during schema lookups, compilation and reduction.
///
/// Every failure is local to a single operation; the engine holds no state
/// that an error could corrupt.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// Path does not resolve against the schema.
    #[error("schema lookup failed: no node at {path}")]
    SchemaLookup {
        /// The path that did not resolve.
        path: FieldPath,
    },

    /// More than one schema candidate and no disambiguating hint.
    #[error("ambiguous path {path}: {} candidates", candidates.len())]
    AmbiguousPath {
        /// The ambiguous path.
        path: FieldPath,
        /// Descriptions of the candidate nodes (title or kind).
        candidates: Vec<String>,
    },

    /// The schema definition itself is unusable.
    #[error("malformed schema: {reason}")]
    MalformedSchema {
        /// What went wrong during parsing.
        reason: String,
    },

    /// A document violates the minimal shape an algorithm assumes.
    #[error("malformed document at {path}: {reason}")]
    MalformedDocument {
        /// Where the violation was found.
        path: FieldPath,
        /// What shape assumption was violated.
        reason: String,
    },

    /// Template expression failed to parse or evaluate.
    #[error("template error: {message}")]
    Template {
        /// Description of the failure.
        message: String,
    },
}

impl CascadeError {
    /// Create a schema lookup error.
    #[inline]
    pub fn schema_lookup(path: FieldPath) -> Self {
        CascadeError::SchemaLookup { path }
    }

    /// Create an ambiguous path error.
    #[inline]
    pub fn ambiguous_path(path: FieldPath, candidates: Vec<String>) -> Self {
        CascadeError::AmbiguousPath { path, candidates }
    }

    /// Create a malformed schema error.
    #[inline]
    pub fn malformed_schema(reason: impl Into<String>) -> Self {
        CascadeError::MalformedSchema {
            reason: reason.into(),
        }
    }

    /// Create a malformed document error.
    #[inline]
    pub fn malformed_document(path: FieldPath, reason: impl Into<String>) -> Self {
        CascadeError::MalformedDocument {
            path,
            reason: reason.into(),
        }
    }

    /// Create a template error.
    #[inline]
    pub fn template(message: impl Into<String>) -> Self {
        CascadeError::Template {
            message: message.into(),
        }
    }
}

/// Get the type name of a JSON value.
#[inline]
pub fn value_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
