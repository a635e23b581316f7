//! Error types for the reconciliation layer.

use std::fmt;
use thiserror::Error;

/// Result type for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a record store reports back to the engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the write (constraint violation, validation).
    #[error("rejected: {0}")]
    Rejected(String),

    /// A record the operation depends on does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// The store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Read,
    Create,
    Save,
    Destroy,
    Attach,
    Detach,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Save => "save",
            Self::Destroy => "destroy",
            Self::Attach => "attach",
            Self::Detach => "detach",
        };
        f.write_str(name)
    }
}

/// Which side of the comparison a schema belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSide {
    Source,
    Target,
}

impl fmt::Display for SchemaSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Errors that abort a reconciliation call.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A store operation failed. Operations applied before it stay applied.
    #[error("{operation} on `{model}` failed: {source}")]
    StoreOperation {
        operation: StoreOperation,
        model: String,
        #[source]
        source: StoreError,
    },

    /// A configured relation does not exist on one of the schemas.
    #[error("relation `{relation}` is not declared on the {side} schema `{model}`")]
    SchemaMismatch {
        relation: String,
        side: SchemaSide,
        model: String,
    },

    /// A record's correlation key could not be read.
    #[error("invalid record: {0}")]
    InvalidKey(#[from] datasync_types::Error),
}

impl ReconcileError {
    pub(crate) fn store(operation: StoreOperation, model: &str, source: StoreError) -> Self {
        Self::StoreOperation {
            operation,
            model: model.to_string(),
            source,
        }
    }
}
