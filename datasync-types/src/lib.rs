//! Core type definitions for DataSync.
//!
//! This crate defines the store-agnostic types shared by the model and the
//! reconciliation engine:
//! - Run identifiers (UUID v7) and correlation keys
//! - Change events emitted while a target converges toward a source
//! - Per-record reconciliation outcomes
//!
//! Field payloads are plain JSON objects. Nothing here knows how records are
//! fetched or persisted.

mod event;
mod key;
mod outcome;

pub use event::ChangeEvent;
pub use key::{CorrelationKey, RunId};
pub use outcome::{Outcome, OutcomeEntry};

/// An ordered map of field name to field value.
///
/// Insertion order is preserved, so iterating a payload visits fields in the
/// order the record declared them.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid correlation key in field `{field}`: {reason}")]
    InvalidKey { field: String, reason: String },
}
