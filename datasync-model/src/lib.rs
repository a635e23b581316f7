//! Record and schema model for DataSync.
//!
//! Defines the types the reconciliation engine reasons about:
//! - [`Record`]: a row of JSON fields with in-flight change tracking
//! - [`ModelSchema`]: a model's name and the relations it exposes
//! - [`RelationDescriptor`] / [`RelationKind`]: how a relation's members
//!   are reconciled (owned children vs. linked records)
//!
//! Stores hand records out and take them back; nothing here performs I/O.

mod record;
mod schema;

pub use record::Record;
pub use schema::{singularize, ModelSchema, RelationDescriptor, RelationKind};
