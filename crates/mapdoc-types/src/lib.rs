//! Core type definitions for the mapdoc editor core.
//!
//! Everything here is shared by at least two downstream crates: record
//! identity, field values, the [`Record`] itself, and the [`Directive`]
//! signalling types used by the command engine.

mod directive;
mod record;

pub use directive::{Directive, DirectiveBatch, DirectiveSink};
pub use record::{CollectionId, Field, FieldValue, Record, RecordId};
