//! Error taxonomy for the mapdoc editor core.
//!
//! Four families, matching how callers are expected to react:
//!
//! - *Integrity errors* are programming-contract violations (operating on an
//!   identifier that is absent from its expected home). They abort the
//!   in-progress command and trigger group rollback; they are never retried
//!   or swallowed.
//! - *Collaborator failures* come from an external factory or taxonomy
//!   source rejecting a request; they propagate to the command's caller.
//! - *Storage faults* belong to the recovery store; they never touch the
//!   record collection or the history stack.
//! - `Internal` covers broken invariants that must not happen by
//!   construction (a failed undo during group rollback).

use thiserror::Error;

/// Convenience alias used across every mapdoc crate.
pub type Result<T> = std::result::Result<T, MapdocError>;

/// The unified error type for the editor core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MapdocError {
    /// An insertion anchor names an identifier the collection does not hold.
    #[error("dangling anchor: record {id} is not in the collection")]
    DanglingAnchor {
        /// The missing anchor identifier (raw value).
        id: u64,
    },

    /// An operation required an attached record but the record has no owner.
    #[error("record {id} is not attached to any collection")]
    Detached {
        /// The detached record identifier (raw value).
        id: u64,
    },

    /// An insert would duplicate an identifier already in the collection.
    #[error("duplicate record id {id} in collection")]
    DuplicateId {
        /// The colliding identifier (raw value).
        id: u64,
    },

    /// A breakout operation named a field with no configured control.
    #[error("no breakout control configured for field {field:?}")]
    UnknownBreakout {
        /// The unrecognized field key.
        field: String,
    },

    /// A breakout reorder named a destination outside the control list.
    #[error("breakout destination index {index} out of range (len {len})")]
    BreakoutIndexOutOfRange {
        /// Requested destination index.
        index: usize,
        /// Current number of controls.
        len: usize,
    },

    /// The record factory was asked to build a record without a mandatory
    /// field.
    #[error("mandatory field {field:?} missing from record parameters")]
    MissingField {
        /// The absent field key.
        field: String,
    },

    /// An external collaborator (factory, taxonomy source) rejected a
    /// request.
    #[error("collaborator failure: {reason}")]
    Collaborator {
        /// Human-readable rejection reason from the collaborator.
        reason: String,
    },

    /// The storage medium refused a write for capacity reasons.
    #[error("storage quota exceeded writing key {key:?}")]
    StorageQuota {
        /// The key whose write was refused.
        key: String,
    },

    /// A recovery entry could not be decoded.
    ///
    /// Surfaced only from explicit single-entry reads; the startup scan
    /// skips corrupt entries instead of failing.
    #[error("corrupt recovery entry under key {key:?}: {reason}")]
    CorruptEntry {
        /// The offending storage key.
        key: String,
        /// Decode failure detail.
        reason: String,
    },

    /// An invariant that holds by construction was observed broken.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl MapdocError {
    /// Shorthand for [`MapdocError::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for the integrity family (programming-contract violations).
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::DanglingAnchor { .. }
                | Self::Detached { .. }
                | Self::DuplicateId { .. }
                | Self::UnknownBreakout { .. }
                | Self::BreakoutIndexOutOfRange { .. }
        )
    }

    /// True for storage faults owned by the recovery store.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageQuota { .. } | Self::CorruptEntry { .. })
    }
}
