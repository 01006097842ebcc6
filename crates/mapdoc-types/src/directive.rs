//! Directive signalling between commands and the host.
//!
//! A command never calls the UI, the persistence layer, or the projection
//! directly. It writes advisory flags into a [`DirectiveSink`] during each
//! phase; the host drains the sink into a [`DirectiveBatch`] after the phase
//! fully completes and reacts then. Flags are order-independent and OR-merge.

use bitflags::bitflags;

use crate::RecordId;

bitflags! {
    /// Advisory side-effect signals a command may raise.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Directive: u8 {
        /// Append this command to the undo history.
        const RECORD = 1 << 0;
        /// Request a redraw of the display.
        const RENDER = 1 << 1;
        /// Recompute section membership for specific records (scoped by id
        /// through [`DirectiveSink::reindex`]).
        const REINDEX = 1 << 2;
        /// Request a crash-recovery snapshot.
        const AUTOSAVE = 1 << 3;
        /// Recompute the whole view projection.
        const REBUILD_BREAKOUTS = 1 << 4;
    }
}

/// Accumulates directives raised during one command phase.
///
/// `reindex` ids are deduplicated so the host dispatches one scoped reindex
/// per distinct record regardless of how many steps named it.
#[derive(Debug, Default)]
pub struct DirectiveSink {
    flags: Directive,
    reindex_ids: Vec<RecordId>,
}

impl DirectiveSink {
    /// A fresh, empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// OR the given flags into the accumulated mask.
    pub fn issue(&mut self, flags: Directive) {
        self.flags |= flags;
    }

    /// Request a scoped reindex of one record's section membership.
    pub fn reindex(&mut self, id: RecordId) {
        self.flags |= Directive::REINDEX;
        if !self.reindex_ids.contains(&id) {
            self.reindex_ids.push(id);
        }
    }

    /// Flags accumulated so far.
    #[must_use]
    pub const fn flags(&self) -> Directive {
        self.flags
    }

    /// Consume the sink into the batch the host observes.
    #[must_use]
    pub fn finish(self) -> DirectiveBatch {
        DirectiveBatch { flags: self.flags, reindex_ids: self.reindex_ids }
    }
}

/// The completed directive set for one command phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveBatch {
    /// OR of every flag issued during the phase.
    pub flags: Directive,
    /// Distinct record ids named by scoped reindex requests, in first-issue
    /// order.
    pub reindex_ids: Vec<RecordId>,
}

impl DirectiveBatch {
    /// Whether the phase asked to be appended to the undo history.
    #[must_use]
    pub const fn wants_record(&self) -> bool {
        self.flags.contains(Directive::RECORD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_or_merge() {
        let mut sink = DirectiveSink::new();
        sink.issue(Directive::RECORD);
        sink.issue(Directive::RENDER | Directive::AUTOSAVE);
        let batch = sink.finish();
        assert!(batch.wants_record());
        assert!(batch.flags.contains(Directive::RENDER));
        assert!(batch.flags.contains(Directive::AUTOSAVE));
        assert!(!batch.flags.contains(Directive::REINDEX));
    }

    #[test]
    fn test_reindex_ids_dedupe_preserving_order() {
        let a = RecordId::mint();
        let b = RecordId::mint();
        let mut sink = DirectiveSink::new();
        sink.reindex(a);
        sink.reindex(b);
        sink.reindex(a);
        let batch = sink.finish();
        assert!(batch.flags.contains(Directive::REINDEX));
        assert_eq!(batch.reindex_ids, vec![a, b]);
    }

    #[test]
    fn test_empty_sink_is_none() {
        let batch = DirectiveSink::new().finish();
        assert_eq!(batch.flags, Directive::empty());
        assert!(!batch.wants_record());
        assert!(batch.reindex_ids.is_empty());
    }
}
