//! The ordered record collection for one document.
//!
//! Two invariants hold at all times:
//!
//! 1. Identifiers are unique within the collection.
//! 2. Order is a total order expressed purely through "insert at head" /
//!    "insert after id" anchors — no numeric index is ever persisted.
//!
//! Mutation goes through commands in production; the primitives here are the
//! command implementations' building blocks. Removal of unknown ids is a
//! deliberate no-op because commands may be undone or redone against a
//! collection that has since been edited programmatically elsewhere.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mapdoc_error::{MapdocError, Result};
use mapdoc_types::{CollectionId, Record, RecordId};

// ---------------------------------------------------------------------------
// Anchor
// ---------------------------------------------------------------------------

/// Where an insertion lands relative to existing members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// Insert before every current member.
    Head,
    /// Insert immediately after the named member.
    After(RecordId),
}

// ---------------------------------------------------------------------------
// RecordCollection
// ---------------------------------------------------------------------------

/// The ordered, identity-unique set of records for one document.
#[derive(Debug)]
pub struct RecordCollection {
    id: CollectionId,
    order: Vec<RecordId>,
    records: HashMap<RecordId, Record>,
}

impl Default for RecordCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCollection {
    /// An empty collection with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self { id: CollectionId::mint(), order: Vec::new(), records: HashMap::new() }
    }

    /// This collection's identity (the value written into member records'
    /// owner tags).
    #[must_use]
    pub const fn id(&self) -> CollectionId {
        self.id
    }

    /// Number of member records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the collection has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether `id` is currently a member.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    /// Borrow a member record.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// Mutably borrow a member record.
    ///
    /// Direct field edits through this path bypass the undo history; that
    /// tradeoff is the caller's to accept per edit.
    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.get_mut(&id)
    }

    /// Zero-based position of a member in collection order.
    #[must_use]
    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.order.iter().position(|&m| m == id)
    }

    /// Member ids in collection order.
    #[must_use]
    pub fn order(&self) -> &[RecordId] {
        &self.order
    }

    /// Iterate members in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// The member immediately before `id`, if any.
    #[must_use]
    pub fn neighbor_before(&self, id: RecordId) -> Option<RecordId> {
        let pos = self.position(id)?;
        pos.checked_sub(1).map(|p| self.order[p])
    }

    /// The member immediately after `id`, if any.
    #[must_use]
    pub fn neighbor_after(&self, id: RecordId) -> Option<RecordId> {
        let pos = self.position(id)?;
        self.order.get(pos + 1).copied()
    }

    /// The anchor that would re-insert `id` at its current position.
    ///
    /// Command undo paths capture this before removing a record so the
    /// record can be put back where it was.
    #[must_use]
    pub fn anchor_of(&self, id: RecordId) -> Option<Anchor> {
        self.position(id)?;
        Some(self.neighbor_before(id).map_or(Anchor::Head, Anchor::After))
    }

    /// Insert `records` as a contiguous run, in argument order, immediately
    /// after the anchor.
    ///
    /// An empty `records` is a no-op. Fails with `DanglingAnchor` if the
    /// anchor names a non-member and with `DuplicateId` if any incoming id
    /// is already present or repeated in the argument; on failure nothing is
    /// inserted. Each inserted record's owner tag is set to this collection.
    pub fn insert_after(&mut self, records: Vec<Record>, anchor: Anchor) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let at = match anchor {
            Anchor::Head => 0,
            Anchor::After(id) => {
                self.position(id)
                    .ok_or(MapdocError::DanglingAnchor { id: id.raw() })?
                    + 1
            }
        };
        // Validate the whole batch before touching anything.
        for (i, r) in records.iter().enumerate() {
            let dup_in_batch = records[..i].iter().any(|p| p.id() == r.id());
            if dup_in_batch || self.records.contains_key(&r.id()) {
                return Err(MapdocError::DuplicateId { id: r.id().raw() });
            }
        }
        debug!(
            collection = self.id.raw(),
            count = records.len(),
            at,
            "inserting records"
        );
        let ids: Vec<RecordId> = records.iter().map(Record::id).collect();
        for mut r in records {
            r.set_owner(Some(self.id));
            self.records.insert(r.id(), r);
        }
        self.order.splice(at..at, ids);
        Ok(())
    }

    /// Remove the named members, returning them in collection order with
    /// their owner tags cleared.
    ///
    /// Unknown ids are skipped (idempotent removal).
    pub fn remove(&mut self, ids: &[RecordId]) -> Vec<Record> {
        let mut removed = Vec::new();
        self.order.retain(|id| {
            if ids.contains(id) {
                if let Some(mut r) = self.records.remove(id) {
                    r.set_owner(None);
                    removed.push(r);
                }
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            debug!(collection = self.id.raw(), count = removed.len(), "removed records");
        }
        removed
    }
}
