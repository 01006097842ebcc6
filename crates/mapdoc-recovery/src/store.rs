//! The recovery store proper.

use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mapdoc_error::Result;

use crate::StorageMedium;

/// Prefix under which every recovery entry lives in the medium.
pub const RECOVERY_KEY_PREFIX: &str = "mapdoc.recover.";

/// One crash-recovery snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryEntry {
    /// Document id (the store key, minus prefix).
    #[serde(skip)]
    pub doc_id: String,
    /// Human-readable document name at snapshot time.
    pub name: String,
    /// Wall-clock snapshot time, unix milliseconds.
    pub timestamp_ms: u64,
    /// Serialized document contents.
    pub contents: String,
}

/// A cooperative-cancellation token for one scheduled autosave.
///
/// `commit` writes only while the token is still current; `cancel`
/// invalidates all outstanding tokens for a document. This is how a pending
/// autosave is prevented from racing a deletion when a document closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveTicket {
    doc_id: String,
    generation: u64,
}

impl AutosaveTicket {
    /// The document this ticket would snapshot.
    #[must_use]
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }
}

/// Key-indexed, time-ordered snapshot store for crash recovery.
///
/// Process-wide state, seeded at construction by scanning the medium for
/// keys under [`RECOVERY_KEY_PREFIX`]. Entries that fail to decode are
/// skipped with a warning — a corrupt snapshot must never prevent the
/// others from loading.
pub struct RecoveryStore<M: StorageMedium> {
    medium: M,
    cache: HashMap<String, RecoveryEntry>,
    autosave_generation: HashMap<String, u64>,
}

impl<M: StorageMedium> RecoveryStore<M> {
    /// Open a store over `medium`, scanning for existing entries.
    pub fn open(medium: M) -> Self {
        let mut cache = HashMap::new();
        for key in medium.keys() {
            let Some(doc_id) = key.strip_prefix(RECOVERY_KEY_PREFIX) else {
                continue;
            };
            let Some(raw) = medium.get(&key) else {
                continue;
            };
            match serde_json::from_str::<RecoveryEntry>(&raw) {
                Ok(mut entry) => {
                    entry.doc_id = doc_id.to_owned();
                    cache.insert(entry.doc_id.clone(), entry);
                }
                Err(err) => {
                    warn!(key, %err, "skipping corrupt recovery entry");
                }
            }
        }
        info!(entries = cache.len(), "recovery store opened");
        Self { medium, cache, autosave_generation: HashMap::new() }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// The entry for `doc_id`, if any.
    #[must_use]
    pub fn get(&self, doc_id: &str) -> Option<&RecoveryEntry> {
        self.cache.get(doc_id)
    }

    /// All entries, newest first (ties broken by document id for a stable
    /// order).
    #[must_use]
    pub fn entries(&self) -> Vec<&RecoveryEntry> {
        let mut all: Vec<&RecoveryEntry> = self.cache.values().collect();
        all.sort_by(|a, b| {
            b.timestamp_ms
                .cmp(&a.timestamp_ms)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        all
    }

    /// Write or overwrite the snapshot for `doc_id`, stamping the current
    /// time.
    ///
    /// A write fault (quota) propagates; the cache is only updated after the
    /// medium accepted the write.
    pub fn store_or_update(
        &mut self,
        doc_id: &str,
        name: &str,
        contents: &str,
    ) -> Result<()> {
        let entry = RecoveryEntry {
            doc_id: doc_id.to_owned(),
            name: name.to_owned(),
            timestamp_ms: now_millis(),
            contents: contents.to_owned(),
        };
        let raw = serde_json::to_string(&entry)
            .map_err(|err| mapdoc_error::MapdocError::internal(err.to_string()))?;
        self.medium
            .set(&format!("{RECOVERY_KEY_PREFIX}{doc_id}"), &raw)?;
        debug!(doc_id, name, "recovery snapshot stored");
        self.cache.insert(doc_id.to_owned(), entry);
        Ok(())
    }

    /// Remove the snapshot for `doc_id` (no-op if absent).
    pub fn delete(&mut self, doc_id: &str) {
        self.medium.delete(&format!("{RECOVERY_KEY_PREFIX}{doc_id}"));
        if self.cache.remove(doc_id).is_some() {
            debug!(doc_id, "recovery snapshot deleted");
        }
    }

    // -- autosave scheduling ------------------------------------------------

    /// Obtain a ticket for a pending autosave of `doc_id`.
    pub fn schedule(&mut self, doc_id: &str) -> AutosaveTicket {
        let generation = self
            .autosave_generation
            .entry(doc_id.to_owned())
            .or_insert(0);
        AutosaveTicket { doc_id: doc_id.to_owned(), generation: *generation }
    }

    /// Invalidate every outstanding autosave ticket for `doc_id`.
    pub fn cancel(&mut self, doc_id: &str) {
        let generation = self
            .autosave_generation
            .entry(doc_id.to_owned())
            .or_insert(0);
        *generation += 1;
        debug!(doc_id, "pending autosave cancelled");
    }

    /// Perform the autosave named by `ticket` unless it was cancelled in the
    /// meantime. Returns whether a snapshot was written.
    pub fn commit(
        &mut self,
        ticket: &AutosaveTicket,
        name: &str,
        contents: &str,
    ) -> Result<bool> {
        let current = self
            .autosave_generation
            .get(&ticket.doc_id)
            .copied()
            .unwrap_or(0);
        if current != ticket.generation {
            debug!(doc_id = ticket.doc_id, "stale autosave ticket ignored");
            return Ok(false);
        }
        self.store_or_update(&ticket.doc_id, name, contents)?;
        Ok(true)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
