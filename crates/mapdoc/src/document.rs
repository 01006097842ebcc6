//! Document wiring: identity, naming, snapshots, and recovery integration.

use tracing::info;

use mapdoc_collection::Anchor;
use mapdoc_error::{MapdocError, Result};
use mapdoc_recovery::{RecoveryStore, StorageMedium};
use mapdoc_types::{Record, RecordId};

use crate::Editor;

/// One open document: a stable id, a display name, and its editor.
pub struct Document {
    id: String,
    name: String,
    editor: Editor,
}

impl core::fmt::Debug for Document {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// A fresh, empty document.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), editor: Editor::new() }
    }

    /// Restore a document from a recovery snapshot's contents.
    ///
    /// Loaded record ids advance the process-wide mint counter so fresh ids
    /// never collide with restored ones.
    pub fn from_snapshot(
        id: impl Into<String>,
        name: impl Into<String>,
        contents: &str,
    ) -> Result<Self> {
        let id = id.into();
        let records: Vec<Record> = serde_json::from_str(contents).map_err(|err| {
            MapdocError::CorruptEntry { key: id.clone(), reason: err.to_string() }
        })?;
        for record in &records {
            let _ = RecordId::from_raw(record.id().raw());
        }
        let mut doc = Self::new(id, name);
        let count = records.len();
        doc.editor
            .state_mut()
            .collection
            .insert_after(records, Anchor::Head)?;
        doc.editor.rebuild_projection(&[]);
        info!(doc = doc.id, records = count, "document restored from snapshot");
        Ok(doc)
    }

    /// The document's stable id (the recovery store key).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The display name used for recovery entries.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The document's editor.
    #[must_use]
    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    /// Mutable access to the document's editor.
    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    /// Serialize the record collection for crash recovery.
    pub fn snapshot(&self) -> Result<String> {
        let records: Vec<&Record> = self.editor.state().collection.iter().collect();
        serde_json::to_string(&records)
            .map_err(|err| MapdocError::internal(err.to_string()))
    }

    /// Snapshot this document into the recovery store, honoring any cancel
    /// issued since the ticket was scheduled.
    pub fn autosave<M: StorageMedium>(&self, store: &mut RecoveryStore<M>) -> Result<bool> {
        let ticket = store.schedule(&self.id);
        let contents = self.snapshot()?;
        store.commit(&ticket, &self.name, &contents)
    }

    /// Close the document: cancel any pending autosave first, then drop the
    /// recovery entry, so a late save cannot race the deletion.
    pub fn close<M: StorageMedium>(self, store: &mut RecoveryStore<M>) {
        store.cancel(&self.id);
        store.delete(&self.id);
        info!(doc = self.id, "document closed");
    }
}
