//! Records: stable identity plus an ordered set of named, typed fields.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, stable record identifier.
///
/// Assigned at creation and immutable for the record's lifetime. Freshly
/// minted ids are strictly increasing within a process; explicit ids (e.g.
/// re-loaded from a document) are accepted via `from_raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Mint a fresh, process-unique identifier.
    #[must_use]
    pub fn mint() -> Self {
        Self(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an explicit identifier (document load path).
    ///
    /// Also advances the mint counter past `raw` so later mints cannot
    /// collide with loaded ids.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        NEXT_RECORD_ID.fetch_max(raw + 1, Ordering::Relaxed);
        Self(raw)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Process-unique identifier for a record collection.
///
/// Used as the record's owner back-reference tag: a record stores the id of
/// the collection that holds it rather than a pointer, so it can never carry
/// a second reference into the same collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(u64);

impl CollectionId {
    /// Mint a fresh collection identifier.
    #[must_use]
    pub fn mint() -> Self {
        Self(NEXT_COLLECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Single selection from a configured value list (`None` = unset).
    Select(Option<String>),
    /// Multiple selections from a configured value list.
    MultiSelect(Vec<String>),
    /// Reference into an external framework's object set.
    Reference {
        /// Which framework object set the key refers into.
        set: String,
        /// The referenced object's key within that set.
        key: String,
    },
}

impl FieldValue {
    /// The value used for grouping this field into projection sections.
    ///
    /// `None` means the record belongs in the explicit "No Value" bucket.
    /// Multi-select fields group by their first selected value so a record
    /// always maps to exactly one section.
    #[must_use]
    pub fn group_key(&self) -> Option<&str> {
        match self {
            Self::Text(s) => (!s.is_empty()).then_some(s.as_str()),
            Self::Select(v) => v.as_deref(),
            Self::MultiSelect(vs) => vs.first().map(String::as_str),
            Self::Reference { key, .. } => Some(key.as_str()),
        }
    }
}

/// One named field slot on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name, unique within the record.
    pub key: String,
    /// Current value.
    pub value: FieldValue,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A domain record ("mapping object"): stable identity plus an ordered set
/// of named fields.
///
/// The `owner` tag is maintained exclusively by the collection: set on
/// insertion, cleared on removal. It is skipped during serialization because
/// ownership is re-established when a document loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    fields: Vec<Field>,
    #[serde(skip)]
    owner: Option<CollectionId>,
}

impl Record {
    /// Build a detached record with a fresh identifier.
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self::with_id(RecordId::mint(), fields)
    }

    /// Build a detached record with an explicit identifier.
    #[must_use]
    pub fn with_id(id: RecordId, fields: Vec<Field>) -> Self {
        Self { id, fields, owner: None }
    }

    /// The record's stable identifier.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        self.id
    }

    /// The owning collection, if attached.
    #[must_use]
    pub const fn owner(&self) -> Option<CollectionId> {
        self.owner
    }

    /// Attach to a collection. Called only by the collection itself.
    pub fn set_owner(&mut self, owner: Option<CollectionId>) {
        self.owner = owner;
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field value by key.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    /// Set or append a field value, returning the previous value if the
    /// field existed.
    ///
    /// This is the direct-mutation escape hatch: it bypasses the undo
    /// history, and callers accept that tradeoff explicitly per field.
    /// Recorded edits go through the `SetField` command instead.
    pub fn set_field(&mut self, key: &str, value: FieldValue) -> Option<FieldValue> {
        if let Some(f) = self.fields.iter_mut().find(|f| f.key == key) {
            Some(std::mem::replace(&mut f.value, value))
        } else {
            self.fields.push(Field { key: key.to_owned(), value });
            None
        }
    }

    /// Drop a field slot entirely, returning its value if it existed.
    ///
    /// The inverse of a `set_field` that appended: undo paths use it to
    /// restore "field was never set".
    pub fn remove_field(&mut self, key: &str) -> Option<FieldValue> {
        let pos = self.fields.iter().position(|f| f.key == key)?;
        Some(self.fields.remove(pos).value)
    }
}
