//! The mapdoc editor core, assembled.
//!
//! This crate ties the leaf crates together: the editor state commands
//! mutate, the concrete command set, the editor (history + directive
//! dispatch), document wiring, and the collaborator contracts the core
//! consumes from its host.

mod collab;
mod commands;
mod document;
mod editor;
mod state;

pub use collab::{BasicRecordFactory, RecordFactory, TaxonomySource, populate_options};
pub use commands::{
    CreateRecords, InsertRecords, MoveBreakoutControl, MoveRecord, RemoveRecords,
    SelectionPhases, SetBreakoutEnabled, SetCollapsed, SetField, SetSelected,
};
pub use document::Document;
pub use editor::Editor;
pub use state::EditorState;

pub use mapdoc_breakout::{BreakoutControls, ItemRef, ProjectionTree, SectionKey, SectionPath};
pub use mapdoc_collection::{Anchor, RecordCollection};
pub use mapdoc_error::{MapdocError, Result};
pub use mapdoc_history::{Command, GroupCommand, HistoryStack};
pub use mapdoc_recovery::{MemoryMedium, RecoveryStore, StorageMedium};
pub use mapdoc_types::{
    CollectionId, Directive, DirectiveBatch, DirectiveSink, Field, FieldValue, Record,
    RecordId,
};
