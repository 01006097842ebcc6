//! The concrete command set.
//!
//! Every mutation of the editor state in production goes through one of
//! these (or a [`GroupCommand`](mapdoc_history::GroupCommand) of them).
//! Each command captures what it needs for undo during execute, and never
//! mutates anything before its last fallible check.

use std::sync::Arc;

use mapdoc_breakout::{ItemRef, SectionPath};
use mapdoc_collection::Anchor;
use mapdoc_error::{MapdocError, Result};
use mapdoc_history::Command;
use mapdoc_types::{Directive, DirectiveSink, Field, FieldValue, Record, RecordId};

use crate::{EditorState, RecordFactory};

// ---------------------------------------------------------------------------
// InsertRecords
// ---------------------------------------------------------------------------

/// Insert pre-built records as a contiguous run after an anchor.
pub struct InsertRecords {
    anchor: Anchor,
    ids: Vec<RecordId>,
    stash: Option<Vec<Record>>,
}

impl InsertRecords {
    /// Insert `records` (in argument order) after `anchor`.
    #[must_use]
    pub fn new(records: Vec<Record>, anchor: Anchor) -> Self {
        let ids = records.iter().map(Record::id).collect();
        Self { anchor, ids, stash: Some(records) }
    }

    /// Ids of the records this command inserts.
    #[must_use]
    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }
}

impl Command<EditorState> for InsertRecords {
    fn execute(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        if self.ids.is_empty() {
            return Ok(());
        }
        // Check the anchor before consuming the stash so a failed execute
        // leaves the command replayable.
        if let Anchor::After(a) = self.anchor {
            if !cx.collection.contains(a) {
                return Err(MapdocError::DanglingAnchor { id: a.raw() });
            }
        }
        let records = self
            .stash
            .take()
            .ok_or_else(|| MapdocError::internal("insert command has nothing to apply"))?;
        cx.collection.insert_after(records, self.anchor)?;
        sink.issue(Directive::RECORD | Directive::RENDER | Directive::AUTOSAVE);
        for &id in &self.ids {
            sink.reindex(id);
        }
        Ok(())
    }

    fn undo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        if self.ids.is_empty() {
            return Ok(());
        }
        let removed = cx.collection.remove(&self.ids);
        self.stash = Some(removed);
        sink.issue(Directive::RENDER | Directive::AUTOSAVE);
        for &id in &self.ids {
            sink.reindex(id);
        }
        Ok(())
    }

    fn label(&self) -> &str {
        "insert-records"
    }
}

// ---------------------------------------------------------------------------
// CreateRecords
// ---------------------------------------------------------------------------

/// Create records through the collaborator factory, then insert them.
///
/// The factory runs before any mutation, so a collaborator rejection leaves
/// the collection untouched. The created records (and their ids) are cached
/// across undo/redo — replay reuses them rather than re-invoking the
/// factory.
pub struct CreateRecords {
    factory: Arc<dyn RecordFactory>,
    params: Vec<Vec<Field>>,
    anchor: Anchor,
    ids: Vec<RecordId>,
    stash: Option<Vec<Record>>,
}

impl CreateRecords {
    /// Create one record per parameter set, inserted after `anchor`.
    #[must_use]
    pub fn new(factory: Arc<dyn RecordFactory>, params: Vec<Vec<Field>>, anchor: Anchor) -> Self {
        Self { factory, params, anchor, ids: Vec::new(), stash: None }
    }

    /// Ids of the created records (empty until first execute).
    #[must_use]
    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }
}

impl Command<EditorState> for CreateRecords {
    fn execute(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        if self.params.is_empty() {
            return Ok(());
        }
        if let Anchor::After(a) = self.anchor {
            if !cx.collection.contains(a) {
                return Err(MapdocError::DanglingAnchor { id: a.raw() });
            }
        }
        let records = match self.stash.take() {
            Some(cached) => cached,
            None => {
                let mut out = Vec::with_capacity(self.params.len());
                for params in &self.params {
                    out.push(self.factory.create(params.clone(), None)?);
                }
                self.ids = out.iter().map(Record::id).collect();
                out
            }
        };
        cx.collection.insert_after(records, self.anchor)?;
        sink.issue(Directive::RECORD | Directive::RENDER | Directive::AUTOSAVE);
        for &id in &self.ids {
            sink.reindex(id);
        }
        Ok(())
    }

    fn undo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        let removed = cx.collection.remove(&self.ids);
        self.stash = Some(removed);
        sink.issue(Directive::RENDER | Directive::AUTOSAVE);
        for &id in &self.ids {
            sink.reindex(id);
        }
        Ok(())
    }

    fn label(&self) -> &str {
        "create-records"
    }
}

// ---------------------------------------------------------------------------
// RemoveRecords
// ---------------------------------------------------------------------------

/// Remove records by id set. Unknown ids are tolerated (skipped).
pub struct RemoveRecords {
    ids: Vec<RecordId>,
    /// Removal sequence with each record's pre-removal anchor; undo replays
    /// it in reverse.
    removed: Vec<(Record, Anchor)>,
}

impl RemoveRecords {
    /// Remove the named records.
    #[must_use]
    pub fn new(ids: Vec<RecordId>) -> Self {
        Self { ids, removed: Vec::new() }
    }
}

impl Command<EditorState> for RemoveRecords {
    fn execute(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        self.removed.clear();
        let targets: Vec<RecordId> = cx
            .collection
            .order()
            .iter()
            .copied()
            .filter(|id| self.ids.contains(id))
            .collect();
        for id in targets {
            let Some(anchor) = cx.collection.anchor_of(id) else {
                continue;
            };
            if let Some(record) = cx.collection.remove(&[id]).pop() {
                sink.reindex(id);
                self.removed.push((record, anchor));
            }
        }
        if !self.removed.is_empty() {
            sink.issue(Directive::RECORD | Directive::RENDER | Directive::AUTOSAVE);
        }
        Ok(())
    }

    fn undo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        for (record, anchor) in self.removed.drain(..).rev() {
            let id = record.id();
            cx.collection.insert_after(vec![record], anchor)?;
            sink.reindex(id);
        }
        sink.issue(Directive::RENDER | Directive::AUTOSAVE);
        Ok(())
    }

    fn label(&self) -> &str {
        "remove-records"
    }
}

// ---------------------------------------------------------------------------
// MoveRecord
// ---------------------------------------------------------------------------

/// Move one record to a new anchor-relative position.
pub struct MoveRecord {
    id: RecordId,
    to: Anchor,
    from: Option<Anchor>,
}

impl MoveRecord {
    /// Move `id` to sit immediately after `to` (or at the head).
    #[must_use]
    pub fn new(id: RecordId, to: Anchor) -> Self {
        Self { id, to, from: None }
    }
}

impl Command<EditorState> for MoveRecord {
    fn execute(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        if !cx.collection.contains(self.id) {
            return Err(MapdocError::Detached { id: self.id.raw() });
        }
        if let Anchor::After(a) = self.to {
            if a == self.id {
                // Moving after itself: identity, nothing to record.
                return Ok(());
            }
            if !cx.collection.contains(a) {
                return Err(MapdocError::DanglingAnchor { id: a.raw() });
            }
        }
        let from = cx
            .collection
            .anchor_of(self.id)
            .ok_or(MapdocError::Detached { id: self.id.raw() })?;
        let Some(record) = cx.collection.remove(&[self.id]).pop() else {
            return Err(MapdocError::internal("move target vanished mid-command"));
        };
        cx.collection.insert_after(vec![record], self.to)?;
        self.from = Some(from);
        sink.issue(Directive::RECORD | Directive::RENDER | Directive::AUTOSAVE);
        sink.reindex(self.id);
        Ok(())
    }

    fn undo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        let Some(from) = self.from.take() else {
            return Ok(()); // execute was the identity move
        };
        let Some(record) = cx.collection.remove(&[self.id]).pop() else {
            return Err(MapdocError::Detached { id: self.id.raw() });
        };
        cx.collection.insert_after(vec![record], from)?;
        sink.issue(Directive::RENDER | Directive::AUTOSAVE);
        sink.reindex(self.id);
        Ok(())
    }

    fn label(&self) -> &str {
        "move-record"
    }
}

// ---------------------------------------------------------------------------
// SetField
// ---------------------------------------------------------------------------

/// Set one field on one record, undoably.
pub struct SetField {
    id: RecordId,
    field: String,
    value: FieldValue,
    previous: Option<Option<FieldValue>>,
}

impl SetField {
    /// Set `field` on record `id` to `value`.
    #[must_use]
    pub fn new(id: RecordId, field: impl Into<String>, value: FieldValue) -> Self {
        Self { id, field: field.into(), value, previous: None }
    }
}

impl Command<EditorState> for SetField {
    fn execute(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        let record = cx
            .collection
            .get_mut(self.id)
            .ok_or(MapdocError::Detached { id: self.id.raw() })?;
        self.previous = Some(record.set_field(&self.field, self.value.clone()));
        sink.issue(Directive::RECORD | Directive::RENDER | Directive::AUTOSAVE);
        sink.reindex(self.id);
        Ok(())
    }

    fn undo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        let previous = self
            .previous
            .take()
            .ok_or_else(|| MapdocError::internal("set-field undo without execute"))?;
        let record = cx
            .collection
            .get_mut(self.id)
            .ok_or(MapdocError::Detached { id: self.id.raw() })?;
        match previous {
            Some(value) => {
                record.set_field(&self.field, value);
            }
            None => {
                record.remove_field(&self.field);
            }
        }
        sink.issue(Directive::RENDER | Directive::AUTOSAVE);
        sink.reindex(self.id);
        Ok(())
    }

    fn label(&self) -> &str {
        "set-field"
    }
}

// ---------------------------------------------------------------------------
// SetSelected
// ---------------------------------------------------------------------------

/// What a selection command does in each history phase.
///
/// `None` in a phase means "restore what execute captured" for undo, and
/// "reuse the execute path" for redo. One configuration structure replaces
/// a family of overloaded constructors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionPhases {
    /// Selection state applied on execute (`None`: leave items untouched).
    pub on_execute: Option<bool>,
    /// Selection state applied on undo (`None`: restore captured state).
    pub on_undo: Option<bool>,
    /// Selection state applied on redo (`None`: re-run the execute path).
    pub on_redo: Option<bool>,
}

/// Set selection state on a set of projection items.
pub struct SetSelected {
    items: Vec<ItemRef>,
    phases: SelectionPhases,
    previous: Vec<bool>,
}

impl SetSelected {
    /// Select (or deselect, per `phases`) the given items.
    #[must_use]
    pub fn new(items: Vec<ItemRef>, phases: SelectionPhases) -> Self {
        Self { items, phases, previous: Vec::new() }
    }

    /// The common case: select on execute, restore on undo.
    #[must_use]
    pub fn select(items: Vec<ItemRef>) -> Self {
        Self::new(
            items,
            SelectionPhases { on_execute: Some(true), ..SelectionPhases::default() },
        )
    }
}

impl Command<EditorState> for SetSelected {
    fn execute(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        self.previous = self
            .items
            .iter()
            .map(|item| cx.projection.is_selected(item))
            .collect();
        if let Some(selected) = self.phases.on_execute {
            for item in &self.items {
                cx.projection.set_selected(item, selected);
            }
        }
        sink.issue(Directive::RECORD | Directive::RENDER);
        Ok(())
    }

    fn undo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        match self.phases.on_undo {
            Some(selected) => {
                for item in &self.items {
                    cx.projection.set_selected(item, selected);
                }
            }
            None => {
                for (item, &was) in self.items.iter().zip(&self.previous) {
                    cx.projection.set_selected(item, was);
                }
            }
        }
        sink.issue(Directive::RENDER);
        Ok(())
    }

    // Selection commands are the one family with a genuinely distinct redo.
    fn redo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        match self.phases.on_redo {
            Some(selected) => {
                for item in &self.items {
                    cx.projection.set_selected(item, selected);
                }
                sink.issue(Directive::RENDER);
                Ok(())
            }
            None => self.execute(cx, sink),
        }
    }

    fn label(&self) -> &str {
        "set-selected"
    }
}

// ---------------------------------------------------------------------------
// SetCollapsed
// ---------------------------------------------------------------------------

/// Collapse or expand a set of sections.
pub struct SetCollapsed {
    paths: Vec<SectionPath>,
    collapsed: bool,
    previous: Vec<bool>,
}

impl SetCollapsed {
    /// Set the collapsed flag on every listed section path.
    #[must_use]
    pub fn new(paths: Vec<SectionPath>, collapsed: bool) -> Self {
        Self { paths, collapsed, previous: Vec::new() }
    }
}

impl Command<EditorState> for SetCollapsed {
    fn execute(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        self.previous = self
            .paths
            .iter()
            .map(|path| cx.projection.set_collapsed(path, self.collapsed))
            .collect();
        sink.issue(Directive::RECORD | Directive::RENDER);
        Ok(())
    }

    fn undo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        for (path, &was) in self.paths.iter().zip(&self.previous) {
            cx.projection.set_collapsed(path, was);
        }
        sink.issue(Directive::RENDER);
        Ok(())
    }

    fn label(&self) -> &str {
        "set-collapsed"
    }
}

// ---------------------------------------------------------------------------
// Breakout commands
// ---------------------------------------------------------------------------

/// Enable or disable one breakout control.
pub struct SetBreakoutEnabled {
    field: String,
    enabled: bool,
    previous: Option<bool>,
}

impl SetBreakoutEnabled {
    /// Toggle the control for `field` to `enabled`.
    #[must_use]
    pub fn new(field: impl Into<String>, enabled: bool) -> Self {
        Self { field: field.into(), enabled, previous: None }
    }
}

impl Command<EditorState> for SetBreakoutEnabled {
    fn execute(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        let previous = cx.controls.set_enabled(&self.field, self.enabled)?;
        self.previous = Some(previous);
        sink.issue(
            Directive::RECORD
                | Directive::RENDER
                | Directive::AUTOSAVE
                | Directive::REBUILD_BREAKOUTS,
        );
        Ok(())
    }

    fn undo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        let previous = self
            .previous
            .take()
            .ok_or_else(|| MapdocError::internal("breakout undo without execute"))?;
        cx.controls.set_enabled(&self.field, previous)?;
        sink.issue(Directive::RENDER | Directive::AUTOSAVE | Directive::REBUILD_BREAKOUTS);
        Ok(())
    }

    fn label(&self) -> &str {
        "set-breakout-enabled"
    }
}

/// Reorder one breakout control, changing projection nesting on rebuild.
pub struct MoveBreakoutControl {
    field: String,
    to: usize,
    from: Option<usize>,
}

impl MoveBreakoutControl {
    /// Move the control for `field` to position `to`.
    #[must_use]
    pub fn new(field: impl Into<String>, to: usize) -> Self {
        Self { field: field.into(), to, from: None }
    }
}

impl Command<EditorState> for MoveBreakoutControl {
    fn execute(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        let from = cx.controls.move_to(&self.field, self.to)?;
        self.from = Some(from);
        sink.issue(
            Directive::RECORD
                | Directive::RENDER
                | Directive::AUTOSAVE
                | Directive::REBUILD_BREAKOUTS,
        );
        Ok(())
    }

    fn undo(&mut self, cx: &mut EditorState, sink: &mut DirectiveSink) -> Result<()> {
        let from = self
            .from
            .take()
            .ok_or_else(|| MapdocError::internal("breakout move undo without execute"))?;
        cx.controls.move_to(&self.field, from)?;
        sink.issue(Directive::RENDER | Directive::AUTOSAVE | Directive::REBUILD_BREAKOUTS);
        Ok(())
    }

    fn label(&self) -> &str {
        "move-breakout-control"
    }
}
