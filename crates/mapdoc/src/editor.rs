//! The editor: history stack plus directive dispatch over one document's
//! state.

use tracing::debug;

use mapdoc_breakout::SectionPath;
use mapdoc_error::Result;
use mapdoc_history::{Command, GroupCommand, HistoryStack};
use mapdoc_types::{Directive, DirectiveBatch, DirectiveSink};

use crate::EditorState;

/// Owns the editor state and its undo history, and keeps the projection
/// consistent by reacting to the structural directives (`REINDEX`,
/// `REBUILD_BREAKOUTS`) itself. `RENDER` and `AUTOSAVE` stay advisory and
/// are returned to the host in every batch.
///
/// Command dispatch is serialized by construction: every mutation funnels
/// through `&mut self`, so at most one command is in flight per document.
#[derive(Default)]
pub struct Editor {
    state: EditorState,
    history: HistoryStack<EditorState>,
}

impl Editor {
    /// An editor over a fresh, empty document state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An editor whose history keeps at most `depth` recorded commands.
    #[must_use]
    pub fn with_history_depth(depth: usize) -> Self {
        Self { state: EditorState::new(), history: HistoryStack::with_depth(depth) }
    }

    /// Read access to the document state.
    #[must_use]
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Direct mutable access to the document state.
    ///
    /// Edits through this path bypass the undo history entirely; callers
    /// accept that per edit (and should follow structural changes with
    /// [`Self::rebuild_projection`]).
    pub fn state_mut(&mut self) -> &mut EditorState {
        &mut self.state
    }

    /// Number of undoable commands.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    /// Number of redoable commands.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    /// Execute a command, record it if it asks to be, and dispatch its
    /// structural directives.
    pub fn perform(
        &mut self,
        command: impl Command<EditorState> + 'static,
    ) -> Result<DirectiveBatch> {
        let batch = self.history.perform(command, &mut self.state)?;
        self.dispatch(&batch);
        Ok(batch)
    }

    /// Undo the most recent recorded command.
    pub fn undo(&mut self) -> Result<DirectiveBatch> {
        let batch = self.history.undo(&mut self.state)?;
        self.dispatch(&batch);
        Ok(batch)
    }

    /// Redo the most recently undone command.
    pub fn redo(&mut self) -> Result<DirectiveBatch> {
        let batch = self.history.redo(&mut self.state)?;
        self.dispatch(&batch);
        Ok(batch)
    }

    /// Build and record a group whose children need each other's output.
    ///
    /// The closure assembles the group with
    /// [`GroupCommand::execute_and_add`], so children run during assembly.
    /// If the closure fails, whatever the group already applied is undone
    /// before the error propagates; on success the pre-applied group is
    /// recorded without re-executing.
    pub fn perform_group<F>(&mut self, label: &str, build: F) -> Result<DirectiveBatch>
    where
        F: FnOnce(
            &mut GroupCommand<EditorState>,
            &mut EditorState,
            &mut DirectiveSink,
        ) -> Result<()>,
    {
        let mut group = GroupCommand::new(label);
        let mut sink = DirectiveSink::new();
        if let Err(err) = build(&mut group, &mut self.state, &mut sink) {
            debug!(group = label, %err, "group assembly failed, rolling back");
            let mut scrap = DirectiveSink::new();
            group.undo(&mut self.state, &mut scrap)?;
            return Err(err);
        }
        let batch = sink.finish();
        self.history.note_performed(group, &batch);
        self.dispatch(&batch);
        Ok(batch)
    }

    /// Explicit full projection rebuild, carrying over display state for
    /// the given section paths.
    pub fn rebuild_projection(&mut self, carry_over: &[SectionPath]) {
        let EditorState { collection, controls, projection } = &mut self.state;
        projection.rebuild(collection, controls, carry_over);
    }

    fn dispatch(&mut self, batch: &DirectiveBatch) {
        if batch.flags.contains(Directive::REBUILD_BREAKOUTS) {
            self.rebuild_projection(&[]);
        } else if batch.flags.contains(Directive::REINDEX) {
            let EditorState { collection, projection, .. } = &mut self.state;
            for &id in &batch.reindex_ids {
                projection.reindex(id, collection);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{InsertRecords, RemoveRecords, SetBreakoutEnabled, SetField};
    use mapdoc_collection::Anchor;
    use mapdoc_types::{Field, FieldValue, Record, RecordId};

    fn status_record(v: &str) -> Record {
        Record::new(vec![Field {
            key: "status".into(),
            value: FieldValue::Select(Some(v.into())),
        }])
    }

    fn assert_projection_synced(editor: &Editor) {
        let mut leaves = editor.state().projection.leaf_ids();
        leaves.sort_unstable();
        let mut members = editor.state().collection.order().to_vec();
        members.sort_unstable();
        assert_eq!(leaves, members);
    }

    #[test]
    fn test_perform_dispatches_scoped_reindex() {
        let mut editor = Editor::new();
        editor.state_mut().controls.register("status");
        editor.perform(SetBreakoutEnabled::new("status", true)).unwrap();

        let record = status_record("new");
        editor.perform(InsertRecords::new(vec![record], Anchor::Head)).unwrap();
        assert_projection_synced(&editor);
        assert_eq!(editor.state().projection.sections().len(), 1);
    }

    #[test]
    fn test_undo_redo_keep_projection_synced() {
        let mut editor = Editor::new();
        editor.state_mut().controls.register("status");
        editor.perform(SetBreakoutEnabled::new("status", true)).unwrap();

        let record = status_record("new");
        let id = record.id();
        editor.perform(InsertRecords::new(vec![record], Anchor::Head)).unwrap();
        editor.perform(RemoveRecords::new(vec![id])).unwrap();
        assert_projection_synced(&editor);

        editor.undo().unwrap(); // remove undone
        assert_projection_synced(&editor);
        editor.undo().unwrap(); // insert undone
        assert_projection_synced(&editor);
        editor.redo().unwrap();
        assert_projection_synced(&editor);
    }

    #[test]
    fn test_group_assembly_failure_rolls_back() {
        let mut editor = Editor::new();
        let record = status_record("new");
        let id = record.id();

        let ghost = RecordId::mint();
        let result = editor.perform_group("insert-then-edit", |group, cx, sink| {
            group.execute_and_add(InsertRecords::new(vec![record], Anchor::Head), cx, sink)?;
            // Editing a record that does not exist fails the group.
            group.execute_and_add(
                SetField::new(ghost, "status", FieldValue::Select(None)),
                cx,
                sink,
            )
        });

        assert!(result.is_err());
        assert!(!editor.state().collection.contains(id));
        assert_eq!(editor.undo_depth(), 0);
    }

    #[test]
    fn test_group_records_once_and_undoes_as_a_unit() {
        let mut editor = Editor::new();
        let (r1, r2) = (status_record("a"), status_record("b"));
        let (id1, id2) = (r1.id(), r2.id());

        editor
            .perform_group("insert-two", |group, cx, sink| {
                group.execute_and_add(InsertRecords::new(vec![r1], Anchor::Head), cx, sink)?;
                group.execute_and_add(
                    InsertRecords::new(vec![r2], Anchor::After(id1)),
                    cx,
                    sink,
                )
            })
            .unwrap();

        assert_eq!(editor.state().collection.order(), [id1, id2]);
        assert_eq!(editor.undo_depth(), 1);

        editor.undo().unwrap();
        assert!(editor.state().collection.is_empty());
        editor.redo().unwrap();
        assert_eq!(editor.state().collection.order(), [id1, id2]);
    }
}
