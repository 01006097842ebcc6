//! The bounded undo/redo history.

use tracing::{debug, info};

use mapdoc_error::Result;
use mapdoc_types::{DirectiveBatch, DirectiveSink};

use crate::Command;

/// Default maximum number of recorded commands.
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Bounded undo and redo stacks over boxed commands.
///
/// The stack is the sole authority on what is undoable: a performed command
/// is recorded only if its directive batch carries `RECORD`. Unrecorded
/// commands are applied but leave both stacks untouched (including the redo
/// buffer).
pub struct HistoryStack<Ctx> {
    history: Vec<Box<dyn Command<Ctx>>>,
    redo_buffer: Vec<Box<dyn Command<Ctx>>>,
    max_depth: usize,
}

impl<Ctx> Default for HistoryStack<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> HistoryStack<Ctx> {
    /// A history with the default depth bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_HISTORY_DEPTH)
    }

    /// A history bounded to `max_depth` recorded commands; the oldest entry
    /// is dropped on overflow.
    #[must_use]
    pub fn with_depth(max_depth: usize) -> Self {
        Self { history: Vec::new(), redo_buffer: Vec::new(), max_depth }
    }

    /// Number of undoable commands.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    /// Number of redoable commands.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_buffer.len()
    }

    /// Execute `command` against `cx` and record it if it asks to be.
    ///
    /// On failure the context is untouched (the command contract, enforced
    /// transitively by group rollback) and neither stack changes.
    pub fn perform(
        &mut self,
        mut command: impl Command<Ctx> + 'static,
        cx: &mut Ctx,
    ) -> Result<DirectiveBatch> {
        let mut sink = DirectiveSink::new();
        command.execute(cx, &mut sink)?;
        let batch = sink.finish();
        if batch.wants_record() {
            info!(command = command.label(), "recorded command");
            self.redo_buffer.clear();
            if self.history.len() == self.max_depth {
                self.history.remove(0);
            }
            self.history.push(Box::new(command));
        } else {
            debug!(command = command.label(), "applied unrecorded command");
        }
        Ok(batch)
    }

    /// Record an already-applied command without executing it.
    ///
    /// Used with the execute-as-you-add group construction: the group's
    /// children ran during assembly, so performing it again would double
    /// apply. `batch` is the directive batch accumulated during assembly;
    /// recording still requires `RECORD` in it.
    pub fn note_performed(
        &mut self,
        command: impl Command<Ctx> + 'static,
        batch: &DirectiveBatch,
    ) {
        if batch.wants_record() {
            info!(command = command.label(), "recorded pre-applied command");
            self.redo_buffer.clear();
            if self.history.len() == self.max_depth {
                self.history.remove(0);
            }
            self.history.push(Box::new(command));
        }
    }

    /// Undo the most recent recorded command. No-op on an empty history.
    pub fn undo(&mut self, cx: &mut Ctx) -> Result<DirectiveBatch> {
        let Some(mut command) = self.history.pop() else {
            return Ok(DirectiveBatch::default());
        };
        let mut sink = DirectiveSink::new();
        match command.undo(cx, &mut sink) {
            Ok(()) => {
                debug!(command = command.label(), "undid command");
                self.redo_buffer.push(command);
                Ok(sink.finish())
            }
            Err(err) => {
                // Contract violation; the entry is not pushed back because
                // its state is now unknown.
                Err(err)
            }
        }
    }

    /// Re-apply the most recently undone command. No-op on an empty buffer.
    ///
    /// Redo replays via the command's `redo` phase, which for most commands
    /// is plain re-execution.
    pub fn redo(&mut self, cx: &mut Ctx) -> Result<DirectiveBatch> {
        let Some(mut command) = self.redo_buffer.pop() else {
            return Ok(DirectiveBatch::default());
        };
        let mut sink = DirectiveSink::new();
        match command.redo(cx, &mut sink) {
            Ok(()) => {
                debug!(command = command.label(), "redid command");
                self.history.push(command);
                Ok(sink.finish())
            }
            Err(err) => Err(err),
        }
    }

    /// Drop both stacks (document swap).
    pub fn clear(&mut self) {
        self.history.clear();
        self.redo_buffer.clear();
    }
}
