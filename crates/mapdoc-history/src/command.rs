//! The `Command` contract.

use mapdoc_error::Result;
use mapdoc_types::DirectiveSink;

/// A self-contained, reversible unit of change against a context `Ctx`.
///
/// Contract:
///
/// - `undo` after `execute` restores the context to equivalence with the
///   pre-execute state (identifiers intentionally regenerated excepted).
/// - A failing `execute` must leave the context untouched: either mutate
///   nothing before the failure point, or roll back what was already done
///   (see [`crate::GroupCommand`]).
/// - Directives are written into the sink during a phase and observed by
///   the host only after the phase completes; commands never call their
///   consumers directly.
///
/// `redo` defaults to re-running `execute`. A command type overrides it only
/// when replay genuinely differs from first execution (selection commands
/// that restore a captured selection rather than recompute one, for
/// example) — a distinct redo is an optional capability, not a requirement.
pub trait Command<Ctx> {
    /// Apply the change.
    fn execute(&mut self, cx: &mut Ctx, sink: &mut DirectiveSink) -> Result<()>;

    /// Reverse the change.
    fn undo(&mut self, cx: &mut Ctx, sink: &mut DirectiveSink) -> Result<()>;

    /// Replay the change after an undo.
    fn redo(&mut self, cx: &mut Ctx, sink: &mut DirectiveSink) -> Result<()> {
        self.execute(cx, sink)
    }

    /// Short name used in history logging.
    fn label(&self) -> &str {
        "command"
    }
}

impl<Ctx> Command<Ctx> for Box<dyn Command<Ctx>> {
    fn execute(&mut self, cx: &mut Ctx, sink: &mut DirectiveSink) -> Result<()> {
        (**self).execute(cx, sink)
    }

    fn undo(&mut self, cx: &mut Ctx, sink: &mut DirectiveSink) -> Result<()> {
        (**self).undo(cx, sink)
    }

    fn redo(&mut self, cx: &mut Ctx, sink: &mut DirectiveSink) -> Result<()> {
        (**self).redo(cx, sink)
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}
