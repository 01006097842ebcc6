//! Atomic composition of commands.

use tracing::{debug, error};

use mapdoc_error::Result;
use mapdoc_types::DirectiveSink;

use crate::Command;

/// An ordered list of child commands executed as one atomic unit.
///
/// If any child's `execute` fails, every previously-executed child is undone
/// in reverse order before the original error propagates; a partially
/// applied group is never observable. An empty group is legal and does
/// nothing.
pub struct GroupCommand<Ctx> {
    children: Vec<Box<dyn Command<Ctx>>>,
    label: String,
}

impl<Ctx> GroupCommand<Ctx> {
    /// An empty group with the given history label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self { children: Vec::new(), label: label.into() }
    }

    /// Append a child to run after all current children.
    pub fn add(&mut self, child: impl Command<Ctx> + 'static) {
        self.children.push(Box::new(child));
    }

    /// Execute `child` immediately, then append it.
    ///
    /// This is the construction pattern for groups whose later children need
    /// the output of earlier ones (a created record's id, say): the group is
    /// built by executing children as they are added, and the finished group
    /// is handed to the history already applied. On failure the child is not
    /// retained and previously-added children are rolled back.
    pub fn execute_and_add(
        &mut self,
        mut child: impl Command<Ctx> + 'static,
        cx: &mut Ctx,
        sink: &mut DirectiveSink,
    ) -> Result<()> {
        if let Err(err) = child.execute(cx, sink) {
            self.rollback(self.children.len(), cx, sink);
            self.children.clear();
            return Err(err);
        }
        self.children.push(Box::new(child));
        Ok(())
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the group has no children (acts as do-nothing).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Undo children `0..upto` in reverse order.
    ///
    /// A child `undo` failing during rollback is a contract violation (undo
    /// must not fail under normal conditions); it is logged and the rollback
    /// continues so as much state as possible is restored.
    fn rollback(&mut self, upto: usize, cx: &mut Ctx, sink: &mut DirectiveSink) {
        for child in self.children[..upto].iter_mut().rev() {
            if let Err(err) = child.undo(cx, sink) {
                error!(
                    group = self.label,
                    child = child.label(),
                    %err,
                    "undo failed during group rollback (contract violation)"
                );
            }
        }
    }
}

impl<Ctx> Command<Ctx> for GroupCommand<Ctx> {
    fn execute(&mut self, cx: &mut Ctx, sink: &mut DirectiveSink) -> Result<()> {
        for i in 0..self.children.len() {
            if let Err(err) = self.children[i].execute(cx, sink) {
                debug!(
                    group = self.label,
                    failed_child = self.children[i].label(),
                    applied = i,
                    "group execute failed, rolling back"
                );
                self.rollback(i, cx, sink);
                return Err(err);
            }
        }
        Ok(())
    }

    fn undo(&mut self, cx: &mut Ctx, sink: &mut DirectiveSink) -> Result<()> {
        for child in self.children.iter_mut().rev() {
            child.undo(cx, sink)?;
        }
        Ok(())
    }

    fn redo(&mut self, cx: &mut Ctx, sink: &mut DirectiveSink) -> Result<()> {
        for i in 0..self.children.len() {
            if let Err(err) = self.children[i].redo(cx, sink) {
                self.rollback(i, cx, sink);
                return Err(err);
            }
        }
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapdoc_error::MapdocError;
    use mapdoc_types::Directive;

    /// Test context: a log of applied step ids.
    #[derive(Default)]
    struct Log(Vec<i32>);

    struct Step {
        id: i32,
        fail: bool,
    }

    impl Command<Log> for Step {
        fn execute(&mut self, cx: &mut Log, sink: &mut DirectiveSink) -> Result<()> {
            if self.fail {
                return Err(MapdocError::internal("step refused"));
            }
            cx.0.push(self.id);
            sink.issue(Directive::RECORD);
            Ok(())
        }

        fn undo(&mut self, cx: &mut Log, _sink: &mut DirectiveSink) -> Result<()> {
            assert_eq!(cx.0.pop(), Some(self.id), "undo out of order");
            Ok(())
        }

        fn label(&self) -> &str {
            "step"
        }
    }

    // === Group atomicity: third child fails, state equals pre-execute ===
    #[test]
    fn test_failing_child_rolls_back_earlier_children() {
        let mut group = GroupCommand::new("g");
        group.add(Step { id: 1, fail: false });
        group.add(Step { id: 2, fail: false });
        group.add(Step { id: 3, fail: true });

        let mut log = Log::default();
        let mut sink = DirectiveSink::new();
        assert!(group.execute(&mut log, &mut sink).is_err());
        assert!(log.0.is_empty());
    }

    #[test]
    fn test_execute_then_undo_reverses_in_order() {
        let mut group = GroupCommand::new("g");
        group.add(Step { id: 1, fail: false });
        group.add(Step { id: 2, fail: false });

        let mut log = Log::default();
        let mut sink = DirectiveSink::new();
        group.execute(&mut log, &mut sink).unwrap();
        assert_eq!(log.0, [1, 2]);
        group.undo(&mut log, &mut sink).unwrap();
        assert!(log.0.is_empty());
    }

    #[test]
    fn test_empty_group_is_do_nothing() {
        let mut group: GroupCommand<Log> = GroupCommand::new("empty");
        assert!(group.is_empty());
        let mut log = Log::default();
        let mut sink = DirectiveSink::new();
        group.execute(&mut log, &mut sink).unwrap();
        group.undo(&mut log, &mut sink).unwrap();
        assert!(log.0.is_empty());
    }

    #[test]
    fn test_execute_and_add_applies_immediately() {
        let mut group = GroupCommand::new("g");
        let mut log = Log::default();
        let mut sink = DirectiveSink::new();
        group
            .execute_and_add(Step { id: 1, fail: false }, &mut log, &mut sink)
            .unwrap();
        assert_eq!(log.0, [1]);
        // A failing addition rolls back what the group already applied.
        assert!(group
            .execute_and_add(Step { id: 2, fail: true }, &mut log, &mut sink)
            .is_err());
        assert!(log.0.is_empty());
        assert!(group.is_empty());
    }

    #[test]
    fn test_directives_accumulate_across_children() {
        let mut group = GroupCommand::new("g");
        group.add(Step { id: 1, fail: false });
        group.add(Step { id: 2, fail: false });
        let mut log = Log::default();
        let mut sink = DirectiveSink::new();
        group.execute(&mut log, &mut sink).unwrap();
        assert!(sink.flags().contains(Directive::RECORD));
    }
}
