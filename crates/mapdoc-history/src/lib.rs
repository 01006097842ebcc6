//! The command protocol and the undo/redo engine.
//!
//! The engine is generic over a context type `Ctx` (the editor state it
//! mutates) so it carries no dependency on the collection or projection
//! crates; concrete commands live next to the state they edit.

mod command;
mod group;
mod stack;

pub use command::Command;
pub use group::GroupCommand;
pub use stack::{HistoryStack, DEFAULT_HISTORY_DEPTH};
