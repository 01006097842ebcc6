//! The command context: everything a command is allowed to mutate.

use mapdoc_breakout::{BreakoutControls, ProjectionTree};
use mapdoc_collection::RecordCollection;

/// The mutable state of one open document.
///
/// Commands receive `&mut EditorState`; the projection inside it is still a
/// pure derivation of the collection — commands touch its display state
/// (selection, collapse) but structural updates happen only through the
/// directive dispatch in [`crate::Editor`].
#[derive(Debug, Default)]
pub struct EditorState {
    /// The ordered record collection.
    pub collection: RecordCollection,
    /// Grouping configuration for the projection.
    pub controls: BreakoutControls,
    /// The derived display tree.
    pub projection: ProjectionTree,
}

impl EditorState {
    /// Empty state for a fresh document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
