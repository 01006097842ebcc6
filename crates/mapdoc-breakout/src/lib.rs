//! Breakout controls and the derived view projection.
//!
//! The projection is a read-only derivation over a record collection: it
//! groups records into nested, collapsible, selectable sections keyed by
//! record fields, and never mutates the underlying data. The grouping
//! configuration (which fields, in which nesting order) lives in
//! [`BreakoutControls`]; the derived forest lives in [`ProjectionTree`].

mod controls;
mod tree;

pub use controls::{BreakoutControls, BreakoutEntry};
pub use tree::{ItemRef, ProjectionTree, Section, SectionKey, SectionPath};
