//! Breakout controls: the ordered grouping configuration.
//!
//! Modeled as an explicit ordered sequence of `(field, enabled)` entries
//! with `move_to(field, index)` — never as a map whose iteration order
//! carries meaning.

use serde::{Deserialize, Serialize};
use tracing::debug;

use mapdoc_error::{MapdocError, Result};

/// One configured grouping control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakoutEntry {
    /// The record field this control groups by.
    pub field: String,
    /// Whether the control participates in the projection.
    pub enabled: bool,
    /// Valid values for the field as `(value, display label)` pairs,
    /// supplied by the taxonomy source. Used for option lists and section
    /// labels only; section ordering is first-seen during the rebuild walk.
    pub options: Vec<(String, String)>,
}

/// The ordered list of breakout controls for one document.
///
/// Entry order is nesting order: the first enabled control produces the
/// outermost sections. Reordering takes effect on the next rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakoutControls {
    entries: Vec<BreakoutEntry>,
}

impl BreakoutControls {
    /// An empty control list (projection degenerates to a flat leaf list).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in configured order.
    #[must_use]
    pub fn entries(&self) -> &[BreakoutEntry] {
        &self.entries
    }

    /// Append a control for `field`, initially disabled, if not present.
    pub fn register(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.entries.iter().any(|e| e.field == field) {
            self.entries.push(BreakoutEntry { field, enabled: false, options: Vec::new() });
        }
    }

    /// Replace the option list for `field`.
    pub fn set_options(&mut self, field: &str, options: Vec<(String, String)>) -> Result<()> {
        let entry = self.entry_mut(field)?;
        entry.options = options;
        Ok(())
    }

    /// Enable or disable the control for `field`.
    ///
    /// Returns the previous enabled state. Naming an unregistered field is
    /// an integrity error.
    pub fn set_enabled(&mut self, field: &str, enabled: bool) -> Result<bool> {
        let entry = self.entry_mut(field)?;
        let prev = entry.enabled;
        entry.enabled = enabled;
        debug!(field, enabled, "breakout control toggled");
        Ok(prev)
    }

    /// Move the control for `field` to `index` in the entry order,
    /// returning its previous index.
    pub fn move_to(&mut self, field: &str, index: usize) -> Result<usize> {
        let from = self
            .entries
            .iter()
            .position(|e| e.field == field)
            .ok_or_else(|| MapdocError::UnknownBreakout { field: field.to_owned() })?;
        if index >= self.entries.len() {
            return Err(MapdocError::BreakoutIndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let entry = self.entries.remove(from);
        self.entries.insert(index, entry);
        debug!(field, from, to = index, "breakout control moved");
        Ok(from)
    }

    /// The primary control: the first enabled entry in order, if any.
    #[must_use]
    pub fn primary(&self) -> Option<&BreakoutEntry> {
        self.entries.iter().find(|e| e.enabled)
    }

    /// Enabled field names in nesting order (outermost first).
    #[must_use]
    pub fn enabled_fields(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.field.as_str())
            .collect()
    }

    /// Display label for a field value, per the control's option list.
    ///
    /// Falls back to the raw value when the control or option is unknown;
    /// `None` is the explicit "No Value" bucket.
    #[must_use]
    pub fn value_label(&self, field: &str, value: Option<&str>) -> String {
        let Some(value) = value else {
            return "No Value".to_owned();
        };
        self.entries
            .iter()
            .find(|e| e.field == field)
            .and_then(|e| e.options.iter().find(|(v, _)| v == value))
            .map_or_else(|| value.to_owned(), |(_, label)| label.clone())
    }

    fn entry_mut(&mut self, field: &str) -> Result<&mut BreakoutEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.field == field)
            .ok_or_else(|| MapdocError::UnknownBreakout { field: field.to_owned() })
    }
}
