//! The derived projection tree.
//!
//! An ordered forest whose interior nodes are sections (one per distinct
//! grouping value, nesting in control order) and whose leaves are one-to-one
//! views of records. The tree owns nothing of the underlying data: it holds
//! record ids and derives structure on rebuild/reindex.
//!
//! Display state (collapse, selection, layout offsets) is transient and
//! keyed by section *path*, not by node address, so a section that is pruned
//! and recreated at the same path within one rebuild generation keeps its
//! user-set state. A full rebuild discards that memory except for paths the
//! caller explicitly carries over.

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

use mapdoc_collection::RecordCollection;
use mapdoc_types::{Record, RecordId};

use crate::BreakoutControls;

// ---------------------------------------------------------------------------
// Keys and paths
// ---------------------------------------------------------------------------

/// Identity of one section: the grouping field plus the grouped value
/// (`None` is the explicit "No Value" bucket).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionKey {
    /// The field this section level groups by.
    pub field: String,
    /// The grouped value; `None` collects records with the field absent or
    /// unset.
    pub value: Option<String>,
}

/// A section's position in the nesting: one key per enabled control,
/// outermost first.
pub type SectionPath = SmallVec<[SectionKey; 2]>;

/// A reference to one tree item, interior or leaf.
///
/// The closed variant set is the capability tag selection and traversal
/// match on — there is no runtime type inspection anywhere in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    /// An interior section node, identified by path.
    Section(SectionPath),
    /// A leaf, identified by the record it views.
    Leaf(RecordId),
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// One interior node. Either `subsections` or `leaves` is populated,
/// depending on whether this is the innermost grouping level.
#[derive(Debug, Clone, Default)]
pub struct Section {
    key_value: Option<String>,
    subsections: Vec<Section>,
    leaves: Vec<RecordId>,
}

impl Section {
    /// The grouped value for this section (`None` = "No Value").
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.key_value.as_deref()
    }

    /// Child sections in first-seen order.
    #[must_use]
    pub fn subsections(&self) -> &[Section] {
        &self.subsections
    }

    /// Leaf record ids in collection order.
    #[must_use]
    pub fn leaves(&self) -> &[RecordId] {
        &self.leaves
    }

    fn is_unpopulated(&self) -> bool {
        self.subsections.is_empty() && self.leaves.is_empty()
    }
}

/// Per-item transient display state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct NodeState {
    pub collapsed: bool,
    pub selected: bool,
    pub top: f32,
    pub height: f32,
}

// ---------------------------------------------------------------------------
// ProjectionTree
// ---------------------------------------------------------------------------

/// The derived, non-owning display forest over a record collection.
#[derive(Debug, Default)]
pub struct ProjectionTree {
    /// Enabled grouping fields captured at the last rebuild, outermost
    /// first. Empty means the flat (ungrouped) projection.
    fields: Vec<String>,
    sections: Vec<Section>,
    /// Leaf list for the ungrouped projection.
    flat: Vec<RecordId>,
    section_state: HashMap<SectionPath, NodeState>,
    leaf_state: HashMap<RecordId, NodeState>,
    camera: f32,
    generation: u64,
}

impl ProjectionTree {
    /// An empty projection (as if rebuilt over an empty collection with no
    /// controls).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild generation counter; bumps on every full rebuild.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Root sections in first-seen order (empty in the flat projection).
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Vertical scroll position of the virtualized viewport.
    #[must_use]
    pub const fn camera(&self) -> f32 {
        self.camera
    }

    /// Set the scroll position. Transient, never persisted.
    pub fn set_camera(&mut self, offset: f32) {
        self.camera = offset;
    }

    // -- rebuild ------------------------------------------------------------

    /// Full rebuild from the collection and the current control order.
    ///
    /// Sections are created on first use and keep first-seen order among
    /// siblings; empty sections cannot survive (they are never created
    /// without a leaf). Section display state is discarded except for
    /// `carry_over` paths; leaf display state survives for records still in
    /// the collection.
    pub fn rebuild(
        &mut self,
        collection: &RecordCollection,
        controls: &BreakoutControls,
        carry_over: &[SectionPath],
    ) {
        self.generation += 1;
        self.fields = controls
            .enabled_fields()
            .into_iter()
            .map(str::to_owned)
            .collect();
        debug!(
            generation = self.generation,
            fields = ?self.fields,
            records = collection.len(),
            "rebuilding projection"
        );

        let mut carried = HashMap::new();
        for path in carry_over {
            if let Some(state) = self.section_state.get(path) {
                carried.insert(path.clone(), *state);
            }
        }
        self.section_state = carried;
        self.leaf_state.retain(|id, _| collection.contains(*id));

        self.sections.clear();
        self.flat.clear();
        if self.fields.is_empty() {
            self.flat.extend(collection.order().iter().copied());
            return;
        }
        for record in collection.iter() {
            let path = Self::path_for(record, &self.fields);
            if let Some(section) = ensure_path(&mut self.sections, &path) {
                section.leaves.push(record.id());
            }
        }
    }

    /// Recompute one record's section membership.
    ///
    /// Covers all three shapes of change: a record whose grouping value
    /// changed moves between sections, a newly-inserted record gains a leaf,
    /// and a removed record's leaf is detached. Emptied ancestor sections
    /// are pruned; their path-keyed display state is kept for the rest of
    /// the generation.
    pub fn reindex(&mut self, id: RecordId, collection: &RecordCollection) {
        if self.fields.is_empty() {
            // Flat projection: mirror collection order directly.
            self.flat.clear();
            self.flat.extend(collection.order().iter().copied());
            if !collection.contains(id) {
                self.leaf_state.remove(&id);
            }
            return;
        }

        let new_path = collection
            .get(id)
            .map(|record| Self::path_for(record, &self.fields));
        // Detach even when the path is unchanged: the record may have moved
        // within the collection, and re-insertion restores its ordered
        // position among section siblings.
        detach_leaf(&mut self.sections, id);
        match new_path {
            Some(path) => {
                trace!(%id, ?path, "reindex: moving leaf");
                if let Some(section) = ensure_path(&mut self.sections, &path) {
                    insert_leaf_ordered(section, id, collection);
                }
            }
            None => {
                self.leaf_state.remove(&id);
            }
        }
    }

    fn path_for(record: &Record, fields: &[String]) -> SectionPath {
        fields
            .iter()
            .map(|field| SectionKey {
                field: field.clone(),
                value: record
                    .field(field)
                    .and_then(|v| v.group_key())
                    .map(str::to_owned),
            })
            .collect()
    }

    // -- traversal ----------------------------------------------------------

    /// All items in pre-order: each section before its children, subsections
    /// before leaves.
    #[must_use]
    pub fn pre_order(&self) -> Vec<ItemRef> {
        let mut out = Vec::new();
        if self.fields.is_empty() {
            out.extend(self.flat.iter().map(|&id| ItemRef::Leaf(id)));
            return out;
        }
        let mut prefix = SectionPath::new();
        walk(&self.sections, &self.fields, &mut prefix, &mut |item, _| {
            out.push(item);
        });
        out
    }

    /// Every leaf's record id, in projection order.
    #[must_use]
    pub fn leaf_ids(&self) -> Vec<RecordId> {
        self.pre_order()
            .into_iter()
            .filter_map(|item| match item {
                ItemRef::Leaf(id) => Some(id),
                ItemRef::Section(_) => None,
            })
            .collect()
    }

    /// The item immediately before `item` in pre-order.
    #[must_use]
    pub fn item_before(&self, item: &ItemRef) -> Option<ItemRef> {
        let items = self.pre_order();
        let pos = items.iter().position(|i| i == item)?;
        pos.checked_sub(1).map(|p| items[p].clone())
    }

    /// The item immediately after `item` in pre-order.
    #[must_use]
    pub fn item_after(&self, item: &ItemRef) -> Option<ItemRef> {
        let items = self.pre_order();
        let pos = items.iter().position(|i| i == item)?;
        items.get(pos + 1).cloned()
    }

    /// Ancestor section paths of `item`, outermost first, excluding the
    /// item itself.
    #[must_use]
    pub fn ancestors(&self, item: &ItemRef) -> Vec<SectionPath> {
        let full: Option<SectionPath> = match item {
            ItemRef::Section(path) => Some(path.clone()),
            ItemRef::Leaf(id) => self.leaf_path(*id),
        };
        let Some(full) = full else {
            return Vec::new();
        };
        let upto = match item {
            ItemRef::Section(_) => full.len().saturating_sub(1),
            ItemRef::Leaf(_) => full.len(),
        };
        (1..=upto).map(|n| full[..n].iter().cloned().collect()).collect()
    }

    /// Current section path of the leaf viewing `id`, if present.
    #[must_use]
    pub fn leaf_path(&self, id: RecordId) -> Option<SectionPath> {
        let mut prefix = SectionPath::new();
        find_leaf(&self.sections, &self.fields, &mut prefix, id)
    }

    // -- collapse -----------------------------------------------------------

    /// Whether the section at `path` is collapsed. Unknown paths report the
    /// default (expanded).
    #[must_use]
    pub fn is_collapsed(&self, path: &SectionPath) -> bool {
        self.section_state.get(path).is_some_and(|s| s.collapsed)
    }

    /// Collapse or expand the section at `path`, returning the previous
    /// state.
    pub fn set_collapsed(&mut self, path: &SectionPath, collapsed: bool) -> bool {
        let state = self.section_state.entry(path.clone()).or_default();
        std::mem::replace(&mut state.collapsed, collapsed)
    }

    // -- selection ----------------------------------------------------------

    /// Whether `item` is selected.
    #[must_use]
    pub fn is_selected(&self, item: &ItemRef) -> bool {
        match item {
            ItemRef::Section(path) => {
                self.section_state.get(path).is_some_and(|s| s.selected)
            }
            ItemRef::Leaf(id) => self.leaf_state.get(id).is_some_and(|s| s.selected),
        }
    }

    /// Select or deselect `item`, returning the previous state.
    pub fn set_selected(&mut self, item: &ItemRef, selected: bool) -> bool {
        let state = match item {
            ItemRef::Section(path) => self.section_state.entry(path.clone()).or_default(),
            ItemRef::Leaf(id) => self.leaf_state.entry(*id).or_default(),
        };
        std::mem::replace(&mut state.selected, selected)
    }

    /// Selected items in pre-order.
    #[must_use]
    pub fn selected_items(&self) -> Vec<ItemRef> {
        self.pre_order()
            .into_iter()
            .filter(|item| self.is_selected(item))
            .collect()
    }

    /// Select every leaf and deselect every section.
    pub fn select_all_leaves(&mut self) {
        for item in self.pre_order() {
            match item {
                ItemRef::Leaf(id) => {
                    self.leaf_state.entry(id).or_default().selected = true;
                }
                ItemRef::Section(path) => {
                    if let Some(state) = self.section_state.get_mut(&path) {
                        state.selected = false;
                    }
                }
            }
        }
    }

    /// Deselect everything.
    pub fn clear_selection(&mut self) {
        for state in self.section_state.values_mut() {
            state.selected = false;
        }
        for state in self.leaf_state.values_mut() {
            state.selected = false;
        }
    }

    // -- layout -------------------------------------------------------------

    /// Assign vertical offsets to every visible item (descendants of
    /// collapsed sections are skipped) and return the total content height.
    ///
    /// Uniform row heights: `section_height` per section header,
    /// `leaf_height` per leaf row.
    pub fn layout(&mut self, section_height: f32, leaf_height: f32) -> f32 {
        let mut cursor = 0.0_f32;
        let visible = self.visible_items();
        for item in visible {
            match item {
                ItemRef::Section(path) => {
                    let state = self.section_state.entry(path).or_default();
                    state.top = cursor;
                    state.height = section_height;
                    cursor += section_height;
                }
                ItemRef::Leaf(id) => {
                    let state = self.leaf_state.entry(id).or_default();
                    state.top = cursor;
                    state.height = leaf_height;
                    cursor += leaf_height;
                }
            }
        }
        cursor
    }

    /// The vertical offset assigned to `item` by the last [`Self::layout`].
    #[must_use]
    pub fn item_top(&self, item: &ItemRef) -> Option<f32> {
        match item {
            ItemRef::Section(path) => self.section_state.get(path).map(|s| s.top),
            ItemRef::Leaf(id) => self.leaf_state.get(id).map(|s| s.top),
        }
    }

    /// Pre-order items with descendants of collapsed sections omitted (the
    /// collapsed section itself stays visible).
    #[must_use]
    pub fn visible_items(&self) -> Vec<ItemRef> {
        let mut out = Vec::new();
        let mut hidden: HashSet<SectionPath> = HashSet::new();
        for item in self.pre_order() {
            let under_hidden = self
                .ancestors(&item)
                .iter()
                .any(|anc| hidden.contains(anc));
            if under_hidden {
                continue;
            }
            if let ItemRef::Section(path) = &item {
                if self.is_collapsed(path) {
                    hidden.insert(path.clone());
                }
            }
            out.push(item);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Structural helpers
// ---------------------------------------------------------------------------

/// Walk to (and lazily create) the section chain for `path`, returning the
/// innermost section. `None` only for an empty path (flat projection).
fn ensure_path<'a>(roots: &'a mut Vec<Section>, path: &[SectionKey]) -> Option<&'a mut Section> {
    let (first, rest) = path.split_first()?;
    let mut section = ensure_section(roots, first.value.as_deref());
    for key in rest {
        section = ensure_section(&mut section.subsections, key.value.as_deref());
    }
    Some(section)
}

fn ensure_section<'a>(level: &'a mut Vec<Section>, value: Option<&str>) -> &'a mut Section {
    let found = level.iter().position(|s| s.value() == value);
    let idx = match found {
        Some(i) => i,
        None => {
            level.push(Section {
                key_value: value.map(str::to_owned),
                subsections: Vec::new(),
                leaves: Vec::new(),
            });
            level.len() - 1
        }
    };
    &mut level[idx]
}

/// Remove the leaf for `id`, pruning ancestor sections left unpopulated.
fn detach_leaf(level: &mut Vec<Section>, id: RecordId) -> bool {
    for i in 0..level.len() {
        if let Some(pos) = level[i].leaves.iter().position(|&l| l == id) {
            level[i].leaves.remove(pos);
            if level[i].is_unpopulated() {
                level.remove(i);
            }
            return true;
        }
        if detach_leaf(&mut level[i].subsections, id) {
            if level[i].is_unpopulated() {
                level.remove(i);
            }
            return true;
        }
    }
    false
}

/// Insert `id` among a section's leaves, keeping collection order.
fn insert_leaf_ordered(section: &mut Section, id: RecordId, collection: &RecordCollection) {
    let pos_of = |leaf: RecordId| collection.position(leaf).unwrap_or(usize::MAX);
    let target = pos_of(id);
    let at = section
        .leaves
        .iter()
        .position(|&l| pos_of(l) > target)
        .unwrap_or(section.leaves.len());
    section.leaves.insert(at, id);
}

fn find_leaf(
    level: &[Section],
    fields: &[String],
    prefix: &mut SectionPath,
    id: RecordId,
) -> Option<SectionPath> {
    let depth = prefix.len();
    for section in level {
        prefix.push(SectionKey {
            field: fields.get(depth).cloned().unwrap_or_default(),
            value: section.key_value.clone(),
        });
        if section.leaves.contains(&id) {
            let found = prefix.clone();
            prefix.pop();
            return Some(found);
        }
        if let Some(found) = find_leaf(&section.subsections, fields, prefix, id) {
            prefix.pop();
            return Some(found);
        }
        prefix.pop();
    }
    None
}

fn walk(
    level: &[Section],
    fields: &[String],
    prefix: &mut SectionPath,
    visit: &mut impl FnMut(ItemRef, usize),
) {
    let depth = prefix.len();
    for section in level {
        prefix.push(SectionKey {
            field: fields.get(depth).cloned().unwrap_or_default(),
            value: section.key_value.clone(),
        });
        visit(ItemRef::Section(prefix.clone()), depth);
        walk(&section.subsections, fields, prefix, visit);
        for &leaf in &section.leaves {
            visit(ItemRef::Leaf(leaf), depth + 1);
        }
        prefix.pop();
    }
}
