//! # Cross-Reference Targets
//!
//! Labels of referenceable elements are derived state: they are recomputed
//! from document order after every transaction and copied into the
//! `cross_reference` nodes that point at them.
//!
//! ```text
//! figure_element  → "Figure 1", "Figure 2", ...
//! table_element   → "Table 1", ...
//! section         → "Section 1", "Section 1.1", "Section 2", ...
//! ```
//!
//! Nodes inside a graphical abstract section and hidden nodes get no label.

use crate::config::ManuscriptMeta;
use manuscript_model::{Node, NodeKind, Transaction};
use manuscript_track_changes::is_hidden;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// Origin attached to label propagation transactions
pub const OBJECTS_ORIGIN: &str = "objects";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetCategory {
    Figure,
    Table,
    Equation,
    Listing,
    Section,
}

impl TargetCategory {
    fn of(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::FigureElement => Some(TargetCategory::Figure),
            NodeKind::TableElement => Some(TargetCategory::Table),
            NodeKind::EquationElement => Some(TargetCategory::Equation),
            NodeKind::ListingElement => Some(TargetCategory::Listing),
            NodeKind::Section => Some(TargetCategory::Section),
            _ => None,
        }
    }

    fn label<'m>(&self, meta: &'m ManuscriptMeta) -> &'m str {
        match self {
            TargetCategory::Figure => &meta.figure_element_label,
            TargetCategory::Table => &meta.table_element_label,
            TargetCategory::Equation => &meta.equation_element_label,
            TargetCategory::Listing => &meta.listing_element_label,
            TargetCategory::Section => &meta.section_label,
        }
    }
}

/// Computed label of one referenceable node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub id: String,
    pub category: TargetCategory,
    pub label: String,
    /// 1-based ordinal within the category (innermost level for sections)
    pub ordinal: usize,
    pub pos: usize,
}

/// Every labeled node of a document revision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Targets {
    targets: HashMap<String, Target>,
    order: Vec<String>,
}

impl Targets {
    #[instrument(skip_all)]
    pub fn build(doc: &Node, meta: &ManuscriptMeta) -> Self {
        let mut builder = Builder {
            meta,
            counters: HashMap::new(),
            section_numbers: Vec::new(),
            targets: Targets::default(),
        };
        builder.walk(doc, 0, 0);
        debug!(targets = builder.targets.len(), "Built cross-reference targets");
        builder.targets
    }

    pub fn get(&self, id: &str) -> Option<&Target> {
        self.targets.get(id)
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.get(id).map(|t| t.label.as_str())
    }

    /// Targets in document order
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.order.iter().filter_map(|id| self.targets.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn push(&mut self, target: Target) {
        if self.targets.contains_key(&target.id) {
            return;
        }
        self.order.push(target.id.clone());
        self.targets.insert(target.id.clone(), target);
    }
}

struct Builder<'m> {
    meta: &'m ManuscriptMeta,
    counters: HashMap<TargetCategory, usize>,
    section_numbers: Vec<usize>,
    targets: Targets,
}

impl Builder<'_> {
    fn walk(&mut self, parent: &Node, start: usize, section_depth: usize) {
        let mut pos = start;
        for child in &parent.content {
            let child_pos = pos;
            pos += child.node_size();

            if is_hidden(child) || child.is(&NodeKind::GraphicalAbstractSection) {
                continue;
            }

            let mut depth = section_depth;
            match (TargetCategory::of(&child.kind), child.id()) {
                (Some(TargetCategory::Section), id) => {
                    self.section_numbers.truncate(section_depth + 1);
                    if self.section_numbers.len() == section_depth {
                        self.section_numbers.push(0);
                    }
                    self.section_numbers[section_depth] += 1;
                    depth += 1;

                    if let Some(id) = id {
                        let numbers: Vec<String> =
                            self.section_numbers.iter().map(usize::to_string).collect();
                        self.targets.push(Target {
                            id: id.to_string(),
                            category: TargetCategory::Section,
                            label: format!("{} {}", self.meta.section_label, numbers.join(".")),
                            ordinal: self.section_numbers[section_depth],
                            pos: child_pos,
                        });
                    }
                }
                (Some(category), Some(id)) => {
                    let counter = self.counters.entry(category).or_insert(0);
                    *counter += 1;
                    self.targets.push(Target {
                        id: id.to_string(),
                        category,
                        label: format!("{} {}", category.label(self.meta), counter),
                        ordinal: *counter,
                        pos: child_pos,
                    });
                }
                _ => {}
            }

            if !child.is_leaf() && !child.is_text() {
                self.walk(child, child_pos + 1, depth);
            }
        }
    }
}

/// A cross reference whose target no longer exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenReference {
    pub pos: usize,
    pub rid: String,
    /// Last known label, left untouched
    pub label: Option<String>,
}

/// Referenced id of a cross reference: `rid`, or the first of `rids`
pub fn reference_id(node: &Node) -> Option<String> {
    node.attr_str("rid")
        .filter(|rid| !rid.is_empty())
        .map(str::to_string)
        .or_else(|| node.attr_strings("rids").into_iter().next())
}

/// Visible cross references as `(pos, node)` pairs
fn cross_references(doc: &Node) -> Vec<(usize, &Node)> {
    let mut found = Vec::new();
    doc.descendants(|node, pos, _| {
        if is_hidden(node) {
            return false;
        }
        if node.is(&NodeKind::CrossReference) {
            found.push((pos, node));
        }
        true
    });
    found
}

/// Cross references pointing at ids that no visible node carries
pub fn find_broken_references(doc: &Node) -> Vec<BrokenReference> {
    let mut live_ids = HashSet::new();
    doc.descendants(|node, _, _| {
        if is_hidden(node) {
            return false;
        }
        if let Some(id) = node.id() {
            live_ids.insert(id.to_string());
        }
        true
    });

    cross_references(doc)
        .into_iter()
        .filter_map(|(pos, node)| {
            let rid = reference_id(node)?;
            (!live_ids.contains(&rid)).then(|| BrokenReference {
                pos,
                rid,
                label: node.attr_str("label").map(str::to_string),
            })
        })
        .collect()
}

/// Copy fresh target labels into stale cross references.
///
/// Returns an untracked transaction, or `None` when every label is current.
pub fn propagate_labels(doc: &Node, targets: &Targets) -> Option<Transaction> {
    let updates: Vec<(usize, String)> = cross_references(doc)
        .into_iter()
        .filter_map(|(pos, node)| {
            let target = targets.get(&reference_id(node)?)?;
            (node.attr_str("label") != Some(target.label.as_str()))
                .then(|| (pos, target.label.clone()))
        })
        .collect();

    if updates.is_empty() {
        return None;
    }

    let mut tr = Transaction::new(doc.clone());
    tr.skip_tracking().set_origin(OBJECTS_ORIGIN);
    for (pos, label) in &updates {
        if let Err(err) = tr.set_node_attribute(*pos, "label", label.as_str()) {
            warn!(pos, error = %err, "Could not update cross-reference label");
        }
    }
    debug!(updated = updates.len(), "Propagating cross-reference labels");
    Some(tr)
}
