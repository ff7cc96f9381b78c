//! # Transactions
//!
//! A transaction is the explicit unit of mutation: it owns a working copy of
//! the document, applies each edit eagerly, and records the step maps needed
//! to translate positions taken before the edits.
//!
//! ## Tracked editing
//!
//! When a [`ChangeTracker`] is attached, edits are routed through it:
//! - inserted nodes are annotated before they land in the document
//! - deleted nodes may be kept in place and annotated instead of removed
//! - attribute updates may record the previous attributes
//!
//! [`Transaction::skip_tracking`] detaches the tracker for derived updates
//! that must never show up as authored changes.

use crate::error::{ModelError, ModelResult};
use crate::mapping::{Mapping, StepMap};
use crate::node::{Attrs, Node};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Hook that turns destructive edits into tracked changes
pub trait ChangeTracker: fmt::Debug + Send + Sync {
    /// Annotate a node about to be inserted
    fn track_insert(&self, node: &mut Node);

    /// Annotate a node about to be deleted.
    ///
    /// Returns `true` when the node must stay in the document (marked as
    /// deleted) and `false` when it should really be removed.
    fn track_delete(&self, node: &mut Node) -> bool;

    /// Adjust the attributes about to replace `node.attrs`
    fn track_set_attrs(&self, node: &Node, attrs: &mut Attrs);
}

/// Edits recorded by a transaction, in application order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stepType", rename_all = "camelCase")]
pub enum Step {
    Insert { pos: usize, size: usize },
    Delete { from: usize, to: usize },
    SetAttrs { pos: usize },
}

/// Current selection in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Selection {
    Text { anchor: usize, head: usize },
    Node { from: usize, to: usize },
}

impl Selection {
    pub fn cursor(pos: usize) -> Self {
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    /// Select the node starting at `pos`
    pub fn node(doc: &Node, pos: usize) -> ModelResult<Self> {
        let node = doc.node_at(pos).ok_or(ModelError::NoNodeAt { pos })?;
        Ok(Selection::Node {
            from: pos,
            to: pos + node.node_size(),
        })
    }

    pub fn from(&self) -> usize {
        match *self {
            Selection::Text { anchor, head } => anchor.min(head),
            Selection::Node { from, .. } => from,
        }
    }

    pub fn to(&self) -> usize {
        match *self {
            Selection::Text { anchor, head } => anchor.max(head),
            Selection::Node { to, .. } => to,
        }
    }

    pub fn map(&self, mapping: &Mapping) -> Self {
        match *self {
            Selection::Text { anchor, head } => Selection::Text {
                anchor: mapping.map(anchor),
                head: mapping.map(head),
            },
            Selection::Node { from, to } => {
                let (from, deleted) = mapping.map_result(from);
                let to = mapping.map(to);
                if deleted || to <= from {
                    Selection::cursor(from)
                } else {
                    Selection::Node { from, to }
                }
            }
        }
    }
}

/// A batch of edits applied to one document snapshot
#[derive(Debug, Clone)]
pub struct Transaction {
    doc: Node,
    steps: Vec<Step>,
    mapping: Mapping,
    tracker: Option<Arc<dyn ChangeTracker>>,
    skip_tracking: bool,
    origin: Option<String>,
    selection: Option<Selection>,
    scroll_into_view: bool,
}

impl Transaction {
    pub fn new(doc: Node) -> Self {
        Self {
            doc,
            steps: Vec::new(),
            mapping: Mapping::new(),
            tracker: None,
            skip_tracking: false,
            origin: None,
            selection: None,
            scroll_into_view: false,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn ChangeTracker>) -> Self {
        if !self.skip_tracking {
            self.tracker = Some(tracker);
        }
        self
    }

    /// Exclude every following edit from change tracking
    pub fn skip_tracking(&mut self) -> &mut Self {
        self.skip_tracking = true;
        self.tracker = None;
        self
    }

    pub fn is_tracked(&self) -> bool {
        self.tracker.is_some()
    }

    pub fn skips_tracking(&self) -> bool {
        self.skip_tracking
    }

    pub fn set_origin(&mut self, origin: impl Into<String>) -> &mut Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn into_doc(self) -> Node {
        self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = Some(selection);
        self
    }

    pub fn scroll_into_view(&mut self) -> &mut Self {
        self.scroll_into_view = true;
        self
    }

    pub fn is_scroll_into_view(&self) -> bool {
        self.scroll_into_view
    }

    pub fn insert(&mut self, pos: usize, node: Node) -> ModelResult<&mut Self> {
        self.insert_nodes(pos, vec![node])
    }

    pub fn insert_nodes(&mut self, pos: usize, mut nodes: Vec<Node>) -> ModelResult<&mut Self> {
        if let Some(tracker) = &self.tracker {
            for node in &mut nodes {
                tracker.track_insert(node);
            }
        }

        let map = self.doc.insert(pos, nodes)?;
        self.steps.push(Step::Insert {
            pos,
            size: map.inserted,
        });
        self.mapping.append(map);
        Ok(self)
    }

    /// Delete a range of sibling nodes (or text inside one text node)
    pub fn delete(&mut self, from: usize, to: usize) -> ModelResult<&mut Self> {
        let Some(tracker) = self.tracker.clone() else {
            let map = self.doc.delete(from, to)?;
            self.record_delete(from, to, map);
            return Ok(self);
        };

        // Text runs carry no node identity to annotate
        let Ok(range) = self.doc.sibling_range(from, to) else {
            let map = self.doc.delete(from, to)?;
            self.record_delete(from, to, map);
            return Ok(self);
        };

        let parent = self
            .doc
            .node_at_path_mut(&range.path)
            .ok_or(ModelError::NoNodeAt { pos: from })?;

        let mut starts = Vec::with_capacity(range.end_index - range.start_index);
        let mut pos = from;
        for child in &parent.content[range.start_index..range.end_index] {
            starts.push(pos);
            pos += child.node_size();
        }

        let mut maps = Vec::new();
        for (offset, start) in starts.into_iter().enumerate().rev() {
            let index = range.start_index + offset;
            if !tracker.track_delete(&mut parent.content[index]) {
                let size = parent.content[index].node_size();
                parent.content.remove(index);
                maps.push(StepMap::new(start, size, 0));
            }
        }

        for map in maps {
            self.record_delete(map.pos, map.pos + map.deleted, map);
        }
        Ok(self)
    }

    fn record_delete(&mut self, from: usize, to: usize, map: StepMap) {
        if from == to {
            return;
        }
        self.steps.push(Step::Delete { from, to });
        self.mapping.append(map);
    }

    /// Replace all attributes of the node at `pos`
    pub fn set_node_attrs(&mut self, pos: usize, mut attrs: Attrs) -> ModelResult<&mut Self> {
        if let Some(tracker) = &self.tracker {
            let node = self.doc.node_at(pos).ok_or(ModelError::NoNodeAt { pos })?;
            tracker.track_set_attrs(node, &mut attrs);
        }

        let map = self.doc.set_node_attrs(pos, attrs)?;
        self.steps.push(Step::SetAttrs { pos });
        self.mapping.append(map);
        Ok(self)
    }

    /// Update a single attribute of the node at `pos`
    pub fn set_node_attribute(
        &mut self,
        pos: usize,
        key: &str,
        value: impl Into<Value>,
    ) -> ModelResult<&mut Self> {
        let node = self.doc.node_at(pos).ok_or(ModelError::NoNodeAt { pos })?;
        let mut attrs = node.attrs.clone();
        attrs.insert(key.to_string(), value.into());
        self.set_node_attrs(pos, attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, DATA_TRACKED};
    use serde_json::json;

    #[derive(Debug)]
    struct MarkingTracker;

    impl ChangeTracker for MarkingTracker {
        fn track_insert(&self, node: &mut Node) {
            node.attrs.insert(DATA_TRACKED.into(), json!([{ "operation": "insert" }]));
        }

        fn track_delete(&self, node: &mut Node) -> bool {
            if node.attrs.contains_key(DATA_TRACKED) {
                return false;
            }
            node.attrs.insert(DATA_TRACKED.into(), json!([{ "operation": "delete" }]));
            true
        }

        fn track_set_attrs(&self, node: &Node, attrs: &mut Attrs) {
            attrs.insert("previous".into(), Value::Object(node.attrs.clone()));
        }
    }

    fn doc() -> Node {
        Node::new(NodeKind::Manuscript).with_content(vec![
            Node::new(NodeKind::Paragraph).with_attr("id", "p1"),
            Node::new(NodeKind::Paragraph).with_attr("id", "p2"),
        ])
    }

    #[test]
    fn test_untracked_delete_updates_mapping() {
        let mut tr = Transaction::new(doc());
        tr.delete(0, 2).unwrap();

        assert_eq!(tr.doc().child_count(), 1);
        assert_eq!(tr.mapping().map(3), 1);
        assert_eq!(tr.steps(), &[Step::Delete { from: 0, to: 2 }]);
    }

    #[test]
    fn test_tracked_delete_keeps_nodes() {
        let mut tr = Transaction::new(doc()).with_tracker(Arc::new(MarkingTracker));
        tr.delete(0, 4).unwrap();

        assert_eq!(tr.doc().child_count(), 2);
        assert!(tr.mapping().is_empty());
        assert!(tr.doc().content[0].attrs.contains_key(DATA_TRACKED));
    }

    #[test]
    fn test_tracked_delete_removes_tracked_inserts() {
        let mut tr = Transaction::new(doc()).with_tracker(Arc::new(MarkingTracker));
        tr.insert(4, Node::new(NodeKind::Paragraph).with_attr("id", "p3"))
            .unwrap();
        tr.delete(4, 6).unwrap();

        assert_eq!(tr.doc().child_count(), 2);
        assert_eq!(tr.mapping().map(4), 4);
    }

    #[test]
    fn test_skip_tracking_detaches_tracker() {
        let mut tr = Transaction::new(doc()).with_tracker(Arc::new(MarkingTracker));
        tr.skip_tracking();
        tr.set_node_attribute(0, "id", "changed").unwrap();

        assert!(!tr.is_tracked());
        assert!(tr.doc().content[0].attr("previous").is_none());
        assert_eq!(tr.doc().content[0].id(), Some("changed"));
    }

    #[test]
    fn test_node_selection_maps_to_cursor_when_deleted() {
        let doc = doc();
        let selection = Selection::node(&doc, 2).unwrap();
        let mut tr = Transaction::new(doc);
        tr.delete(2, 4).unwrap();

        assert_eq!(selection.map(tr.mapping()), Selection::cursor(2));
    }
}
