//! # Visibility Resolver
//!
//! Turns change logs into what a consumer needs to know about a node: is it
//! live content, and which change classes decorate it. Hidden nodes hide
//! their whole subtree.

use crate::predicates::is_hidden;
use crate::record::{ChangeLog, ChangeOperation, ChangeStatus};
use manuscript_model::{Node, ResolvedPos};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Shown,
    Hidden,
}

/// Rendering status of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub visibility: Visibility,
    pub classes: Vec<String>,
}

impl NodeStatus {
    pub fn is_hidden(&self) -> bool {
        self.visibility == Visibility::Hidden
    }
}

/// Status and operation of the most recent record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackStatus {
    pub operation: ChangeOperation,
    pub status: ChangeStatus,
}

/// Operation class and status of every record, e.g. `["inserted", "pending"]`
pub fn change_classes(log: &ChangeLog) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for record in log.iter() {
        for class in [
            record.operation.class_name().to_string(),
            record.status.to_string(),
        ] {
            if !classes.contains(&class) {
                classes.push(class);
            }
        }
    }
    classes
}

pub fn track_status(node: &Node) -> Option<TrackStatus> {
    ChangeLog::of(node).last().map(|r| TrackStatus {
        operation: r.operation,
        status: r.status,
    })
}

pub fn resolve_node(node: &Node) -> NodeStatus {
    NodeStatus {
        visibility: if is_hidden(node) {
            Visibility::Hidden
        } else {
            Visibility::Shown
        },
        classes: change_classes(&ChangeLog::of(node)),
    }
}

/// Status of one node in a document walk
#[derive(Debug, Clone)]
pub struct ResolvedNode<'a> {
    pub node: &'a Node,
    pub pos: usize,
    pub status: NodeStatus,
    /// Hidden because an ancestor is hidden
    pub inherited: bool,
}

/// Status of every node in document order
pub fn resolve_document(doc: &Node) -> Vec<ResolvedNode<'_>> {
    let mut resolved = Vec::new();
    resolve_children(doc, 0, false, &mut resolved);
    resolved
}

fn resolve_children<'a>(
    parent: &'a Node,
    start: usize,
    parent_hidden: bool,
    out: &mut Vec<ResolvedNode<'a>>,
) {
    let mut pos = start;
    for child in &parent.content {
        let mut status = resolve_node(child);
        let inherited = parent_hidden && !status.is_hidden();
        if parent_hidden {
            status.visibility = Visibility::Hidden;
        }
        let hidden = status.is_hidden();
        out.push(ResolvedNode {
            node: child,
            pos,
            status,
            inherited,
        });
        resolve_children(child, pos + 1, hidden, out);
        pos += child.node_size();
    }
}

/// Walk descendants like [`Node::descendants`], skipping hidden subtrees
pub fn visible_descendants<'a, F>(doc: &'a Node, mut f: F)
where
    F: FnMut(&'a Node, usize, &'a Node) -> bool,
{
    doc.descendants(|node, pos, parent| !is_hidden(node) && f(node, pos, parent));
}

/// Number of children that are not hidden
pub fn effective_child_count(node: &Node) -> usize {
    node.content.iter().filter(|child| !is_hidden(child)).count()
}

/// Number of visible list ancestors around a position
pub fn effective_list_depth(rp: &ResolvedPos<'_>) -> usize {
    let ancestors = rp.ancestors();
    if ancestors.iter().any(|a| is_hidden(a.node)) {
        return 0;
    }
    ancestors.iter().filter(|a| a.node.kind.is_list()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_model::{NodeKind, DATA_TRACKED};
    use serde_json::json;

    fn deleted(node: Node) -> Node {
        node.with_attr(
            DATA_TRACKED,
            json!([{ "operation": "delete", "status": "pending" }]),
        )
    }

    fn doc() -> Node {
        Node::new(NodeKind::Manuscript).with_content(vec![
            deleted(
                Node::new(NodeKind::Paragraph)
                    .with_child(Node::new(NodeKind::InlineFootnote)),
            ),
            Node::new(NodeKind::Paragraph).with_attr(
                DATA_TRACKED,
                json!([
                    { "operation": "insert", "status": "accepted" },
                    { "operation": "set_attrs", "status": "pending" }
                ]),
            ),
        ])
    }

    #[test]
    fn test_change_classes() {
        let status = resolve_node(&doc().content[1]);
        assert_eq!(status.visibility, Visibility::Shown);
        assert_eq!(
            status.classes,
            vec!["inserted", "accepted", "set_attrs", "pending"]
        );
        assert_eq!(
            track_status(&doc().content[1]),
            Some(TrackStatus {
                operation: ChangeOperation::SetAttrs,
                status: ChangeStatus::Pending
            })
        );
    }

    #[test]
    fn test_hidden_propagates_to_descendants() {
        let doc = doc();
        let resolved = resolve_document(&doc);

        assert_eq!(resolved.len(), 3);
        assert!(resolved[0].status.is_hidden());
        assert!(!resolved[0].inherited);
        assert!(resolved[1].status.is_hidden());
        assert!(resolved[1].inherited);
        assert_eq!(resolved[1].pos, 1);
        assert!(!resolved[2].status.is_hidden());
    }

    #[test]
    fn test_visible_descendants_skip_hidden_subtrees() {
        let doc = doc();
        let mut seen = Vec::new();
        visible_descendants(&doc, |node, pos, _| {
            seen.push((node.kind.clone(), pos));
            true
        });
        assert_eq!(seen, vec![(NodeKind::Paragraph, 3)]);
        assert_eq!(effective_child_count(&doc), 1);
    }

    #[test]
    fn test_effective_list_depth() {
        let item = |child: Node| Node::new(NodeKind::ListItem).with_child(child);
        let doc = Node::new(NodeKind::Manuscript).with_child(
            Node::new(NodeKind::BulletList).with_child(item(
                Node::new(NodeKind::OrderedList).with_child(item(Node::new(NodeKind::Paragraph))),
            )),
        );
        // 0 <ul> 1 <li> 2 <ol> 3 <li> 4 <p> 5
        let rp = doc.resolve(5).unwrap();
        assert_eq!(effective_list_depth(&rp), 2);

        let hidden = Node::new(NodeKind::Manuscript)
            .with_child(deleted(Node::new(NodeKind::BulletList).with_child(item(
                Node::new(NodeKind::Paragraph),
            ))));
        let rp = hidden.resolve(3).unwrap();
        assert_eq!(effective_list_depth(&rp), 0);
    }
}
