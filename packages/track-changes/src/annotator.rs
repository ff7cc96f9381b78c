//! # Change Annotator
//!
//! [`Annotator`] is the [`ChangeTracker`] attached to tracked transactions.
//! It appends a pending [`ChangeRecord`] for every authored edit and decides
//! whether deleted nodes stay in the document.

use crate::predicates::{is_deleted, is_pending_insert};
use crate::record::{ChangeLog, ChangeOperation, ChangeRecord, ChangeStatus};
use manuscript_model::{Attrs, ChangeTracker, Node, ObjectType, DATA_TRACKED};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Source of timestamps in milliseconds since the Unix epoch
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Append a pending insert record
pub fn mark_insert(node: &mut Node, record_id: &str, author_id: &str, at: i64) {
    append(
        node,
        ChangeRecord::pending(record_id, ChangeOperation::Insert, author_id, at),
    );
}

/// Append a pending delete record
pub fn mark_delete(node: &mut Node, record_id: &str, author_id: &str, at: i64) {
    append(
        node,
        ChangeRecord::pending(record_id, ChangeOperation::Delete, author_id, at),
    );
}

/// Replace the node's attributes, recording `old_attrs` for rollback
pub fn mark_set_attrs(
    node: &mut Node,
    old_attrs: Attrs,
    new_attrs: Attrs,
    record_id: &str,
    author_id: &str,
    at: i64,
) {
    let mut log = ChangeLog::of(node);
    log.push(
        ChangeRecord::pending(record_id, ChangeOperation::SetAttrs, author_id, at)
            .with_old_attrs(old_attrs),
    );

    let mut attrs = new_attrs;
    log.write_to(&mut attrs);
    node.attrs = attrs;
}

fn append(node: &mut Node, record: ChangeRecord) {
    let mut log = ChangeLog::of(node);
    log.push(record);
    log.write_to(&mut node.attrs);
}

/// Records tracked edits on behalf of one author
pub struct Annotator {
    author_id: String,
    clock: Clock,
    counter: AtomicU64,
}

impl Annotator {
    pub fn new(author_id: impl Into<String>) -> Self {
        Self::with_clock(author_id, system_clock())
    }

    pub fn with_clock(author_id: impl Into<String>, clock: Clock) -> Self {
        Self {
            author_id: author_id.into(),
            clock,
            counter: AtomicU64::new(0),
        }
    }

    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    fn next_record_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "{}:{}-{}-{}",
            ObjectType::Change.prefix(),
            self.author_id,
            self.now(),
            n
        )
    }
}

impl fmt::Debug for Annotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotator")
            .field("author_id", &self.author_id)
            .field("records", &self.counter.load(Ordering::Relaxed))
            .finish()
    }
}

impl ChangeTracker for Annotator {
    fn track_insert(&self, node: &mut Node) {
        if is_pending_insert(node) {
            return;
        }
        trace!(kind = %node.kind, author = %self.author_id, "Tracking insert");
        mark_insert(node, &self.next_record_id(), &self.author_id, self.now());
    }

    fn track_delete(&self, node: &mut Node) -> bool {
        if is_pending_insert(node) {
            trace!(kind = %node.kind, "Removing pending insert");
            return false;
        }
        if !is_deleted(node) {
            trace!(kind = %node.kind, author = %self.author_id, "Tracking delete");
            mark_delete(node, &self.next_record_id(), &self.author_id, self.now());
        }
        true
    }

    fn track_set_attrs(&self, node: &Node, attrs: &mut Attrs) {
        let log = ChangeLog::of(node);
        let old_attrs = node.attrs_without_tracking();

        let unchanged = {
            let mut requested = attrs.clone();
            requested.remove(DATA_TRACKED);
            requested == old_attrs
        };

        let keep_log = unchanged
            || is_pending_insert(node)
            || log.any(|r| r.is(ChangeOperation::SetAttrs, ChangeStatus::Pending));

        if keep_log {
            log.write_to(attrs);
            return;
        }

        trace!(kind = %node.kind, author = %self.author_id, "Tracking attribute change");
        let mut updated = node.clone();
        mark_set_attrs(
            &mut updated,
            old_attrs,
            attrs.clone(),
            &self.next_record_id(),
            &self.author_id,
            self.now(),
        );
        *attrs = updated.attrs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::{get_actual_attrs, is_hidden, is_pending_set_attrs};
    use manuscript_model::{NodeKind, Transaction};
    use serde_json::json;

    fn annotator() -> Arc<Annotator> {
        Arc::new(Annotator::with_clock("author-1", Arc::new(|| 1_000)))
    }

    fn doc() -> Node {
        Node::new(NodeKind::Manuscript).with_content(vec![
            Node::new(NodeKind::Paragraph)
                .with_attr("id", "p1")
                .with_child(Node::text("One")),
            Node::new(NodeKind::Paragraph)
                .with_attr("id", "p2")
                .with_child(Node::text("Two")),
        ])
    }

    #[test]
    fn test_tracked_insert_is_pending() {
        let mut tr = Transaction::new(doc()).with_tracker(annotator());
        tr.insert(0, Node::new(NodeKind::Paragraph).with_attr("id", "p0"))
            .unwrap();

        let inserted = &tr.doc().content[0];
        let log = ChangeLog::of(inserted);
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].author_id, "author-1");
        assert_eq!(log.records()[0].created_at, 1_000);
        assert!(log.records()[0].id.starts_with("MPChange:author-1-"));
        assert!(is_pending_insert(inserted));
    }

    #[test]
    fn test_tracked_delete_keeps_node_hidden() {
        let mut tr = Transaction::new(doc()).with_tracker(annotator());
        tr.delete(0, 5).unwrap();
        tr.delete(0, 5).unwrap();

        let deleted = &tr.doc().content[0];
        assert!(is_hidden(deleted));
        assert_eq!(ChangeLog::of(deleted).len(), 1);
        assert_eq!(tr.doc().child_count(), 2);
    }

    #[test]
    fn test_deleting_pending_insert_removes_it() {
        let mut tr = Transaction::new(doc()).with_tracker(annotator());
        tr.insert(0, Node::new(NodeKind::Paragraph)).unwrap();
        tr.delete(0, 2).unwrap();

        assert_eq!(tr.doc().child_count(), 2);
        assert_eq!(tr.doc().content[0].id(), Some("p1"));
    }

    #[test]
    fn test_set_attrs_keeps_first_snapshot() {
        let mut tr = Transaction::new(doc()).with_tracker(annotator());
        tr.set_node_attribute(0, "label", "A").unwrap();
        tr.set_node_attribute(0, "label", "B").unwrap();

        let node = &tr.doc().content[0];
        let log = ChangeLog::of(node);
        assert_eq!(log.len(), 1);
        assert!(is_pending_set_attrs(node));
        assert_eq!(node.attr("label"), Some(&json!("B")));
        assert_eq!(
            log.records()[0].old_attrs.as_ref().unwrap().get("label"),
            None
        );
        assert_eq!(get_actual_attrs(node).get("label"), Some(&json!("B")));
    }

    #[test]
    fn test_unchanged_attrs_are_not_recorded() {
        let mut tr = Transaction::new(doc()).with_tracker(annotator());
        tr.set_node_attribute(0, "id", "p1").unwrap();
        assert!(!tr.doc().content[0].attrs.contains_key(DATA_TRACKED));
    }

    #[test]
    fn test_mark_functions_append() {
        let mut node = Node::new(NodeKind::Figure).with_attr("src", "a.png");
        mark_insert(&mut node, "c1", "u", 1);
        mark_delete(&mut node, "c2", "u", 2);
        let old = node.attrs_without_tracking();
        let mut new = old.clone();
        new.insert("src".into(), json!("b.png"));
        mark_set_attrs(&mut node, old, new, "c3", "u", 3);

        let ops: Vec<_> = ChangeLog::of(&node)
            .iter()
            .map(|r| r.operation)
            .collect();
        assert_eq!(
            ops,
            vec![
                ChangeOperation::Insert,
                ChangeOperation::Delete,
                ChangeOperation::SetAttrs
            ]
        );
        assert_eq!(node.attr_str("src"), Some("b.png"));
    }
}
