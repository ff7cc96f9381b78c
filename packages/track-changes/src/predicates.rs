//! Queries over the change log of a single node.
//!
//! Every structural consumer (footnotes, sections, lists, labels) asks the
//! same questions through these functions, so a node is hidden for one of
//! them exactly when it is hidden for all of them.

use crate::record::{ChangeLog, ChangeOperation, ChangeStatus};
use manuscript_model::{Attrs, Node};
use serde_json::Value;
use std::borrow::Cow;

pub fn is_pending_insert(node: &Node) -> bool {
    ChangeLog::of(node).any(|r| r.is(ChangeOperation::Insert, ChangeStatus::Pending))
}

/// A delete that has not been rejected
pub fn is_deleted(node: &Node) -> bool {
    ChangeLog::of(node)
        .any(|r| r.operation == ChangeOperation::Delete && r.status != ChangeStatus::Rejected)
}

pub fn is_rejected_insert(node: &Node) -> bool {
    ChangeLog::of(node).any(|r| r.is(ChangeOperation::Insert, ChangeStatus::Rejected))
}

/// Whether the node must be left out of rendering and of every counter
pub fn is_hidden(node: &Node) -> bool {
    let log = ChangeLog::of(node);
    log.any(|r| r.operation == ChangeOperation::Delete && r.status != ChangeStatus::Rejected)
        || log.any(|r| r.is(ChangeOperation::Insert, ChangeStatus::Rejected))
}

pub fn is_pending(node: &Node) -> bool {
    ChangeLog::of(node).any(|r| r.status == ChangeStatus::Pending)
}

pub fn is_pending_set_attrs(node: &Node) -> bool {
    ChangeLog::of(node).any(|r| r.is(ChangeOperation::SetAttrs, ChangeStatus::Pending))
}

pub fn is_tracked(node: &Node) -> bool {
    !ChangeLog::of(node).is_empty()
}

/// The attributes currently in effect.
///
/// Pending attribute edits are shown optimistically. Otherwise, when the most
/// recently updated `set_attrs` record was rejected, its `oldAttrs` win.
pub fn get_actual_attrs(node: &Node) -> Cow<'_, Attrs> {
    let log = ChangeLog::of(node);
    if log.any(|r| r.is(ChangeOperation::SetAttrs, ChangeStatus::Pending)) {
        return Cow::Borrowed(&node.attrs);
    }

    match log.latest(ChangeOperation::SetAttrs) {
        Some(record) if record.status == ChangeStatus::Rejected => match &record.old_attrs {
            Some(old) => Cow::Owned(old.clone()),
            None => Cow::Borrowed(&node.attrs),
        },
        _ => Cow::Borrowed(&node.attrs),
    }
}

/// Drop keys whose previous and requested values are both empty
pub fn sanitize_attrs_change(new_attrs: &Attrs, current_attrs: &Attrs) -> Attrs {
    new_attrs
        .iter()
        .filter(|(key, value)| {
            let old = current_attrs.get(key.as_str());
            !(is_empty_value(old) && !is_zero(old) && is_empty_value(Some(value)))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

fn is_zero(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Number(n)) if n.as_f64() == Some(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_model::{NodeKind, DATA_TRACKED};
    use serde_json::json;

    fn tracked(records: Value) -> Node {
        Node::new(NodeKind::Paragraph)
            .with_attr("x", 2)
            .with_attr(DATA_TRACKED, records)
    }

    #[test]
    fn test_untracked_node_is_never_hidden() {
        let node = Node::new(NodeKind::Paragraph);
        assert!(!is_hidden(&node));
        assert!(!is_tracked(&node));
        assert!(!is_pending(&node));
    }

    #[test]
    fn test_hidden_matches_deleted_or_rejected_insert() {
        let cases = [
            (json!([{ "operation": "delete", "status": "pending" }]), true),
            (json!([{ "operation": "delete", "status": "accepted" }]), true),
            (json!([{ "operation": "delete", "status": "rejected" }]), false),
            (json!([{ "operation": "insert", "status": "rejected" }]), true),
            (json!([{ "operation": "insert", "status": "pending" }]), false),
            (json!([{ "operation": "explode", "status": "pending" }]), false),
        ];

        for (records, hidden) in cases {
            let node = tracked(records);
            assert_eq!(is_hidden(&node), hidden);
            assert_eq!(
                is_hidden(&node),
                is_deleted(&node) || is_rejected_insert(&node)
            );
        }
    }

    #[test]
    fn test_rejected_set_attrs_rolls_back() {
        let node = tracked(json!([{
            "operation": "set_attrs",
            "status": "rejected",
            "statusUpdateAt": 3,
            "oldAttrs": { "x": 1 }
        }]));

        assert_eq!(get_actual_attrs(&node)["x"], json!(1));
    }

    #[test]
    fn test_pending_set_attrs_is_optimistic() {
        let node = tracked(json!([
            { "operation": "set_attrs", "status": "rejected", "statusUpdateAt": 3, "oldAttrs": { "x": 1 } },
            { "operation": "set_attrs", "status": "pending", "statusUpdateAt": 1, "oldAttrs": { "x": 0 } }
        ]));

        assert!(is_pending_set_attrs(&node));
        assert_eq!(get_actual_attrs(&node)["x"], json!(2));
    }

    #[test]
    fn test_most_recent_set_attrs_decides() {
        let accepted_later = tracked(json!([
            { "operation": "set_attrs", "status": "rejected", "statusUpdateAt": 3, "oldAttrs": { "x": 1 } },
            { "operation": "set_attrs", "status": "accepted", "statusUpdateAt": 7, "oldAttrs": { "x": 5 } }
        ]));
        assert_eq!(get_actual_attrs(&accepted_later)["x"], json!(2));

        let two_rejected = tracked(json!([
            { "operation": "set_attrs", "status": "rejected", "statusUpdateAt": 9, "oldAttrs": { "x": 8 } },
            { "operation": "set_attrs", "status": "rejected", "statusUpdateAt": 4, "oldAttrs": { "x": 1 } }
        ]));
        assert_eq!(get_actual_attrs(&two_rejected)["x"], json!(8));
    }

    #[test]
    fn test_sanitize_attrs_change() {
        let current: Attrs = serde_json::from_value(json!({ "a": "", "b": 0, "c": "x" })).unwrap();
        let new: Attrs =
            serde_json::from_value(json!({ "a": null, "b": 0, "c": "", "d": "", "e": "y" })).unwrap();

        let sanitized = sanitize_attrs_change(&new, &current);
        assert!(!sanitized.contains_key("a"));
        assert!(sanitized.contains_key("b"));
        assert!(sanitized.contains_key("c"));
        assert!(!sanitized.contains_key("d"));
        assert_eq!(sanitized["e"], json!("y"));
    }
}
