//! Tracked editing from first keystroke to finalized review

use manuscript_model::{Node, NodeKind, Transaction};
use manuscript_track_changes::{
    diff, finalize_review, get_actual_attrs, is_hidden, resolve_document, set_change_status,
    Annotator, ChangeLog, ChangeOperation, ChangeStatus, DiffOptions,
};
use serde_json::json;
use std::sync::Arc;

fn manuscript() -> Node {
    // 0 <section> 1 <paragraph> 2 Intro 7 </paragraph> 8 <figure_element> 9 </figure_element> 10 </section> 11
    Node::new(NodeKind::Manuscript).with_attr("id", "m").with_child(
        Node::new(NodeKind::Section)
            .with_attr("id", "s1")
            .with_content(vec![
                Node::new(NodeKind::Paragraph)
                    .with_attr("id", "p1")
                    .with_child(Node::text("Intro")),
                Node::new(NodeKind::FigureElement).with_attr("id", "f1"),
            ]),
    )
}

fn annotator() -> Arc<Annotator> {
    Arc::new(Annotator::with_clock("reviewer", Arc::new(|| 100)))
}

fn change_ids(doc: &Node) -> Vec<(String, ChangeOperation)> {
    let mut ids = Vec::new();
    doc.descendants(|node, _, _| {
        for record in ChangeLog::of(node).iter() {
            ids.push((record.id.clone(), record.operation));
        }
        true
    });
    ids
}

#[test]
fn test_tracked_edits_then_mixed_review() {
    let original = manuscript();
    let mut tr = Transaction::new(original.clone()).with_tracker(annotator());
    tr.insert(
        8,
        Node::new(NodeKind::Paragraph)
            .with_attr("id", "p2")
            .with_child(Node::text("Added")),
    )
    .unwrap();
    tr.delete(1, 8).unwrap();
    tr.set_node_attribute(15, "label", "Figure 9").unwrap();
    let edited = tr.into_doc();

    // Nothing is removed while changes are pending
    assert_eq!(edited.content[0].child_count(), 3);
    assert!(is_hidden(&edited.content[0].content[0]));
    assert_eq!(change_ids(&edited).len(), 3);

    let resolved = resolve_document(&edited);
    let hidden: Vec<_> = resolved
        .iter()
        .filter(|n| n.status.is_hidden())
        .map(|n| n.node.kind.clone())
        .collect();
    assert_eq!(hidden, vec![NodeKind::Paragraph, NodeKind::Text]);

    let by_op = |op: ChangeOperation| {
        change_ids(&edited)
            .into_iter()
            .filter(|(_, o)| *o == op)
            .map(|(id, _)| id)
            .collect::<Vec<_>>()
    };

    // Accept the insert and the delete, reject the label change
    let mut accepted = by_op(ChangeOperation::Insert);
    accepted.extend(by_op(ChangeOperation::Delete));
    let doc = set_change_status(&edited, &accepted, ChangeStatus::Accepted, 200)
        .unwrap()
        .into_doc();
    let doc = set_change_status(&doc, &by_op(ChangeOperation::SetAttrs), ChangeStatus::Rejected, 300)
        .unwrap()
        .into_doc();
    assert!(get_actual_attrs(&doc.content[0].content[2]).get("label").is_none());

    let finalized = finalize_review(&doc).unwrap().into_doc();
    let section = &finalized.content[0];
    let ids: Vec<_> = section.content.iter().filter_map(Node::id).collect();
    assert_eq!(ids, vec!["p2", "f1"]);
    assert!(change_ids(&finalized).is_empty());
    assert!(section.content[1].attr("label").is_none());

    // The finalized document differs from the original by exactly the review outcome
    let tree = diff(Some(&original), &finalized, &DiffOptions::default());
    let summary: Vec<_> = tree
        .deltas()
        .iter()
        .map(|n| (n.key.to_string(), n.delta.as_ref().map(|d| d.symbol())))
        .collect();
    assert_eq!(
        summary,
        vec![("p2".to_string(), Some('+')), ("p1".to_string(), Some('-'))]
    );
}

#[test]
fn test_rejected_insert_is_removed_on_finalize() {
    let mut tr = Transaction::new(manuscript()).with_tracker(annotator());
    tr.insert(10, Node::new(NodeKind::Paragraph).with_attr("id", "late"))
        .unwrap();
    let edited = tr.into_doc();

    let ids: Vec<_> = change_ids(&edited).into_iter().map(|(id, _)| id).collect();
    let rejected = set_change_status(&edited, &ids, ChangeStatus::Rejected, 5)
        .unwrap()
        .into_doc();
    assert!(is_hidden(&rejected.content[0].content[2]));

    let finalized = finalize_review(&rejected).unwrap().into_doc();
    assert_eq!(finalized, manuscript());
}

#[test]
fn test_json_snapshots() {
    let original = json!({
        "type": "manuscript",
        "attrs": { "id": "m" },
        "content": [
            { "type": "paragraph", "attrs": { "id": "p1" }, "content": [{ "type": "text", "text": "Alpha" }] },
            { "type": "unknown_widget", "attrs": { "id": "w1" } }
        ]
    });
    let mut current = original.clone();
    current["content"][0]["content"][0]["text"] = json!("Alpha beta");

    let tree = manuscript_track_changes::diff_json(Some(&original), &current, &DiffOptions::default())
        .unwrap();
    let deltas = tree.deltas();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].text.as_ref().unwrap().old_text(), "Alpha");
}
