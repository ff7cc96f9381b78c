//! # Change Diff Engine
//!
//! Structural diff between an original snapshot and the live document.
//!
//! Siblings are matched by identity: `attrs.id` when the node has one, its
//! index among its siblings otherwise. Matched nodes that left the longest
//! in-order run, or that changed parent, are reported once as moved. Text
//! leaves get a character-level diff.
//!
//! The engine is a pure function over two snapshots and never touches either
//! of them.

mod change_tree;
mod engine;
mod print;
mod text;

pub use change_tree::{AttrDelta, ChangeNode, ChangeTree, Delta, NodeKey};
pub use print::print;
pub use text::{diff_text, TextDelta, TextOp};

use manuscript_model::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum DiffError {
    #[error("Invalid {side} document: {source}")]
    InvalidDocument {
        side: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOptions {
    /// Texts shorter than this are reported as a whole replacement
    #[serde(default = "default_text_diff_min_length")]
    pub text_diff_min_length: usize,

    #[serde(default = "default_detect_moves")]
    pub detect_moves: bool,
}

fn default_text_diff_min_length() -> usize {
    1
}

fn default_detect_moves() -> bool {
    true
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            text_diff_min_length: default_text_diff_min_length(),
            detect_moves: default_detect_moves(),
        }
    }
}

/// Diff two snapshots. Without a baseline every top-level node is added.
#[instrument(skip_all)]
pub fn diff(original: Option<&Node>, current: &Node, options: &DiffOptions) -> ChangeTree {
    let Some(original) = original else {
        debug!("No baseline, reporting the whole document as added");
        return engine::all_added(current);
    };

    let tree = engine::Differ::new(original, current, options).diff(original, current);
    debug!(deltas = tree.deltas().len(), "Diff complete");
    tree
}

/// Diff two documents in their JSON form
pub fn diff_json(
    original: Option<&Value>,
    current: &Value,
    options: &DiffOptions,
) -> Result<ChangeTree, DiffError> {
    let original = original
        .map(Node::from_json)
        .transpose()
        .map_err(|source| DiffError::InvalidDocument {
            side: "original",
            source,
        })?;
    let current = Node::from_json(current).map_err(|source| DiffError::InvalidDocument {
        side: "current",
        source,
    })?;

    Ok(diff(original.as_ref(), &current, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_model::NodeKind;
    use serde_json::json;

    fn paragraph(id: &str, text: &str) -> Node {
        Node::new(NodeKind::Paragraph)
            .with_attr("id", id)
            .with_child(Node::text(text))
    }

    fn section(id: &str, content: Vec<Node>) -> Node {
        Node::new(NodeKind::Section)
            .with_attr("id", id)
            .with_content(content)
    }

    fn doc(sections: Vec<Node>) -> Node {
        Node::new(NodeKind::Manuscript)
            .with_attr("id", "m")
            .with_content(sections)
    }

    fn id(key: &str) -> NodeKey {
        NodeKey::Id(key.to_string())
    }

    #[test]
    fn test_identical_documents_have_no_deltas() {
        let d = doc(vec![section("s1", vec![paragraph("p1", "Hello")])]);
        let tree = diff(Some(&d), &d.clone(), &DiffOptions::default());
        assert!(tree.is_empty());
        assert!(tree.deltas().is_empty());
    }

    #[test]
    fn test_text_change_is_one_modification() {
        let original = doc(vec![section(
            "s1",
            vec![paragraph("p1", "Hello"), paragraph("p2", "World")],
        )]);
        let current = doc(vec![section(
            "s1",
            vec![paragraph("p1", "Help"), paragraph("p2", "World")],
        )]);

        let tree = diff(Some(&original), &current, &DiffOptions::default());
        let deltas = tree.deltas();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].key, NodeKey::Index(0));
        assert_eq!(deltas[0].kind, NodeKind::Text);
        assert_eq!(deltas[0].delta, Some(Delta::Modified));
        assert_eq!(deltas[0].pos, Some(2));
        assert_eq!(deltas[0].text.as_ref().unwrap().new_text(), "Help");

        let paragraph = tree.find(&id("p1")).unwrap();
        assert!(paragraph.delta.is_none());
        assert!(tree.find(&id("p2")).is_none());
    }

    #[test]
    fn test_reorder_is_a_single_move() {
        let original = doc(vec![
            section("a", vec![]),
            section("b", vec![]),
            section("c", vec![]),
        ]);
        let current = doc(vec![
            section("c", vec![]),
            section("a", vec![]),
            section("b", vec![]),
        ]);

        let tree = diff(Some(&original), &current, &DiffOptions::default());
        let deltas = tree.deltas();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].key, id("c"));
        assert_eq!(
            deltas[0].delta,
            Some(Delta::Moved {
                from: 2,
                to: 0,
                from_parent: None
            })
        );
        assert_eq!(deltas[0].pos, Some(0));
    }

    #[test]
    fn test_cross_parent_move_collapses() {
        let original = doc(vec![
            section("s1", vec![paragraph("p1", "Moving")]),
            section("s2", vec![]),
        ]);
        let current = doc(vec![
            section("s1", vec![]),
            section("s2", vec![paragraph("p1", "Moving")]),
        ]);

        let tree = diff(Some(&original), &current, &DiffOptions::default());
        let deltas = tree.deltas();
        assert_eq!(deltas.len(), 1);
        assert_eq!(
            deltas[0].delta,
            Some(Delta::Moved {
                from: 0,
                to: 0,
                from_parent: Some(id("s1"))
            })
        );
    }

    #[test]
    fn test_move_into_added_section_keeps_removal() {
        let original = doc(vec![section(
            "s1",
            vec![paragraph("p1", "Moving"), paragraph("p2", "Staying")],
        )]);
        let current = doc(vec![
            section("s1", vec![paragraph("p2", "Staying")]),
            section("s2", vec![paragraph("p1", "Moving")]),
        ]);

        let tree = diff(Some(&original), &current, &DiffOptions::default());
        let s1 = tree.find(&id("s1")).unwrap();
        assert_eq!(s1.delta, None);
        assert_eq!(s1.children.len(), 1);
        assert_eq!(s1.children[0].key, id("p1"));
        assert_eq!(s1.children[0].delta, Some(Delta::Removed));
        assert_eq!(tree.find(&id("s2")).unwrap().delta, Some(Delta::Added));
        assert_eq!(tree.deltas().len(), 2);
    }

    #[test]
    fn test_move_out_of_removed_section() {
        let original = doc(vec![
            section("s1", vec![paragraph("p1", "Moving")]),
            section("s2", vec![]),
        ]);
        let current = doc(vec![section("s2", vec![paragraph("p1", "Moving")])]);

        let tree = diff(Some(&original), &current, &DiffOptions::default());
        let deltas = tree.deltas();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].key, id("p1"));
        assert_eq!(
            deltas[0].delta,
            Some(Delta::Moved {
                from: 0,
                to: 0,
                from_parent: Some(id("s1"))
            })
        );
        assert_eq!(deltas[1].key, id("s1"));
        assert_eq!(deltas[1].delta, Some(Delta::Removed));
    }

    #[test]
    fn test_move_into_retyped_parent_keeps_removal() {
        let original = doc(vec![
            section("s1", vec![paragraph("p1", "Moving")]),
            section("s2", vec![]),
        ]);
        let current = doc(vec![
            section("s1", vec![]),
            Node::new(NodeKind::BibliographySection)
                .with_attr("id", "s2")
                .with_child(paragraph("p1", "Moving")),
        ]);

        let tree = diff(Some(&original), &current, &DiffOptions::default());
        let p1 = tree.find(&id("p1")).unwrap();
        assert_eq!(p1.delta, Some(Delta::Removed));
        assert_eq!(p1.pos, None);

        let s2: Vec<_> = tree
            .deltas()
            .into_iter()
            .filter(|entry| entry.key == id("s2"))
            .map(|entry| entry.delta.clone())
            .collect();
        assert_eq!(s2, vec![Some(Delta::Added), Some(Delta::Removed)]);
    }

    #[test]
    fn test_moves_disabled_reports_add_and_remove() {
        let original = doc(vec![section("a", vec![]), section("b", vec![])]);
        let current = doc(vec![section("b", vec![]), section("a", vec![])]);
        let options = DiffOptions {
            detect_moves: false,
            ..Default::default()
        };

        let tree = diff(Some(&original), &current, &options);
        let symbols: Vec<char> = tree
            .deltas()
            .iter()
            .filter_map(|n| n.delta.as_ref().map(Delta::symbol))
            .collect();
        assert_eq!(symbols, vec!['+', '-']);
    }

    #[test]
    fn test_added_removed_and_attrs() {
        let original = doc(vec![
            section("s1", vec![]).with_attr("category", "intro"),
            section("s2", vec![]),
        ]);
        let current = doc(vec![
            section("s1", vec![]).with_attr("category", "methods"),
            section("s3", vec![]),
        ]);

        let tree = diff(Some(&original), &current, &DiffOptions::default());
        let s1 = tree.find(&id("s1")).unwrap();
        assert_eq!(s1.delta, Some(Delta::Modified));
        assert_eq!(
            s1.attrs,
            vec![AttrDelta {
                key: "category".into(),
                old: Some(json!("intro")),
                new: Some(json!("methods")),
            }]
        );
        assert_eq!(tree.find(&id("s3")).unwrap().delta, Some(Delta::Added));
        let removed = tree.find(&id("s2")).unwrap();
        assert_eq!(removed.delta, Some(Delta::Removed));
        assert_eq!(removed.pos, None);
    }

    #[test]
    fn test_kind_change_is_remove_and_add() {
        let original = doc(vec![Node::new(NodeKind::Paragraph).with_attr("id", "x")]);
        let current = doc(vec![Node::new(NodeKind::Section).with_attr("id", "x")]);

        let tree = diff(Some(&original), &current, &DiffOptions::default());
        let deltas: Vec<_> = tree
            .deltas()
            .iter()
            .map(|n| (n.kind.clone(), n.delta.clone()))
            .collect();
        assert_eq!(
            deltas,
            vec![
                (NodeKind::Section, Some(Delta::Added)),
                (NodeKind::Paragraph, Some(Delta::Removed)),
            ]
        );
    }

    #[test]
    fn test_missing_baseline_is_all_added() {
        let current = doc(vec![section("s1", vec![]), section("s2", vec![])]);
        let tree = diff(None, &current, &DiffOptions::default());
        let deltas = tree.deltas();
        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|n| n.delta == Some(Delta::Added)));
        assert_eq!(deltas[1].pos, Some(2));
    }

    #[test]
    fn test_diff_json_reports_invalid_input() {
        let err = diff_json(None, &json!({ "content": [] }), &DiffOptions::default()).unwrap_err();
        assert!(err.to_string().starts_with("Invalid current document"));

        let tree = diff_json(
            None,
            &json!({ "type": "manuscript", "content": [{ "type": "paragraph" }] }),
            &DiffOptions::default(),
        )
        .unwrap();
        assert_eq!(tree.deltas().len(), 1);
    }

    #[test]
    fn test_print_lists_changes() {
        let original = doc(vec![section("s1", vec![paragraph("p1", "Hello")])]);
        let current = doc(vec![section("s1", vec![paragraph("p1", "Help")])]);
        let printed = print(&diff(Some(&original), &current, &DiffOptions::default()));

        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines[0], "· manuscript [m]");
        assert_eq!(lines[1], "  · section [s1] @0");
        assert_eq!(lines[2], "    · paragraph [p1] @1");
        assert_eq!(lines[3], "      ~ text [$$index:0] @2 \"Hel[-lo-]{+p+}\"");
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: DiffOptions = serde_json::from_value(json!({ "detectMoves": false })).unwrap();
        assert_eq!(options.text_diff_min_length, 1);
        assert!(!options.detect_moves);
    }
}
