//! # Post-Effect System
//!
//! Every dispatched transaction may leave derived document state stale. After
//! the new revision is built, each effect inspects it and may append one
//! untracked transaction of its own:
//!
//! - Cross-reference labels → copied from the freshly numbered targets
//! - Inline footnote contents → rewritten from the footnote label map
//! - Empty sections → given a paragraph so they stay editable
//!
//! Post-effects are:
//! - **Derived**: They only write values computable from the revision itself
//! - **Untracked**: Their edits never become change records
//! - **Convergent**: Running them on their own output appends nothing

use crate::state::EditorState;
use crate::targets::propagate_labels;
use manuscript_model::{Node, NodeKind, Transaction};
use manuscript_track_changes::{effective_child_count, is_hidden, visible_descendants};
use tracing::{debug, warn};

/// Origin of transactions appended by the footnote effects
pub const FOOTNOTES_ORIGIN: &str = "footnotes";

/// Post-effect run after every applied transaction
pub trait PostEffect: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect the new revision and return a follow-up transaction if needed
    fn append(&self, state: &EditorState) -> Option<Transaction>;
}

/// Keep cross-reference labels in sync with target numbering
#[derive(Debug)]
pub struct PropagateCrossReferenceLabels;

impl PostEffect for PropagateCrossReferenceLabels {
    fn name(&self) -> &'static str {
        "propagateCrossReferenceLabels"
    }

    fn append(&self, state: &EditorState) -> Option<Transaction> {
        propagate_labels(&state.doc, &state.targets)
    }
}

/// Rewrite inline footnote `contents` from the current label map
#[derive(Debug)]
pub struct SyncInlineFootnoteContents;

/// Display contents of a marker: one label per rid
fn marker_contents(rids: &[String], old: &str, label: impl Fn(&str) -> Option<usize>) -> String {
    let old_parts: Vec<&str> = old.split(',').collect();
    rids.iter()
        .enumerate()
        .map(|(i, rid)| match label(rid) {
            Some(index) => index.to_string(),
            None => old_parts.get(i).map(|p| p.to_string()).unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl PostEffect for SyncInlineFootnoteContents {
    fn name(&self) -> &'static str {
        "syncInlineFootnoteContents"
    }

    fn append(&self, state: &EditorState) -> Option<Transaction> {
        let updates: Vec<(usize, String)> = state
            .footnotes
            .all_inline_footnotes()
            .filter_map(|(scope, inline)| {
                let labels = state.footnotes.labels(scope);
                let contents = marker_contents(&inline.rids, &inline.contents, |rid| {
                    labels.and_then(|l| l.get(rid)).copied()
                });
                (contents != inline.contents).then_some((inline.pos, contents))
            })
            .collect();

        if updates.is_empty() {
            return None;
        }

        let mut tr = Transaction::new(state.doc.clone());
        tr.skip_tracking().set_origin(FOOTNOTES_ORIGIN);
        for (pos, contents) in &updates {
            if let Err(err) = tr.set_node_attribute(*pos, "contents", contents.as_str()) {
                warn!(pos, error = %err, "Could not update inline footnote contents");
            }
        }
        debug!(updated = updates.len(), "Synced inline footnote contents");
        Some(tr)
    }
}

/// Give sections holding nothing but their title an empty paragraph
#[derive(Debug)]
pub struct EnsureSectionParagraph;

impl PostEffect for EnsureSectionParagraph {
    fn name(&self) -> &'static str {
        "ensureSectionParagraph"
    }

    fn append(&self, state: &EditorState) -> Option<Transaction> {
        let mut ends = Vec::new();
        visible_descendants(&state.doc, |node, pos, _| {
            if node.is(&NodeKind::Section)
                && effective_child_count(node) == 1
                && node
                    .content
                    .iter()
                    .any(|child| child.is(&NodeKind::SectionTitle) && !is_hidden(child))
            {
                ends.push(pos + node.node_size() - 1);
            }
            true
        });

        if ends.is_empty() {
            return None;
        }

        let mut tr = Transaction::new(state.doc.clone());
        tr.skip_tracking();
        for end in ends.into_iter().rev() {
            if let Err(err) = tr.insert(end, Node::new(NodeKind::Paragraph)) {
                warn!(pos = end, error = %err, "Could not add section paragraph");
            }
        }
        Some(tr)
    }
}

/// A transaction appended by a post-effect
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEffect {
    pub effect: &'static str,
    pub steps: usize,
}

/// Post-effect engine that applies all registered effects
#[derive(Debug)]
pub struct PostEffectEngine {
    effects: Vec<Box<dyn PostEffect>>,
}

impl PostEffectEngine {
    /// Create engine with default effects
    pub fn new() -> Self {
        Self {
            effects: vec![
                Box::new(EnsureSectionParagraph),
                Box::new(PropagateCrossReferenceLabels),
                Box::new(SyncInlineFootnoteContents),
            ],
        }
    }

    pub fn with_effects(effects: Vec<Box<dyn PostEffect>>) -> Self {
        Self { effects }
    }

    /// Run effects until none appends, or `max_rounds` passes are used up
    pub fn run(&self, state: &mut EditorState, max_rounds: usize) -> Vec<AppliedEffect> {
        let mut applied = Vec::new();

        for _ in 0..max_rounds {
            let mut changed = false;
            for effect in &self.effects {
                let Some(tr) = effect.append(state) else {
                    continue;
                };
                if !tr.doc_changed() {
                    continue;
                }
                applied.push(AppliedEffect {
                    effect: effect.name(),
                    steps: tr.steps().len(),
                });
                *state = state.apply(tr);
                changed = true;
            }
            if !changed {
                return applied;
            }
        }

        warn!(max_rounds, "Post-effects did not settle");
        applied
    }
}

impl Default for PostEffectEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManuscriptMeta;
    use manuscript_model::DATA_TRACKED;
    use serde_json::json;
    use std::sync::Arc;

    fn state(doc: Node) -> EditorState {
        EditorState::new(doc, Arc::new(ManuscriptMeta::default()))
    }

    fn marker(rids: &[&str], contents: &str) -> Node {
        Node::new(NodeKind::InlineFootnote)
            .with_attr("rids", json!(rids))
            .with_attr("contents", contents)
    }

    fn footnotes(ids: &[&str]) -> Node {
        Node::new(NodeKind::FootnotesSection).with_content(vec![
            Node::new(NodeKind::SectionTitle),
            Node::new(NodeKind::FootnotesElement).with_content(
                ids.iter()
                    .map(|id| {
                        Node::new(NodeKind::Footnote)
                            .with_attr("id", *id)
                            .with_child(Node::new(NodeKind::Paragraph))
                    })
                    .collect(),
            ),
        ])
    }

    #[test]
    fn test_marker_contents_keeps_unresolved_parts() {
        let rids = vec!["a".to_string(), "gone".to_string(), "b".to_string()];
        let contents = marker_contents(&rids, "1,7", |rid| match rid {
            "a" => Some(2),
            "b" => Some(1),
            _ => None,
        });
        assert_eq!(contents, "2,7,1");
    }

    #[test]
    fn test_sync_contents_renumbers_markers() {
        let mut state = state(Node::new(NodeKind::Manuscript).with_content(vec![
            Node::new(NodeKind::Paragraph).with_content(vec![marker(&["b"], "2"), marker(&["a", "b"], "1,2")]),
            footnotes(&["a", "b"]),
        ]));

        let applied = PostEffectEngine::with_effects(vec![Box::new(SyncInlineFootnoteContents)])
            .run(&mut state, 4);
        assert_eq!(
            applied,
            vec![AppliedEffect {
                effect: "syncInlineFootnoteContents",
                steps: 2
            }]
        );

        let contents: Vec<_> = state
            .footnotes
            .inline_footnotes(crate::footnotes::FootnoteScope::Document)
            .iter()
            .map(|i| i.contents.clone())
            .collect();
        assert_eq!(contents, vec!["1", "2,1"]);
        assert!(SyncInlineFootnoteContents.append(&state).is_none());
    }

    #[test]
    fn test_empty_section_gets_paragraph() {
        let deleted_paragraph = Node::new(NodeKind::Paragraph).with_attr(
            DATA_TRACKED,
            json!([{ "operation": "delete", "status": "pending" }]),
        );
        let mut state = state(Node::new(NodeKind::Manuscript).with_content(vec![
            Node::new(NodeKind::Section)
                .with_attr("id", "s1")
                .with_content(vec![Node::new(NodeKind::SectionTitle), deleted_paragraph]),
            Node::new(NodeKind::Section)
                .with_attr("id", "s2")
                .with_child(Node::new(NodeKind::SectionTitle)),
        ]));

        let applied = PostEffectEngine::new().run(&mut state, 4);
        assert_eq!(applied.len(), 1);
        assert_eq!(state.doc.content[0].child_count(), 3);
        assert_eq!(state.doc.content[1].child_count(), 2);
        assert!(state.doc.content[1].content[1].is(&NodeKind::Paragraph));
        assert!(state.doc.content[1].content[1].attr(DATA_TRACKED).is_none());
    }

    #[test]
    fn test_section_with_deleted_title_keeps_its_paragraph() {
        let deleted_title = Node::new(NodeKind::SectionTitle).with_attr(
            DATA_TRACKED,
            json!([{ "operation": "delete", "status": "pending" }]),
        );
        let mut state = state(Node::new(NodeKind::Manuscript).with_child(
            Node::new(NodeKind::Section)
                .with_attr("id", "s1")
                .with_content(vec![
                    deleted_title,
                    Node::new(NodeKind::Paragraph).with_child(Node::text("Body")),
                ]),
        ));

        assert!(EnsureSectionParagraph.append(&state).is_none());
        assert!(PostEffectEngine::new().run(&mut state, 4).is_empty());
        assert_eq!(state.doc.content[0].child_count(), 2);
    }

    #[test]
    fn test_engine_settles_on_consistent_document() {
        let mut state = state(Node::new(NodeKind::Manuscript).with_child(
            Node::new(NodeKind::Paragraph).with_child(Node::text("Plain")),
        ));
        assert!(PostEffectEngine::new().run(&mut state, 4).is_empty());
        assert_eq!(state.version, 0);
    }
}
