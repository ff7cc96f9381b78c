//! Transaction filters.
//!
//! Filters run before a transaction is applied and may veto it as a whole.

use crate::state::EditorState;
use manuscript_model::{Node, NodeKind, Transaction};
use std::collections::HashMap;
use tracing::debug;

pub trait TransactionFilter: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `tr`, started on `state`, may be applied
    fn allows(&self, tr: &Transaction, state: &EditorState) -> bool;
}

/// Graphical abstract section titles are fixed; the section itself may go
#[derive(Debug)]
pub struct ProtectGraphicalAbstractTitle;

fn graphical_abstract_titles(doc: &Node) -> HashMap<String, String> {
    doc.find_children_of_kind(&NodeKind::GraphicalAbstractSection)
        .into_iter()
        .filter_map(|found| {
            let id = found.node.id()?;
            let title = found
                .node
                .content
                .iter()
                .find(|child| child.is(&NodeKind::SectionTitle))
                .map(Node::text_content)
                .unwrap_or_default();
            Some((id.to_string(), title))
        })
        .collect()
}

impl TransactionFilter for ProtectGraphicalAbstractTitle {
    fn name(&self) -> &'static str {
        "protectGraphicalAbstractTitle"
    }

    fn allows(&self, tr: &Transaction, state: &EditorState) -> bool {
        if !tr.doc_changed() {
            return true;
        }

        let before = graphical_abstract_titles(&state.doc);
        if before.is_empty() {
            return true;
        }

        let after = graphical_abstract_titles(tr.doc());
        let changed = before
            .iter()
            .any(|(id, title)| after.get(id).is_some_and(|new_title| new_title != title));
        if changed {
            debug!("Rejecting graphical abstract title edit");
        }
        !changed
    }
}
