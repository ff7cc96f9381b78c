//! # Mutations
//!
//! Serializable editing commands. A mutation declares its intent; applying it
//! records the corresponding steps on a transaction that the pipeline then
//! dispatches as one unit.
//!
//! ## Semantics
//!
//! ### Structural edits
//! - `InsertNode`, `DeleteRange` and `SetNodeAttrs` go through the
//!   transaction's change tracker when tracking is on
//! - `SetNodeAttrs` merges into the current attributes and drops keys that
//!   would only turn one empty value into another
//!
//! ### Footnotes
//! - Insertion numbers the new footnote from the cursor position and keeps
//!   the footnotes element in display order
//! - Deletion cleans up markers and empty containers in the same transaction
//!
//! ### Review
//! - Status changes and finalization are never tracked themselves

use crate::footnotes::{self, FootnoteKind};
use crate::state::EditorState;
use manuscript_model::{IdGenerator, ModelError, Node, NodeKind, Transaction};
use manuscript_track_changes::{finalize_review, sanitize_attrs_change, set_change_status, ChangeStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mutation {
    /// Insert a node at a position
    InsertNode { pos: usize, node: Node },

    /// Delete whole sibling nodes, or text within one text node
    DeleteRange { from: usize, to: usize },

    /// Merge attributes into the node at `pos`
    SetNodeAttrs { pos: usize, attrs: Map<String, Value> },

    /// Insert a footnote referenced from the current selection
    InsertInlineFootnote {
        #[serde(default)]
        kind: FootnoteKind,
    },

    /// Insert a footnote numbered within one table element
    #[serde(rename_all = "camelCase")]
    InsertTableFootnote {
        table_pos: usize,
        #[serde(default)]
        inline_footnote_pos: Option<usize>,
    },

    /// Delete a footnote with its references
    DeleteFootnote { id: String },

    /// Select and highlight the first marker of a footnote
    FocusFootnoteMarker { id: String },

    /// Accept or reject change records
    #[serde(rename_all = "camelCase")]
    SetChangeStatus {
        change_ids: Vec<String>,
        status: ChangeStatus,
    },

    /// Apply every reviewed change to the document
    FinalizeReview,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("No node at position {pos}")]
    NodeNotFound { pos: usize },

    #[error("Expected {expected} at position {pos}, found {found}")]
    UnexpectedNode {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Footnote not found: {0}")]
    FootnoteNotFound(String),

    #[error("Selection at {pos} is outside the table")]
    SelectionOutsideTable { pos: usize },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::InsertNode { .. } => "insertNode",
            Mutation::DeleteRange { .. } => "deleteRange",
            Mutation::SetNodeAttrs { .. } => "setNodeAttrs",
            Mutation::InsertInlineFootnote { .. } => "insertInlineFootnote",
            Mutation::InsertTableFootnote { .. } => "insertTableFootnote",
            Mutation::DeleteFootnote { .. } => "deleteFootnote",
            Mutation::FocusFootnoteMarker { .. } => "focusFootnoteMarker",
            Mutation::SetChangeStatus { .. } => "setChangeStatus",
            Mutation::FinalizeReview => "finalizeReview",
        }
    }

    /// Record the mutation on `tr`, a transaction started on `state`.
    ///
    /// Review mutations replace `tr` with an untracked transaction. Returns the
    /// id of a created footnote, if any.
    pub fn apply(
        &self,
        tr: &mut Transaction,
        state: &EditorState,
        ids: &mut IdGenerator,
        now: i64,
    ) -> Result<Option<String>, MutationError> {
        self.validate(state)?;

        match self {
            Mutation::InsertNode { pos, node } => {
                tr.insert(*pos, node.clone())?;
                Ok(None)
            }

            Mutation::DeleteRange { from, to } => {
                tr.delete(*from, *to)?;
                Ok(None)
            }

            Mutation::SetNodeAttrs { pos, attrs } => {
                let node = state
                    .doc
                    .node_at(*pos)
                    .ok_or(MutationError::NodeNotFound { pos: *pos })?;
                let mut merged = node.attrs.clone();
                merged.extend(sanitize_attrs_change(attrs, &node.attrs));
                tr.set_node_attrs(*pos, merged)?;
                Ok(None)
            }

            Mutation::InsertInlineFootnote { kind } => {
                footnotes::insert_inline_footnote(tr, state, ids, *kind).map(Some)
            }

            Mutation::InsertTableFootnote {
                table_pos,
                inline_footnote_pos,
            } => footnotes::insert_table_footnote(tr, state, ids, *table_pos, *inline_footnote_pos)
                .map(Some),

            Mutation::DeleteFootnote { id } => {
                footnotes::delete_footnote(tr, state, id)?;
                Ok(None)
            }

            Mutation::FocusFootnoteMarker { id } => {
                footnotes::focus_footnote_marker(tr, state, id)?;
                Ok(None)
            }

            Mutation::SetChangeStatus { change_ids, status } => {
                *tr = set_change_status(&state.doc, change_ids, *status, now)?;
                Ok(None)
            }

            Mutation::FinalizeReview => {
                *tr = finalize_review(&state.doc)?;
                Ok(None)
            }
        }
    }

    /// Validate without applying
    pub fn validate(&self, state: &EditorState) -> Result<(), MutationError> {
        let size = state.doc.content_size();
        match self {
            Mutation::InsertNode { pos, .. } => {
                state.doc.resolve(*pos)?;
                Ok(())
            }

            Mutation::DeleteRange { from, to } => {
                if from > to || *to > size {
                    return Err(ModelError::invalid_range(*from, *to, "outside the document").into());
                }
                Ok(())
            }

            Mutation::SetNodeAttrs { pos, .. } => {
                state
                    .doc
                    .node_at(*pos)
                    .ok_or(MutationError::NodeNotFound { pos: *pos })?;
                Ok(())
            }

            Mutation::InsertTableFootnote { table_pos, .. } => {
                let node = state
                    .doc
                    .node_at(*table_pos)
                    .ok_or(MutationError::NodeNotFound { pos: *table_pos })?;
                match node.kind {
                    NodeKind::TableElement => Ok(()),
                    _ => Err(MutationError::UnexpectedNode {
                        pos: *table_pos,
                        expected: NodeKind::TableElement.to_string(),
                        found: node.kind.to_string(),
                    }),
                }
            }

            Mutation::DeleteFootnote { id } => {
                state
                    .footnotes
                    .for_footnote(id)
                    .ok_or_else(|| MutationError::FootnoteNotFound(id.clone()))?;
                Ok(())
            }

            Mutation::InsertInlineFootnote { .. }
            | Mutation::FocusFootnoteMarker { .. }
            | Mutation::SetChangeStatus { .. }
            | Mutation::FinalizeReview => Ok(()),
        }
    }
}

/// Result of applying a mutation through the pipeline
#[derive(Debug, Clone)]
pub struct MutationResult {
    /// New version number
    pub version: u64,

    /// Id of the footnote created by the mutation
    pub created_id: Option<String>,

    pub report: crate::pipeline::DispatchReport,
}
