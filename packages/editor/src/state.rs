//! # Editor State
//!
//! One immutable revision of the document together with everything derived
//! from it. Derived views are rebuilt from scratch on every applied
//! transaction and never patched in place.

use crate::config::ManuscriptMeta;
use crate::footnotes::FootnotesState;
use crate::targets::{find_broken_references, BrokenReference, Targets};
use manuscript_model::{Node, Selection, Transaction};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EditorState {
    pub doc: Node,
    pub selection: Selection,
    pub targets: Targets,
    pub footnotes: FootnotesState,
    /// Incremented once per applied transaction
    pub version: u64,
    meta: Arc<ManuscriptMeta>,
}

impl EditorState {
    pub fn new(doc: Node, meta: Arc<ManuscriptMeta>) -> Self {
        let targets = Targets::build(&doc, &meta);
        let footnotes = FootnotesState::build(&doc);
        Self {
            doc,
            selection: Selection::cursor(0),
            targets,
            footnotes,
            version: 0,
            meta,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn meta(&self) -> &ManuscriptMeta {
        &self.meta
    }

    /// Fresh transaction on the current revision.
    ///
    /// The selection is mapped through its steps unless one is set explicitly.
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.doc.clone())
    }

    /// Produce the next revision
    pub fn apply(&self, tr: Transaction) -> EditorState {
        let selection = tr
            .selection()
            .unwrap_or_else(|| self.selection.map(tr.mapping()));
        let doc = tr.into_doc();
        let targets = Targets::build(&doc, &self.meta);
        let footnotes = FootnotesState::build(&doc);

        EditorState {
            doc,
            selection,
            targets,
            footnotes,
            version: self.version + 1,
            meta: self.meta.clone(),
        }
    }

    pub fn broken_references(&self) -> Vec<BrokenReference> {
        find_broken_references(&self.doc)
    }
}
