//! # Editing Pipeline
//!
//! The single owner of the live document. Every edit flows through one path:
//!
//! ```text
//! Mutation ─► Transaction ─► filters ─► apply ─► post-effects ─► EditorState
//!                 │                                                  │
//!           change tracker                               baseline ─► diff
//! ```
//!
//! The Pipeline manages:
//! - Building transactions, tracked when an author is set
//! - Vetoing transactions through filters
//! - Rebuilding derived state and running post-effects
//! - Diffing the live document against its baseline snapshot

use crate::config::EditorConfig;
use crate::filters::{ProtectGraphicalAbstractTitle, TransactionFilter};
use crate::highlight::MarkerHighlights;
use crate::mutations::{Mutation, MutationResult};
use crate::post_effects::{AppliedEffect, PostEffectEngine};
use crate::state::EditorState;
use crate::targets::BrokenReference;
use crate::{EditorError, EditorResult};
use manuscript_model::{IdGenerator, Node, Selection, Transaction};
use manuscript_track_changes::{diff, diff_json, print, system_clock, Annotator, ChangeTree, Clock};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Manages the full edit → derived state pipeline
pub struct Pipeline {
    state: EditorState,
    baseline: Option<Node>,
    ids: IdGenerator,
    tracker: Option<Arc<Annotator>>,
    clock: Clock,
    filters: Vec<Box<dyn TransactionFilter>>,
    effects: PostEffectEngine,
    highlights: MarkerHighlights,
    config: EditorConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("version", &self.state.version)
            .field("tracking", &self.tracker.as_ref().map(|t| t.author_id()))
            .field("filters", &self.filters)
            .field("effects", &self.effects)
            .finish()
    }
}

impl Pipeline {
    /// Create pipeline for document
    pub fn new(doc: Node, config: EditorConfig) -> Self {
        let ids = IdGenerator::new(doc.id().unwrap_or("manuscript"));
        let state = EditorState::new(doc, Arc::new(config.manuscript.clone()));
        let highlights =
            MarkerHighlights::new(Duration::from_millis(config.highlight_duration_ms));

        Self {
            state,
            baseline: None,
            ids,
            tracker: None,
            clock: system_clock(),
            filters: vec![Box::new(ProtectGraphicalAbstractTitle)],
            effects: PostEffectEngine::new(),
            highlights,
            config,
        }
    }

    /// Snapshot that the change tree is computed against
    pub fn with_baseline(mut self, baseline: Node) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn set_baseline(&mut self, baseline: Option<Node>) {
        self.baseline = baseline;
    }

    pub fn baseline(&self) -> Option<&Node> {
        self.baseline.as_ref()
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn doc(&self) -> &Node {
        &self.state.doc
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn highlights(&self) -> &MarkerHighlights {
        &self.highlights
    }

    /// Track edits as changes authored by `author`, or stop tracking
    pub fn set_tracking(&mut self, author: Option<&str>) {
        self.tracker = author.map(|author| {
            Arc::new(Annotator::with_clock(author, self.clock.clone()))
        });
        info!(author = ?author, "Change tracking updated");
    }

    pub fn is_tracking(&self) -> bool {
        self.tracker.is_some()
    }

    /// Replace the time source of change records and review timestamps
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
        if let Some(tracker) = &self.tracker {
            let author = tracker.author_id().to_string();
            self.tracker = Some(Arc::new(Annotator::with_clock(author, self.clock.clone())));
        }
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.state.selection = selection;
    }

    /// Start a transaction on the current revision
    pub fn transaction(&self) -> Transaction {
        let tr = self.state.transaction();
        match &self.tracker {
            Some(tracker) => tr.with_tracker(tracker.clone()),
            None => tr,
        }
    }

    /// Apply a transaction and everything it triggers
    #[instrument(skip(self, tr), fields(version = self.state.version, steps = tr.steps().len()))]
    pub fn dispatch(&mut self, tr: Transaction) -> EditorResult<DispatchReport> {
        if let Some(filter) = self.filters.iter().find(|f| !f.allows(&tr, &self.state)) {
            warn!(filter = filter.name(), "Transaction rejected");
            return Err(EditorError::Rejected(filter.name()));
        }

        let origin = tr.origin().map(str::to_string);
        let doc_changed = tr.doc_changed();
        let scroll_into_view = tr.is_scroll_into_view();

        let mut state = self.state.apply(tr);
        let appended = if doc_changed {
            self.effects
                .run(&mut state, self.config.max_post_effect_rounds)
        } else {
            Vec::new()
        };

        let broken_references = state.broken_references();
        for broken in &broken_references {
            warn!(rid = %broken.rid, pos = broken.pos, "Cross reference target is missing");
        }

        self.state = state;
        debug!(
            version = self.state.version,
            appended = appended.len(),
            "Dispatched transaction"
        );

        Ok(DispatchReport {
            version: self.state.version,
            doc_changed,
            origin,
            scroll_into_view,
            appended,
            broken_references,
        })
    }

    /// Apply a mutation as one transaction
    pub fn apply_mutation(&mut self, mutation: Mutation) -> EditorResult<MutationResult> {
        let started = Instant::now();
        let cleared = self.highlights.clear_expired(started);
        if cleared > 0 {
            debug!(cleared, "Cleared expired marker highlights");
        }

        let mut tr = self.transaction();
        let now = (self.clock)();
        let created_id = mutation.apply(&mut tr, &self.state, &mut self.ids, now)?;

        let focused = match &mutation {
            Mutation::FocusFootnoteMarker { id } => {
                let referenced = !self
                    .state
                    .footnotes
                    .inline_footnotes_referencing(id)
                    .is_empty();
                referenced.then(|| id.clone())
            }
            _ => None,
        };

        let report = self.dispatch(tr)?;
        if let Some(id) = focused {
            self.highlights.highlight(&id, started);
        }

        info!(
            mutation = mutation.name(),
            version = report.version,
            created = ?created_id,
            "Applied mutation"
        );
        Ok(MutationResult {
            version: report.version,
            created_id,
            report,
        })
    }

    /// Structural changes of the live document since the baseline
    pub fn change_tree(&self) -> ChangeTree {
        diff(
            self.baseline.as_ref(),
            &self.state.doc,
            &self.config.diff_options(),
        )
    }

    pub fn print_changes(&self) -> String {
        print(&self.change_tree())
    }

    /// Diff the live document against a serialized snapshot
    pub fn diff_against_json(&self, original: &Value) -> EditorResult<ChangeTree> {
        let current = self.state.doc.to_json();
        Ok(diff_json(
            Some(original),
            &current,
            &self.config.diff_options(),
        )?)
    }

    /// Drop expired marker highlights
    pub fn clear_expired_highlights(&mut self, now: Instant) -> usize {
        self.highlights.clear_expired(now)
    }
}

/// Outcome of one dispatch
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub version: u64,
    pub doc_changed: bool,
    pub origin: Option<String>,
    pub scroll_into_view: bool,
    /// Transactions appended by post-effects, in order
    pub appended: Vec<AppliedEffect>,
    pub broken_references: Vec<BrokenReference>,
}
