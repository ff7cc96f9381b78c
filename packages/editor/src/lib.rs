//! # Manuscript Editor
//!
//! Editing core of the manuscript editor: one pipeline that applies
//! transactions and keeps footnote numbering and cross-reference labels
//! consistent with the (change-tracked) document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: document tree, positions, transactions│
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ track-changes: change records, visibility,  │
//! │ review, snapshot diff                       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: Pipeline + mutations                │
//! │  - Footnote numbering and commands          │
//! │  - Cross-reference targets and labels       │
//! │  - Post-effects and transaction filters     │
//! │  - Debounced statistics worker              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Document is source of truth**: targets, footnote labels and change
//!    trees are derived views rebuilt for every revision
//! 2. **Hidden means absent**: deleted and rejected content is skipped by
//!    every numbering pass
//! 3. **Derived edits are untracked**: only authored edits become changes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use manuscript_editor::{EditorConfig, FootnoteKind, Mutation, Pipeline};
//!
//! let mut pipeline = Pipeline::new(doc, EditorConfig::default()).with_baseline(original);
//! pipeline.set_tracking(Some("MPUserProfile:alice"));
//!
//! pipeline.apply_mutation(Mutation::InsertInlineFootnote {
//!     kind: FootnoteKind::Footnote,
//! })?;
//!
//! println!("{}", pipeline.print_changes());
//! ```

mod config;
mod errors;
pub mod filters;
pub mod footnotes;
mod highlight;
mod mutations;
mod pipeline;
pub mod post_effects;
mod state;
pub mod statistics;
pub mod targets;

pub use config::{EditorConfig, ManuscriptMeta, DEFAULT_CONFIG_NAME};
pub use errors::{EditorError, EditorResult};
pub use filters::{ProtectGraphicalAbstractTitle, TransactionFilter};
pub use footnotes::{FootnoteKind, FootnoteScope, FootnotesState};
pub use highlight::MarkerHighlights;
pub use mutations::{Mutation, MutationError, MutationResult};
pub use pipeline::{DispatchReport, Pipeline};
pub use post_effects::{AppliedEffect, PostEffect, PostEffectEngine};
pub use state::EditorState;
pub use statistics::{StatisticsReport, StatisticsWorker};
pub use targets::{BrokenReference, Target, TargetCategory, Targets};

// Re-export common types for convenience
pub use manuscript_model::{Node, NodeKind, Selection, Transaction};
pub use manuscript_track_changes::{ChangeStatus, ChangeTree};
