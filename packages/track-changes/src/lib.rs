//! # Manuscript Track Changes
//!
//! Authored edits become reviewable change records instead of destructive
//! mutations.
//!
//! ## Architecture
//!
//! ```text
//! Transaction ──► Annotator ──► dataTracked records
//!                                     │
//!              ┌──────────────────────┼──────────────────────┐
//!              ▼                      ▼                      ▼
//!         predicates            visibility              review
//!    (is_hidden, actual      (status + classes,    (set status, finalize)
//!        attributes)          hidden subtrees)
//!
//! original snapshot ─┐
//!                    ├──► diff ──► ChangeTree ──► print
//! current document ──┘
//! ```

pub mod annotator;
pub mod diff;
pub mod predicates;
pub mod record;
pub mod review;
pub mod visibility;

pub use annotator::{mark_delete, mark_insert, mark_set_attrs, system_clock, Annotator, Clock};
pub use diff::{diff, diff_json, print, ChangeTree, DiffError, DiffOptions};
pub use predicates::{
    get_actual_attrs, is_deleted, is_hidden, is_pending, is_pending_insert, is_pending_set_attrs,
    is_rejected_insert, is_tracked, sanitize_attrs_change,
};
pub use record::{ChangeLog, ChangeOperation, ChangeRecord, ChangeStatus};
pub use review::{finalize_review, set_change_status};
pub use visibility::{
    change_classes, effective_child_count, effective_list_depth, resolve_document, resolve_node,
    track_status, visible_descendants, NodeStatus, ResolvedNode, TrackStatus, Visibility,
};
