//! # Manuscript Model
//!
//! The document tree the editing core operates on.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: tree, positions, transactions        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ track-changes: annotate, resolve, diff      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: footnotes, labels, pipeline         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Documents are plain values: every edit goes through a [`Transaction`]
//! that works on its own copy and hands the result back to whoever owns the
//! current state.

mod error;
mod id_generator;
mod mapping;
mod node;
mod position;
mod transaction;
mod transform;

pub use error::{ModelError, ModelResult};
pub use id_generator::{get_document_id, IdGenerator, ObjectType};
pub use mapping::{Assoc, Mapping, StepMap};
pub use node::{Attrs, Mark, Node, NodeKind, DATA_TRACKED};
pub use position::{Ancestor, NodeWithPos, ResolvedPos};
pub use transaction::{ChangeTracker, Selection, Step, Transaction};
