//! Error types for the editor

use manuscript_model::ModelError;
use manuscript_track_changes::DiffError;
use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Document error: {0}")]
    Model(#[from] ModelError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::mutations::MutationError),

    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("Transaction rejected by {0}")]
    Rejected(&'static str),
}
