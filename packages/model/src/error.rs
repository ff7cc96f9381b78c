use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

/// Structural failures reported by the document tree.
///
/// Data-shape anomalies (odd attribute values, malformed tracking records) are
/// never reported through this type; callers fall back to defaults for those.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Position {pos} out of range (document content size {size})")]
    PositionOutOfRange { pos: usize, size: usize },

    #[error("Position {pos} does not point at a node")]
    NoNodeAt { pos: usize },

    #[error("Invalid delete range {from}..{to}: {reason}")]
    InvalidRange {
        from: usize,
        to: usize,
        reason: String,
    },

    #[error("Cannot insert into leaf node '{kind}' at {pos}")]
    LeafInsertion { pos: usize, kind: String },

    #[error("Invalid document JSON: {0}")]
    Json(String),
}

impl ModelError {
    pub fn invalid_range(from: usize, to: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            from,
            to,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::Json(e.to_string())
    }
}
