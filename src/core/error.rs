//! Core capability errors (parsing, classification, history invariants).
//!
//! These are bounded and stable: they represent domain/refusal states, not
//! library implementation details. A classification or history error means
//! the blob is recorded as rejected; it never unwinds the pipeline.

use thiserror::Error;

use crate::error::{Effect, Transience};

use super::identity::BlobRef;

/// Invalid identifier.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum InvalidId {
    #[error("blob ref `{raw}` is invalid: {reason}")]
    BlobRef { raw: String, reason: String },
    #[error("user id `{raw}` is invalid: {reason}")]
    User { raw: String, reason: String },
}

/// Invalid permission action string.
#[derive(Debug, Error, Clone)]
#[error("permission action `{raw}` is invalid")]
pub struct InvalidPermAction {
    pub raw: String,
}

/// Why a schema blob failed classification.
///
/// Every variant is a MalformedBlob in the pipeline's taxonomy: the blob is
/// logged, recorded as rejected, and its causal subtree stays inadmissible.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClassifyError {
    #[error("schema blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema blob is missing a signer")]
    MissingSigner,
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error("timestamp `{raw}` is not RFC 3339: {reason}")]
    MalformedTimestamp { raw: String, reason: String },
    #[error("mutation is lacking an operation")]
    MissingOperation,
    #[error("mutation is lacking a site identifier")]
    MissingSite,
    #[error("permission is lacking a target user")]
    MissingUser,
    #[error(transparent)]
    InvalidPermAction(#[from] InvalidPermAction),
    #[error("unknown schema type `{raw}`")]
    UnknownType { raw: String },
    #[error("blob of {got} bytes exceeds the {max}-byte limit")]
    OversizeBlob { got: usize, max: usize },
    #[error("{got} dependencies exceed the limit of {max}")]
    TooManyDependencies { got: usize, max: usize },
}

/// Hard failure while applying a node to an OT history.
///
/// Missing dependencies are not an error; they are an
/// [`ApplyOutcome`](super::history::ApplyOutcome).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("node {blobref} is already applied")]
    DuplicateNode { blobref: BlobRef },
    #[error(transparent)]
    Transform(#[from] OtError),
}

/// Failure reported by the external OT engine.
#[derive(Debug, Error)]
#[error("ot engine: {reason}")]
pub struct OtError {
    pub reason: String,
}

impl OtError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Canonical error enum for the core capability.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Ot(#[from] OtError),
}

impl CoreError {
    pub fn transience(&self) -> Transience {
        // Core errors are pure domain/input failures.
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}
