//! Errors surfaced by ingestion and voting

use thiserror::Error;

use crisiswire_core::{InvalidVoteError, ValidationError};
use crisiswire_store::StoreError;

/// Why a candidate was not ingested
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("a threat with id {id} already exists")]
    Conflict { id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Validation(e) => e.kind(),
            IngestError::Conflict { .. } => "conflict",
            IngestError::Store(e) => e.kind(),
        }
    }
}

/// Why a vote was not recorded
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("threat not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidVote(#[from] InvalidVoteError),

    #[error(transparent)]
    Store(StoreError),
}

impl VoteError {
    pub fn kind(&self) -> &'static str {
        match self {
            VoteError::NotFound(_) => "not_found",
            VoteError::InvalidVote(_) => "invalid_vote",
            VoteError::Store(e) => e.kind(),
        }
    }
}

impl From<StoreError> for VoteError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => VoteError::NotFound(id),
            other => VoteError::Store(other),
        }
    }
}
