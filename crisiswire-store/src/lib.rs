//! crisiswire Store - shared threat storage
//!
//! The store is the shared space every ingestion and vote goes through:
//! - Records are inserted once and never deleted by the core
//! - Updates are compare-and-swap on the record revision
//! - Vote audit entries are committed together with their update
//!
//! [`MemoryStore`] is the bundled implementation; other backends implement
//! [`ThreatStore`].

pub mod memory;

pub use memory::*;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crisiswire_core::{ThreatRecord, VoteAuditEntry};

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    Conflict(String),

    #[error("record {id} changed concurrently (expected revision {expected}, found {found})")]
    RevisionMismatch { id: String, expected: u64, found: u64 },

    #[error("store call timed out after {0} ms")]
    Timeout(u64),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::Conflict(_) => "conflict",
            StoreError::RevisionMismatch { .. } => "revision_mismatch",
            StoreError::Timeout(_) => "store_timeout",
            StoreError::Io(_) => "store_io",
            StoreError::Serialization(_) => "store_serialization",
        }
    }
}

/// Persistence contract consumed by the pipeline and the vote aggregator
#[async_trait]
pub trait ThreatStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Conflict`] if the id exists.
    async fn insert(&self, record: ThreatRecord) -> Result<(), StoreError>;

    /// Fetch a record by id
    async fn get(&self, id: &str) -> Result<Option<ThreatRecord>, StoreError>;

    /// All records, oldest first
    async fn list(&self) -> Result<Vec<ThreatRecord>, StoreError>;

    /// Replace a record if its stored revision still equals `expected_revision`.
    ///
    /// The record and the optional audit entry are committed together: either
    /// both become visible or neither does.
    async fn compare_and_swap(
        &self,
        expected_revision: u64,
        record: ThreatRecord,
        audit: Option<VoteAuditEntry>,
    ) -> Result<(), StoreError>;

    /// Audit trail for one record, in commit order
    async fn audit_for(&self, threat_id: &str) -> Result<Vec<VoteAuditEntry>, StoreError>;

    /// Flush and release resources
    async fn close(&self) -> Result<(), StoreError>;
}

/// Thread-safe handle to a store
pub type SharedStore = Arc<dyn ThreatStore>;
