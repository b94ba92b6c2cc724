//! In-memory store with optional JSON snapshot persistence
//!
//! Records live in a sharded concurrent map. A compare-and-swap holds the
//! write guard for exactly one record, so updates to one record serialize
//! while updates to different records proceed in parallel.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crisiswire_core::{CredibilityPolicy, ThreatRecord, VoteAuditEntry, MAX_SCORE};

use crate::{StoreError, ThreatStore};

/// On-disk layout of a store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub records: Vec<ThreatRecord>,
    #[serde(default)]
    pub audit: Vec<VoteAuditEntry>,
}

/// Concurrent in-memory threat store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, ThreatRecord>,
    audit: Mutex<Vec<VoteAuditEntry>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Empty store that is never persisted
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON snapshot, loading it if it exists
    pub async fn open<P: AsRef<Path>>(
        path: P,
        policy: &CredibilityPolicy,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let snapshot = if tokio::fs::try_exists(&path).await? {
            let bytes = tokio::fs::read(&path).await?;
            serde_json::from_slice::<StoreSnapshot>(&bytes)?
        } else {
            debug!("No snapshot at {}, starting empty", path.display());
            StoreSnapshot::default()
        };

        let mut store = Self::from_snapshot(snapshot, policy);
        store.snapshot_path = Some(path);
        info!("Opened store with {} records", store.len());
        Ok(store)
    }

    /// Build a store from snapshot contents.
    ///
    /// Severity is clamped to the score range and every credibility score is
    /// recomputed from its vote counts, so an edited file cannot carry a score
    /// the votes do not support.
    pub fn from_snapshot(snapshot: StoreSnapshot, policy: &CredibilityPolicy) -> Self {
        let records = snapshot
            .records
            .into_iter()
            .map(|record| {
                let record = repair_record(record, policy);
                (record.id.clone(), record)
            })
            .collect();

        Self {
            records,
            audit: Mutex::new(snapshot.audit),
            snapshot_path: None,
        }
    }

    /// Point-in-time copy of all records and the audit log
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut records: Vec<ThreatRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        sort_records(&mut records);

        StoreSnapshot {
            records,
            audit: self.audit.lock().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the snapshot through a temp file and rename it into place
    async fn persist(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.snapshot())?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn repair_record(mut record: ThreatRecord, policy: &CredibilityPolicy) -> ThreatRecord {
    let score = policy.score(&record.votes);
    if record.severity > MAX_SCORE || record.credibility_score != score {
        warn!(
            "Repaired snapshot record {} (severity {}, credibility {} -> {})",
            record.id, record.severity, record.credibility_score, score
        );
    }
    record.severity = record.severity.min(MAX_SCORE);
    record.credibility_score = score;
    record
}

fn sort_records(records: &mut [ThreatRecord]) {
    records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}

#[async_trait]
impl ThreatStore for MemoryStore {
    async fn insert(&self, record: ThreatRecord) -> Result<(), StoreError> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<ThreatRecord>, StoreError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn list(&self) -> Result<Vec<ThreatRecord>, StoreError> {
        Ok(self.snapshot().records)
    }

    async fn compare_and_swap(
        &self,
        expected_revision: u64,
        record: ThreatRecord,
        audit: Option<VoteAuditEntry>,
    ) -> Result<(), StoreError> {
        let mut current = self
            .records
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::NotFound(record.id.clone()))?;

        if current.revision != expected_revision {
            return Err(StoreError::RevisionMismatch {
                id: record.id.clone(),
                expected: expected_revision,
                found: current.revision,
            });
        }

        // Lock order is always record then audit log
        if let Some(entry) = audit {
            self.audit.lock().push(entry);
        }
        *current = record;
        Ok(())
    }

    async fn audit_for(&self, threat_id: &str) -> Result<Vec<VoteAuditEntry>, StoreError> {
        Ok(self
            .audit
            .lock()
            .iter()
            .filter(|entry| entry.threat_id == threat_id)
            .cloned()
            .collect())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if let Some(path) = &self.snapshot_path {
            self.persist(path).await?;
            info!("Persisted {} records to {}", self.len(), path.display());
        }
        Ok(())
    }
}
