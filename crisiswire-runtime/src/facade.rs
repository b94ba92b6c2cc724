//! Core facade
//!
//! [`Core`] owns one store handle and hands it to the pipeline and the vote
//! aggregator. Callers open the store, build a `Core` around it, and call
//! [`Core::close`] when done so the store can flush.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

use crisiswire_core::{
    Candidate, CoreConfig, CredibilityPolicy, ScoreBreakdown, ThreatCategory, ThreatRecord,
    ThreatStatus, VoteAuditEntry, VoteKind,
};
use crisiswire_store::{SharedStore, StoreError};

use crate::{
    bounded, BatchReport, IngestError, IngestionPipeline, VoteAggregator, VoteError, VoteOutcome,
    VoteRequest,
};

/// Aggregate view of the stored corpus
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusStats {
    pub total: usize,
    pub active: usize,
    pub monitoring: usize,
    pub resolved: usize,
    pub by_type: BTreeMap<String, usize>,
    pub total_votes: u64,
    /// Mean credibility score, 0 for an empty corpus
    pub mean_credibility: f64,
}

impl CorpusStats {
    pub fn from_records(records: &[ThreatRecord]) -> Self {
        let mut stats = CorpusStats {
            total: records.len(),
            ..Default::default()
        };

        let mut score_sum = 0u64;
        for record in records {
            match record.status {
                ThreatStatus::Active => stats.active += 1,
                ThreatStatus::Monitoring => stats.monitoring += 1,
                ThreatStatus::Resolved => stats.resolved += 1,
            }
            *stats
                .by_type
                .entry(record.threat_type.to_string())
                .or_default() += 1;
            stats.total_votes = stats.total_votes.saturating_add(record.votes.total());
            score_sum += u64::from(record.credibility_score);
        }

        if !records.is_empty() {
            stats.mean_credibility = score_sum as f64 / records.len() as f64;
        }
        stats
    }
}

/// Entry point for ingestion, voting and reads
pub struct Core {
    store: SharedStore,
    pipeline: IngestionPipeline,
    aggregator: VoteAggregator,
    store_timeout: Duration,
}

impl Core {
    pub fn new(store: SharedStore, config: CoreConfig) -> Self {
        Self {
            pipeline: IngestionPipeline::new(store.clone(), &config),
            aggregator: VoteAggregator::new(store.clone(), &config),
            store_timeout: config.store.timeout(),
            store,
        }
    }

    /// The pipeline, usable directly as a forwarding target
    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    pub fn policy(&self) -> &CredibilityPolicy {
        self.aggregator.policy()
    }

    pub async fn ingest(&self, candidate: &Candidate) -> Result<String, IngestError> {
        self.pipeline.ingest(candidate).await
    }

    pub async fn ingest_batch(&self, candidates: &[Candidate]) -> BatchReport {
        self.pipeline.ingest_batch(candidates).await
    }

    pub async fn record_vote(&self, request: VoteRequest) -> Result<VoteOutcome, VoteError> {
        self.aggregator.record_vote(request).await
    }

    pub async fn vote(
        &self,
        threat_id: &str,
        kind: VoteKind,
        voter_id: Option<String>,
        reasoning: Option<String>,
    ) -> Result<VoteOutcome, VoteError> {
        self.aggregator
            .vote(threat_id, kind, voter_id, reasoning)
            .await
    }

    pub async fn threat(&self, id: &str) -> Result<Option<ThreatRecord>, StoreError> {
        bounded(self.store_timeout, self.store.get(id)).await
    }

    /// All records, oldest first
    pub async fn threats(&self) -> Result<Vec<ThreatRecord>, StoreError> {
        bounded(self.store_timeout, self.store.list()).await
    }

    /// Active records, most severe first
    pub async fn active_threats(&self) -> Result<Vec<ThreatRecord>, StoreError> {
        let mut active: Vec<ThreatRecord> = self
            .threats()
            .await?
            .into_iter()
            .filter(ThreatRecord::is_active)
            .collect();
        active.sort_by(|a, b| b.severity.cmp(&a.severity));
        Ok(active)
    }

    pub async fn threats_by_type(
        &self,
        category: ThreatCategory,
    ) -> Result<Vec<ThreatRecord>, StoreError> {
        Ok(self
            .threats()
            .await?
            .into_iter()
            .filter(|r| r.threat_type == category)
            .collect())
    }

    pub async fn stats(&self) -> Result<CorpusStats, StoreError> {
        Ok(CorpusStats::from_records(&self.threats().await?))
    }

    /// Score breakdown for a stored record, recomputed from its counters
    pub async fn explain(&self, id: &str) -> Result<Option<ScoreBreakdown>, StoreError> {
        Ok(self
            .threat(id)
            .await?
            .map(|record| self.policy().explain(&record.votes)))
    }

    pub async fn audit_for(&self, threat_id: &str) -> Result<Vec<VoteAuditEntry>, StoreError> {
        bounded(self.store_timeout, self.store.audit_for(threat_id)).await
    }

    /// Flush the store. The core should not be used afterwards.
    pub async fn close(&self) -> Result<(), StoreError> {
        info!("Closing core");
        bounded(self.store_timeout, self.store.close()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crisiswire_store::MemoryStore;
    use std::sync::Arc;

    fn core() -> Core {
        Core::new(Arc::new(MemoryStore::new()), CoreConfig::default())
    }

    fn candidate(title: &str, category: &str, severity: u8) -> Candidate {
        Candidate::new()
            .with("title", title)
            .with("type", category)
            .with("severity", severity)
            .with("summary", "details")
    }

    #[tokio::test]
    async fn test_read_side() {
        let core = core();
        let low = core.ingest(&candidate("Phishing wave", "Cyber", 20)).await.unwrap();
        let high = core.ingest(&candidate("Grid attack", "Cyber", 90)).await.unwrap();
        let other = core.ingest(&candidate("Drought", "Climate", 50)).await.unwrap();

        for _ in 0..5 {
            core.vote(&other, VoteKind::Deny, None, None).await.unwrap();
        }

        let active = core.active_threats().await.unwrap();
        let ids: Vec<&str> = active.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![high.as_str(), low.as_str()]);

        let cyber = core.threats_by_type(ThreatCategory::Cyber).await.unwrap();
        assert_eq!(cyber.len(), 2);

        let stats = core.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.monitoring, 1);
        assert_eq!(stats.by_type.get("Cyber"), Some(&2));
        assert_eq!(stats.total_votes, 5);
        // (50 + 50 + 14) / 3
        assert!((stats.mean_credibility - 38.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_explain_matches_stored_score() {
        let core = core();
        let id = core.ingest(&candidate("Bank run", "Economic", 40)).await.unwrap();
        core.vote(&id, VoteKind::Confirm, None, None).await.unwrap();
        core.vote(&id, VoteKind::Skeptical, None, None).await.unwrap();

        let record = core.threat(&id).await.unwrap().unwrap();
        let breakdown = core.explain(&id).await.unwrap().unwrap();
        assert_eq!(breakdown.score, record.credibility_score);
        assert!(core.explain("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_empty_stats() {
        let stats = CorpusStats::from_records(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.mean_credibility, 0.0);
    }
}
