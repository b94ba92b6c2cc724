//! Ingestion Pipeline
//!
//! Gatekeeper between untrusted candidates and the store:
//! 1. Validate the raw candidate (missing fields, then ranges, then category)
//! 2. Sanitize it into a storable shape
//! 3. Assign an id unless one was supplied
//! 4. Insert; an existing id is a conflict and the stored record is untouched
//!
//! Nothing is written unless every step succeeds.

use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tracing::{info, warn};

use crisiswire_collectors::{ForwardingError, IngestTarget};
use crisiswire_core::{
    new_threat_id, validate, Candidate, CoreConfig, CredibilityPolicy, Sanitizer,
};
use crisiswire_store::{SharedStore, StoreError};

use crate::{bounded, IngestError};

/// Result for one candidate of a batch
#[derive(Debug)]
pub struct IngestOutcome {
    /// Position in the submitted batch
    pub index: usize,
    pub result: Result<String, IngestError>,
}

/// Per-item results of a batch, in submission order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<IngestOutcome>,
}

impl BatchReport {
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }

    /// Ids of the accepted candidates
    pub fn ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(String::as_str))
            .collect()
    }
}

pub struct IngestionPipeline {
    store: SharedStore,
    sanitizer: Sanitizer,
    policy: CredibilityPolicy,
    store_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(store: SharedStore, config: &CoreConfig) -> Self {
        Self {
            store,
            sanitizer: Sanitizer::new(config.limits.clone()),
            policy: config.credibility.clone(),
            store_timeout: config.store.timeout(),
        }
    }

    /// Ingest one candidate, returning the id it was stored under
    pub async fn ingest(&self, candidate: &Candidate) -> Result<String, IngestError> {
        if let Err(e) = validate(candidate) {
            warn!("Rejected candidate [{}]: {}", e.kind(), e);
            return Err(e.into());
        }

        let sanitized = self.sanitizer.normalize(candidate);
        let id = sanitized.id.clone().unwrap_or_else(new_threat_id);
        let record = sanitized.into_record(id.clone(), &self.policy)?;
        let threat_type = record.threat_type;

        match bounded(self.store_timeout, self.store.insert(record)).await {
            Ok(()) => {
                info!("Ingested threat {} ({})", id, threat_type);
                Ok(id)
            }
            Err(StoreError::Conflict(id)) => {
                warn!("Rejected candidate [conflict]: id {} already exists", id);
                Err(IngestError::Conflict { id })
            }
            Err(e) => {
                warn!("Store failed while ingesting {} [{}]: {}", id, e.kind(), e);
                Err(e.into())
            }
        }
    }

    /// Ingest each candidate independently; one failure never affects another
    pub async fn ingest_batch(&self, candidates: &[Candidate]) -> BatchReport {
        let results = join_all(candidates.iter().map(|c| self.ingest(c))).await;

        let report = BatchReport {
            outcomes: results
                .into_iter()
                .enumerate()
                .map(|(index, result)| IngestOutcome { index, result })
                .collect(),
        };

        info!(
            "Batch ingested: {} accepted, {} rejected",
            report.accepted(),
            report.failed()
        );
        report
    }
}

#[async_trait]
impl IngestTarget for IngestionPipeline {
    async fn submit(&self, candidate: &Candidate) -> Result<String, ForwardingError> {
        self.ingest(candidate).await.map_err(|e| match e {
            IngestError::Store(StoreError::Timeout(ms)) => ForwardingError::Timeout(ms),
            other => ForwardingError::Rejected {
                kind: other.kind().to_string(),
                reason: other.to_string(),
            },
        })
    }

    fn describe(&self) -> String {
        "local pipeline".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crisiswire_collectors::Forwarder;
    use crisiswire_core::{
        CollectorSettings, ThreatCategory, ThreatStatus, ValidationError, VoteTally,
        NEUTRAL_CREDIBILITY,
    };
    use crisiswire_store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn pipeline() -> (IngestionPipeline, SharedStore) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        (IngestionPipeline::new(store.clone(), &CoreConfig::default()), store)
    }

    fn heatwave() -> Candidate {
        Candidate::new()
            .with("title", "Heatwave grips southern Europe")
            .with("type", "Climate")
            .with("severity", 72)
            .with("summary", "Temperatures above 45C for a week")
            .with("regions", json!(["ES", "IT"]))
    }

    #[tokio::test]
    async fn test_ingest_assigns_id_and_defaults() {
        let (pipeline, store) = pipeline();

        let id = pipeline.ingest(&heatwave()).await.unwrap();
        let record = store.get(&id).await.unwrap().unwrap();

        assert_eq!(record.threat_type, ThreatCategory::Climate);
        assert_eq!(record.severity, 72);
        assert!(record.is_active());
        assert_eq!(record.votes.total(), 0);
        assert_eq!(record.credibility_score, NEUTRAL_CREDIBILITY);
        assert_eq!(record.revision, 0);
    }

    #[tokio::test]
    async fn test_client_cannot_seed_votes_or_status() {
        let (pipeline, store) = pipeline();
        let candidate = heatwave()
            .with("credibilityScore", 99)
            .with("status", "resolved")
            .with("votes", json!({"confirm": 1_000_000, "deny": 1, "skeptical": 0}))
            .with("lastVoteTimestamp", "2020-01-01T00:00:00Z");

        let id = pipeline.ingest(&candidate).await.unwrap();
        let record = store.get(&id).await.unwrap().unwrap();

        assert_eq!(record.status, ThreatStatus::Active);
        assert_eq!(record.votes, VoteTally::default());
        assert_eq!(record.credibility_score, NEUTRAL_CREDIBILITY);
        assert!(record.last_vote_timestamp.is_none());
        assert!(store.audit_for(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_writes_nothing() {
        let (pipeline, store) = pipeline();
        let candidate = Candidate::new().with("title", "Half a report");

        let err = pipeline.ingest(&candidate).await.unwrap_err();
        match err {
            IngestError::Validation(ValidationError::MissingFields(fields)) => {
                assert_eq!(fields, vec!["type", "severity", "summary"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_conflict() {
        let (pipeline, store) = pipeline();
        let first = heatwave().with("id", "heat-1");
        let second = heatwave().with("id", "heat-1").with("severity", 10);

        assert_eq!(pipeline.ingest(&first).await.unwrap(), "heat-1");
        let err = pipeline.ingest(&second).await.unwrap_err();
        assert_eq!(err.kind(), "conflict");

        let stored = store.get("heat-1").await.unwrap().unwrap();
        assert_eq!(stored.severity, 72);
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let (pipeline, _) = pipeline();
        let batch = vec![
            heatwave(),
            Candidate::new().with("title", "no body"),
            heatwave().with("type", "Weather"),
            heatwave().with("title", "Second heatwave"),
        ];

        let report = pipeline.ingest_batch(&batch).await;

        assert_eq!(report.accepted(), 2);
        assert_eq!(report.failed(), 2);
        assert!(report.outcomes[0].result.is_ok());
        assert_eq!(
            report.outcomes[2].result.as_ref().unwrap_err().kind(),
            "invalid_type"
        );
        assert_eq!(report.ids().len(), 2);
    }

    #[tokio::test]
    async fn test_pipeline_as_forwarding_target() {
        let (pipeline, _) = pipeline();

        let accepted = pipeline.submit(&heatwave()).await;
        assert!(accepted.is_ok());

        let rejected = pipeline
            .submit(&heatwave().with("severity", 150))
            .await
            .unwrap_err();
        assert_eq!(
            rejected,
            ForwardingError::Rejected {
                kind: "range_violation".to_string(),
                reason: ValidationError::RangeViolation {
                    field: "severity".to_string(),
                    value: "150".to_string(),
                }
                .to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_forwarded_word_severity_is_a_range_violation() {
        let (pipeline, store) = pipeline();
        let forwarder = Forwarder::new(Sanitizer::default(), &CollectorSettings::default());
        let batch = vec![
            heatwave().with("severity", "catastrophic"),
            heatwave().with("severity", true),
        ];

        let report = forwarder.forward(&pipeline, batch).await;

        assert_eq!(report.failed(), 2);
        for outcome in &report.outcomes {
            match &outcome.result {
                Err(ForwardingError::Rejected { kind, .. }) => assert_eq!(kind, "range_violation"),
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert!(store.list().await.unwrap().is_empty());
    }
}
