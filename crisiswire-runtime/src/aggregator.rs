//! Vote Aggregator
//!
//! Applies one vote to one record as an all-or-nothing update: read, bump the
//! matching counter, recompute score and status, then compare-and-swap the
//! record together with its audit entry. Votes on the same record are
//! serialized by a per-record async lock; votes on different records never
//! wait on each other, and no operation ever holds more than one record lock.

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crisiswire_core::{
    anonymous_voter_id, CoreConfig, CredibilityPolicy, ThreatStatus, VoteAuditEntry, VoteKind,
    VoteTally,
};
use crisiswire_store::SharedStore;

use crate::{bounded, VoteError};

/// A vote as submitted by a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub threat_id: String,
    /// `confirm`, `deny`, `skeptical` (or `credible` / `not_credible`)
    pub vote_kind: String,
    #[serde(default)]
    pub voter_id: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl VoteRequest {
    pub fn new(threat_id: &str, vote_kind: &str) -> Self {
        Self {
            threat_id: threat_id.to_string(),
            vote_kind: vote_kind.to_string(),
            voter_id: None,
            reasoning: None,
        }
    }

    pub fn voter(mut self, voter_id: &str) -> Self {
        self.voter_id = Some(voter_id.to_string());
        self
    }

    pub fn reasoning(mut self, reasoning: &str) -> Self {
        self.reasoning = Some(reasoning.to_string());
        self
    }
}

/// State of a record after an accepted vote
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub threat_id: String,
    pub credibility_score: u8,
    pub status: ThreatStatus,
    pub previous_status: ThreatStatus,
    pub votes: VoteTally,
}

impl VoteOutcome {
    pub fn status_changed(&self) -> bool {
        self.status != self.previous_status
    }
}

pub struct VoteAggregator {
    store: SharedStore,
    policy: CredibilityPolicy,
    store_timeout: Duration,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl VoteAggregator {
    pub fn new(store: SharedStore, config: &CoreConfig) -> Self {
        Self {
            store,
            policy: config.credibility.clone(),
            store_timeout: config.store.timeout(),
            locks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &CredibilityPolicy {
        &self.policy
    }

    /// Parse and apply a caller's vote
    pub async fn record_vote(&self, request: VoteRequest) -> Result<VoteOutcome, VoteError> {
        let kind: VoteKind = request.vote_kind.parse().map_err(|e| {
            warn!("Rejected vote on {}: {}", request.threat_id, e);
            VoteError::from(e)
        })?;

        self.vote(&request.threat_id, kind, request.voter_id, request.reasoning)
            .await
    }

    /// Apply a typed vote
    pub async fn vote(
        &self,
        threat_id: &str,
        kind: VoteKind,
        voter_id: Option<String>,
        reasoning: Option<String>,
    ) -> Result<VoteOutcome, VoteError> {
        let lock = Arc::clone(&self.locks.entry(threat_id.to_string()).or_default());

        let result = {
            let _guard = lock.lock().await;
            self.apply(threat_id, kind, voter_id, reasoning).await
        };

        drop(lock);
        // Only the map still holds it: nobody is waiting on this record
        self.locks
            .remove_if(threat_id, |_, lock| Arc::strong_count(lock) == 1);

        match &result {
            Ok(outcome) if outcome.status_changed() => info!(
                "Vote {} on {}: score {}, status {} -> {}",
                kind, threat_id, outcome.credibility_score, outcome.previous_status, outcome.status
            ),
            Ok(outcome) => info!(
                "Vote {} on {}: score {}, status {}",
                kind, threat_id, outcome.credibility_score, outcome.status
            ),
            Err(e) => warn!("Vote {} on {} failed [{}]: {}", kind, threat_id, e.kind(), e),
        }

        result
    }

    async fn apply(
        &self,
        threat_id: &str,
        kind: VoteKind,
        voter_id: Option<String>,
        reasoning: Option<String>,
    ) -> Result<VoteOutcome, VoteError> {
        let mut record = bounded(self.store_timeout, self.store.get(threat_id))
            .await?
            .ok_or_else(|| VoteError::NotFound(threat_id.to_string()))?;

        let expected_revision = record.revision;
        let previous_status = record.status;
        let now = Utc::now();

        record.votes.increment(kind);
        record.credibility_score = self.policy.score(&record.votes);
        record.status = self
            .policy
            .next_status(previous_status, &record.votes, record.credibility_score);
        record.last_vote_timestamp = Some(now);
        record.revision = expected_revision + 1;

        let voter_id = voter_id
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| anonymous_voter_id(threat_id, record.revision, now));
        let audit = VoteAuditEntry {
            threat_id: threat_id.to_string(),
            voter_id,
            kind,
            reasoning: reasoning.filter(|r| !r.trim().is_empty()),
            timestamp: now,
            revision: record.revision,
        };

        let outcome = VoteOutcome {
            threat_id: threat_id.to_string(),
            credibility_score: record.credibility_score,
            status: record.status,
            previous_status,
            votes: record.votes,
        };

        bounded(
            self.store_timeout,
            self.store
                .compare_and_swap(expected_revision, record, Some(audit)),
        )
        .await?;

        debug!("Committed revision {} of {}", expected_revision + 1, threat_id);
        Ok(outcome)
    }

    /// Number of records with a vote in flight
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}
