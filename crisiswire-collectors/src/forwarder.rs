//! Collector-to-core forwarding
//!
//! Collectors hand their candidates to a [`Forwarder`], which sanitizes each
//! one and submits it to an [`IngestTarget`]. Every submission carries its own
//! timeout; a failed item is logged and reported, never retried, and never
//! holds up the rest of the batch.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crisiswire_core::{
    is_missing_field, score_value, Candidate, CollectorSettings, Sanitizer, REQUIRED_FIELDS,
};

/// Per-item forwarding failure
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
pub enum ForwardingError {
    #[error("Submission timed out after {0}ms")]
    Timeout(u64),

    #[error("Core unreachable: {0}")]
    Network(String),

    #[error("Core rejected candidate ({kind}): {reason}")]
    Rejected { kind: String, reason: String },

    #[error("Unreadable core response: {0}")]
    Parse(String),
}

impl ForwardingError {
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardingError::Timeout(_) => "timeout",
            ForwardingError::Network(_) => "network",
            ForwardingError::Rejected { .. } => "rejected",
            ForwardingError::Parse(_) => "parse",
        }
    }
}

/// Anything that accepts candidates on behalf of the core
#[async_trait]
pub trait IngestTarget: Send + Sync {
    /// Submit one candidate, returning the id it was stored under
    async fn submit(&self, candidate: &Candidate) -> Result<String, ForwardingError>;

    /// Human-readable target name for logs
    fn describe(&self) -> String;
}

#[derive(Debug, Deserialize)]
struct AcceptedBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RejectedBody {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default, alias = "error", alias = "message")]
    reason: Option<String>,
}

/// Submits candidates to a core over HTTP (`POST <base>/api/threats`)
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: Client,
    endpoint: String,
}

impl HttpTarget {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ForwardingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForwardingError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/threats", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl IngestTarget for HttpTarget {
    async fn submit(&self, candidate: &Candidate) -> Result<String, ForwardingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(candidate)
            .send()
            .await
            .map_err(|e| ForwardingError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ForwardingError::Network(e.to_string()))?;

        if !status.is_success() {
            let rejected: Option<RejectedBody> = serde_json::from_str(&body).ok();
            let (kind, reason) = match rejected {
                Some(RejectedBody { kind, reason }) => (
                    kind.unwrap_or_else(|| format!("http_{}", status.as_u16())),
                    reason.unwrap_or(body),
                ),
                None => (format!("http_{}", status.as_u16()), body),
            };
            return Err(ForwardingError::Rejected { kind, reason });
        }

        serde_json::from_str::<AcceptedBody>(&body)
            .map(|accepted| accepted.id)
            .map_err(|e| ForwardingError::Parse(e.to_string()))
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// Result of forwarding one candidate
#[derive(Debug, Clone, Serialize)]
pub struct ForwardOutcome {
    /// Position in the submitted batch
    pub index: usize,
    pub title: String,
    pub result: Result<String, ForwardingError>,
}

/// Per-item results of a forwarding run, in submission order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ForwardReport {
    pub outcomes: Vec<ForwardOutcome>,
}

impl ForwardReport {
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn merge(&mut self, other: ForwardReport) {
        let offset = self.outcomes.len();
        self.outcomes
            .extend(other.outcomes.into_iter().map(|mut outcome| {
                outcome.index += offset;
                outcome
            }));
    }
}

/// Sanitizes and submits candidates with a bounded per-item timeout
#[derive(Debug, Clone)]
pub struct Forwarder {
    sanitizer: Sanitizer,
    item_timeout: Duration,
    max_concurrent: usize,
}

impl Forwarder {
    pub fn new(sanitizer: Sanitizer, settings: &CollectorSettings) -> Self {
        Self {
            sanitizer,
            item_timeout: settings.forward_timeout(),
            max_concurrent: settings.max_concurrent.max(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Sanitize a candidate for submission.
    ///
    /// Required fields the collector never supplied stay absent, so the core
    /// still reports them as missing instead of accepting sanitizer defaults.
    /// A severity that is not a number is passed through untouched for the
    /// core to reject as out of range.
    pub fn prepare(&self, candidate: &Candidate) -> Candidate {
        let mut prepared: Candidate = self.sanitizer.normalize(candidate).into();
        for field in REQUIRED_FIELDS {
            if is_missing_field(candidate, field) {
                prepared.remove(field);
            }
        }
        if let Some(raw) = candidate.get("severity") {
            if !is_missing_field(candidate, "severity") && score_value(raw).is_none() {
                prepared.set("severity", raw.clone());
            }
        }
        prepared
    }

    async fn submit_one(
        &self,
        target: &dyn IngestTarget,
        candidate: &Candidate,
    ) -> Result<String, ForwardingError> {
        match tokio::time::timeout(self.item_timeout, target.submit(candidate)).await {
            Ok(result) => result,
            Err(_) => Err(ForwardingError::Timeout(self.item_timeout.as_millis() as u64)),
        }
    }

    /// Forward a batch. Never fails as a whole; see the per-item outcomes.
    pub async fn forward(&self, target: &dyn IngestTarget, candidates: Vec<Candidate>) -> ForwardReport {
        if candidates.is_empty() {
            return ForwardReport::default();
        }

        info!("Forwarding {} candidates to {}", candidates.len(), target.describe());

        let outcomes: Vec<ForwardOutcome> = stream::iter(candidates.into_iter().enumerate())
            .map(|(index, candidate)| async move {
                let prepared = self.prepare(&candidate);
                let title = prepared.get_str("title").unwrap_or_default().to_string();
                let result = self.submit_one(target, &prepared).await;

                match &result {
                    Ok(id) => debug!("Forwarded '{}' as {}", title, id),
                    Err(e) => warn!("Forwarding '{}' failed [{}]: {}", title, e.kind(), e),
                }

                ForwardOutcome { index, title, result }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let report = ForwardReport { outcomes };
        info!(
            "Forwarded {} of {} candidates ({} failed)",
            report.accepted(),
            report.len(),
            report.failed()
        );
        report
    }
}
