//! Common traits for signal collectors

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use thiserror::Error;

use crisiswire_core::{Candidate, CollectorSettings};

/// Errors from collector operations
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No work available")]
    NoWork,

    #[error("Collector not ready: {0}")]
    NotReady(String),
}

/// Common interface for all collectors
#[async_trait]
pub trait Collector: Send + Sync {
    /// Unique collector identifier
    fn id(&self) -> &str;

    /// Provenance marker stamped on every candidate (`feed`, `scrape`, ...)
    fn signal_type(&self) -> &str;

    /// Discover new signals and return them as candidates
    async fn collect(&mut self) -> Result<Vec<Candidate>, CollectorError>;
}

/// Collector configuration
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Unique collector ID
    pub id: String,
    /// Maximum candidates returned per run
    pub max_items: usize,
    /// Sources fetched at once
    pub max_concurrent: usize,
    /// Timeout for fetching one source
    pub request_timeout: Duration,
    /// Rotate user agents between requests
    pub rotate_user_agent: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
            max_items: 50,
            max_concurrent: 4,
            request_timeout: Duration::from_secs(30),
            rotate_user_agent: true,
        }
    }
}

impl CollectorConfig {
    pub fn from_settings(settings: &CollectorSettings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent.max(1),
            request_timeout: settings.request_timeout(),
            rotate_user_agent: settings.rotate_user_agent,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }
}

/// Content hash for deduplicating candidates across runs
pub fn fingerprint(candidate: &Candidate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(candidate.get_str("title").unwrap_or_default().trim().to_lowercase());
    hasher.update(b"\x1f");
    let first_source = candidate
        .get("sources")
        .and_then(Value::as_array)
        .and_then(|sources| sources.first())
        .and_then(Value::as_str)
        .unwrap_or_default();
    hasher.update(first_source.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// Fingerprints seen recently; the oldest are forgotten past `capacity`
#[derive(Debug, Clone)]
pub struct RecentFingerprints {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl RecentFingerprints {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Remember a fingerprint; false if it was already known
    pub fn insert(&mut self, fingerprint: String) -> bool {
        if self.seen.contains(&fingerprint) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(fingerprint.clone());
        self.order.push_back(fingerprint);
        true
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Stamp provenance: the signal type marker and a `collector:<id>` source tag
pub fn tag_provenance(mut candidate: Candidate, signal_type: &str, collector_id: &str) -> Candidate {
    let mut sources = candidate
        .get("sources")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    sources.push(Value::String(format!("collector:{}", collector_id)));

    candidate.set("sources", sources);
    candidate.set("signalType", signal_type);
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_ignores_case_and_provenance_tag() {
        let a = Candidate::new()
            .with("title", "Dam Breach")
            .with("sources", json!(["https://news.example/dam"]));
        let b = tag_provenance(
            Candidate::new()
                .with("title", "dam breach ")
                .with("sources", json!(["https://news.example/dam"])),
            "feed",
            "feed-1",
        );
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_differs_by_source() {
        let a = Candidate::new().with("title", "x").with("sources", json!(["a"]));
        let b = Candidate::new().with("title", "x").with("sources", json!(["b"]));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_recent_fingerprints_forget_the_oldest() {
        let mut recent = RecentFingerprints::new(2);
        assert!(recent.insert("a".to_string()));
        assert!(!recent.insert("a".to_string()));
        assert!(recent.insert("b".to_string()));
        assert!(recent.insert("c".to_string()));

        assert_eq!(recent.len(), 2);
        assert!(!recent.contains("a"));
        assert!(recent.contains("b"));
        assert!(recent.contains("c"));
        assert!(recent.insert("a".to_string()));
    }

    #[test]
    fn test_tag_provenance() {
        let tagged = tag_provenance(Candidate::new(), "scrape", "page-2");
        assert_eq!(tagged.get_str("signalType"), Some("scrape"));
        assert_eq!(tagged.get("sources"), Some(&json!(["collector:page-2"])));
    }

    #[test]
    fn test_config_builder() {
        let config = CollectorConfig::default().with_id("feed-1").with_max_items(5);
        assert_eq!(config.id, "feed-1");
        assert_eq!(config.max_items, 5);
    }
}
