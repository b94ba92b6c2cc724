//! The canonical threat record
//!
//! A [`ThreatRecord`] is only ever produced by the ingestion pipeline from a
//! validated, sanitized candidate. After creation, votes are the only thing
//! that mutate it (counters, credibility, status, last vote time).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{ValidationError, VoteKind, NEUTRAL_CREDIBILITY};

/// Closed set of threat categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatCategory {
    Cyber,
    Health,
    Climate,
    Conflict,
    Economic,
    #[serde(rename = "AI")]
    Ai,
}

impl ThreatCategory {
    pub const ALL: [ThreatCategory; 6] = [
        ThreatCategory::Cyber,
        ThreatCategory::Health,
        ThreatCategory::Climate,
        ThreatCategory::Conflict,
        ThreatCategory::Economic,
        ThreatCategory::Ai,
    ];

    /// Wire name of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::Cyber => "Cyber",
            ThreatCategory::Health => "Health",
            ThreatCategory::Climate => "Climate",
            ThreatCategory::Conflict => "Conflict",
            ThreatCategory::Economic => "Economic",
            ThreatCategory::Ai => "AI",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatCategory {
    type Err = ValidationError;

    /// Exact, case-sensitive match against the wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThreatCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidType(s.to_string()))
    }
}

/// Lifecycle state of a threat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatStatus {
    #[default]
    Active,
    Monitoring,
    Resolved,
}

impl ThreatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatStatus::Active => "active",
            ThreatStatus::Monitoring => "monitoring",
            ThreatStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ThreatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ThreatStatus::Active),
            "monitoring" => Ok(ThreatStatus::Monitoring),
            "resolved" => Ok(ThreatStatus::Resolved),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Vote counters for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    #[serde(default)]
    pub confirm: u64,
    #[serde(default)]
    pub deny: u64,
    #[serde(default)]
    pub skeptical: u64,
}

impl VoteTally {
    pub fn new(confirm: u64, deny: u64, skeptical: u64) -> Self {
        Self {
            confirm,
            deny,
            skeptical,
        }
    }

    /// Total number of votes across all kinds
    pub fn total(&self) -> u64 {
        self.confirm
            .saturating_add(self.deny)
            .saturating_add(self.skeptical)
    }

    /// Increment the counter for `kind` (saturating)
    pub fn increment(&mut self, kind: VoteKind) {
        let counter = match kind {
            VoteKind::Confirm => &mut self.confirm,
            VoteKind::Deny => &mut self.deny,
            VoteKind::Skeptical => &mut self.skeptical,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn count(&self, kind: VoteKind) -> u64 {
        match kind {
            VoteKind::Confirm => self.confirm,
            VoteKind::Deny => self.deny,
            VoteKind::Skeptical => self.skeptical,
        }
    }
}

/// Generate a fresh record identifier
pub fn new_threat_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_credibility() -> u8 {
    NEUTRAL_CREDIBILITY
}

fn default_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// A validated, persisted threat
///
/// Serialized field names match the stored layout (`type`, `credibilityScore`,
/// `lastVoteTimestamp`, ...). Every field added after the first release carries
/// a serde default so older stored records keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatRecord {
    /// Assigned once at ingestion
    pub id: String,

    pub title: String,

    #[serde(rename = "type")]
    pub threat_type: ThreatCategory,

    /// Reported impact, 0-100, independent of credibility
    pub severity: u8,

    pub summary: String,

    #[serde(default)]
    pub regions: Vec<String>,

    /// URLs or provenance tags
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default = "default_timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub status: ThreatStatus,

    #[serde(default)]
    pub votes: VoteTally,

    /// Derived from `votes`, never set directly
    #[serde(default = "default_credibility")]
    pub credibility_score: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_vote_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub verifications: Vec<String>,

    #[serde(default)]
    pub simulations: Vec<String>,

    /// Collector provenance marker (e.g. `feed`, `scrape`, `citizen`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,

    /// Bumped on every accepted mutation; backs compare-and-swap in the store
    #[serde(default)]
    pub revision: u64,
}

impl ThreatRecord {
    pub fn is_active(&self) -> bool {
        self.status == ThreatStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing_is_exact() {
        assert_eq!("AI".parse::<ThreatCategory>().unwrap(), ThreatCategory::Ai);
        assert_eq!(
            "Climate".parse::<ThreatCategory>().unwrap(),
            ThreatCategory::Climate
        );
        assert!("cyber".parse::<ThreatCategory>().is_err());
        assert!("Alien".parse::<ThreatCategory>().is_err());
    }

    #[test]
    fn test_category_serde_uses_wire_names() {
        let json = serde_json::to_string(&ThreatCategory::Ai).unwrap();
        assert_eq!(json, "\"AI\"");
        let back: ThreatCategory = serde_json::from_str("\"Economic\"").unwrap();
        assert_eq!(back, ThreatCategory::Economic);
    }

    #[test]
    fn test_tally_increment() {
        let mut tally = VoteTally::default();
        tally.increment(VoteKind::Confirm);
        tally.increment(VoteKind::Confirm);
        tally.increment(VoteKind::Skeptical);

        assert_eq!(tally, VoteTally::new(2, 0, 1));
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.count(VoteKind::Deny), 0);
    }

    #[test]
    fn test_old_stored_record_loads_with_defaults() {
        // Layout predating votes, revisions and provenance markers
        let stored = r#"{
            "id": "t-1",
            "title": "Port outage",
            "type": "Economic",
            "severity": 40,
            "summary": "Container port closed",
            "timestamp": "2024-03-01T10:00:00Z"
        }"#;

        let record: ThreatRecord = serde_json::from_str(stored).unwrap();
        assert_eq!(record.status, ThreatStatus::Active);
        assert_eq!(record.votes, VoteTally::default());
        assert_eq!(record.credibility_score, NEUTRAL_CREDIBILITY);
        assert_eq!(record.revision, 0);
        assert!(record.regions.is_empty());
        assert!(record.last_vote_timestamp.is_none());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record: ThreatRecord = serde_json::from_str(
            r#"{"id":"t","title":"a","type":"Cyber","severity":1,"summary":"b"}"#,
        )
        .unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("credibilityScore").is_some());
        assert_eq!(value["type"], "Cyber");
        assert!(value.get("lastVoteTimestamp").is_none());
    }
}
