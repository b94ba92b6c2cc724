//! Sanitizer / normalizer
//!
//! Turns any candidate into a storable shape. This never fails: text is
//! coerced and truncated, numbers are coerced and clamped, malformed lists are
//! dropped and absent fields get defaults. The category is carried through
//! untouched; enforcing the closed set is the validator's job.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Candidate, CredibilityPolicy, Limits, ThreatCategory, ThreatRecord, ThreatStatus,
    ValidationError, VoteTally, MAX_SCORE, NEUTRAL_CREDIBILITY,
};

/// A candidate after sanitization, ready to become a [`ThreatRecord`]
///
/// Serializes with the same field names a candidate uses, so a sanitized
/// threat can be fed back through [`Sanitizer::normalize`] unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedThreat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(rename = "type")]
    pub threat_type: String,
    pub severity: u8,
    pub summary: String,
    pub regions: Vec<String>,
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub status: ThreatStatus,
    pub votes: VoteTally,
    pub credibility_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_vote_timestamp: Option<DateTime<Utc>>,
    pub verifications: Vec<String>,
    pub simulations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
}

impl SanitizedThreat {
    /// Promote to a typed record under `id`.
    ///
    /// Fails only on a category outside the closed set. A new record starts
    /// active with no votes: supplied votes, status, score and last vote time
    /// are dropped, since only the vote aggregator may change them.
    pub fn into_record(
        self,
        id: String,
        policy: &CredibilityPolicy,
    ) -> Result<ThreatRecord, ValidationError> {
        let threat_type: ThreatCategory = self.threat_type.parse()?;
        let votes = VoteTally::default();
        let credibility_score = policy.score(&votes);

        Ok(ThreatRecord {
            id,
            title: self.title,
            threat_type,
            severity: self.severity,
            summary: self.summary,
            regions: self.regions,
            sources: self.sources,
            timestamp: self.timestamp,
            status: ThreatStatus::Active,
            votes,
            credibility_score,
            last_vote_timestamp: None,
            verifications: self.verifications,
            simulations: self.simulations,
            signal_type: self.signal_type,
            revision: 0,
        })
    }
}

impl From<SanitizedThreat> for Candidate {
    fn from(sanitized: SanitizedThreat) -> Self {
        Candidate::from_value(serde_json::to_value(sanitized).unwrap_or(Value::Null))
    }
}

/// Coerces candidates into [`SanitizedThreat`]s under configured limits
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    limits: Limits,
}

impl Sanitizer {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Normalize a candidate. Total: every input produces a result.
    pub fn normalize(&self, candidate: &Candidate) -> SanitizedThreat {
        let text = |key: &str, max: usize| {
            let raw = candidate.get(key).map(value_to_text).unwrap_or_default();
            truncate_chars(&raw, max)
        };

        let severity = candidate
            .get("severity")
            .and_then(coerce_number)
            .map(clamp_score)
            .unwrap_or(0);

        let credibility_score = candidate
            .get("credibilityScore")
            .and_then(coerce_number)
            .map(clamp_score)
            .unwrap_or(NEUTRAL_CREDIBILITY);

        let status = candidate
            .get_str("status")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let id = match candidate.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let signal_type = candidate
            .get_str("signalType")
            .or_else(|| candidate.get_str("signal_type"))
            .map(str::to_string);

        SanitizedThreat {
            id,
            title: text("title", self.limits.title_max_chars),
            threat_type: candidate.get("type").map(value_to_text).unwrap_or_default(),
            severity,
            summary: text("summary", self.limits.summary_max_chars),
            regions: coerce_list(candidate.get("regions")),
            sources: coerce_list(candidate.get("sources")),
            timestamp: coerce_timestamp(candidate.get("timestamp")).unwrap_or_else(Utc::now),
            status,
            votes: coerce_votes(candidate.get("votes")),
            credibility_score,
            last_vote_timestamp: coerce_timestamp(candidate.get("lastVoteTimestamp")),
            verifications: coerce_list(candidate.get("verifications")),
            simulations: coerce_list(candidate.get("simulations")),
            signal_type,
        }
    }
}

/// Normalize with default limits
pub fn normalize(candidate: &Candidate) -> SanitizedThreat {
    Sanitizer::default().normalize(candidate)
}

/// Render any JSON value as text
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        compound => compound.to_string(),
    }
}

/// Numbers and numeric strings become finite floats; everything else is `None`
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// A score as written: numbers and numeric strings, but never booleans
pub fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(_) => None,
        other => coerce_number(other),
    }
}

fn clamp_score(n: f64) -> u8 {
    n.round().clamp(0.0, f64::from(MAX_SCORE)) as u8
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Keep list entries that are scalars; anything not a list becomes empty
fn coerce_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(_) | Value::Bool(_) => Some(value_to_text(item)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn coerce_count(value: Option<&Value>) -> u64 {
    value
        .and_then(coerce_number)
        .filter(|n| *n > 0.0)
        .map(|n| n.floor() as u64)
        .unwrap_or(0)
}

fn coerce_votes(value: Option<&Value>) -> VoteTally {
    match value {
        Some(Value::Object(map)) => VoteTally {
            confirm: coerce_count(map.get("confirm")),
            deny: coerce_count(map.get("deny")),
            skeptical: coerce_count(map.get("skeptical")),
        },
        _ => VoteTally::default(),
    }
}

/// RFC 3339, bare dates (midnight UTC) and unix seconds are understood
fn coerce_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}
