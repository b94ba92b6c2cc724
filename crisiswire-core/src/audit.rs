//! Vote audit trail entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::VoteKind;

/// One accepted vote, kept for later accountability and abuse analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAuditEntry {
    pub threat_id: String,
    /// Caller-supplied voter id, or an `anon-` pseudo-id
    pub voter_id: String,
    pub kind: VoteKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Record revision this vote produced
    #[serde(default)]
    pub revision: u64,
}

/// Stable pseudo-id for an anonymous voter.
///
/// Derived from the vote's own coordinates, so the same vote always maps to
/// the same id while distinct votes get distinct ids.
pub fn anonymous_voter_id(threat_id: &str, revision: u64, timestamp: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(threat_id.as_bytes());
    hasher.update(revision.to_be_bytes());
    hasher.update(timestamp.to_rfc3339().as_bytes());
    format!("anon-{}", &format!("{:x}", hasher.finalize())[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_id_is_deterministic() {
        let at = Utc::now();
        let a = anonymous_voter_id("t-1", 3, at);
        let b = anonymous_voter_id("t-1", 3, at);
        let c = anonymous_voter_id("t-1", 4, at);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("anon-"));
        assert_eq!(a.len(), "anon-".len() + 16);
    }
}
