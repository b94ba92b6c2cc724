//! Credibility engine
//!
//! Converts vote counters into a credibility score and drives the lifecycle
//! status. The score is a pure function of the counters, so any stored score
//! can be recomputed from the stored votes alone.
//!
//! Formula (weights are in quarter-votes, `FULL_CREDIT = 4`):
//!
//! ```text
//! score = round(100 * (wc*confirm + ws*skeptical + wd*deny + FULL_CREDIT*prior)
//!               / (FULL_CREDIT * (confirm + deny + skeptical + 2*prior)))
//! ```
//!
//! With the default weights (4, 1, 0) and a prior of one pseudo-vote on each
//! side, no votes gives 50, confirms pull towards 100, denies towards 0 and
//! skeptical votes count as a quarter confirm.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::{ThreatStatus, VoteTally, MAX_SCORE, NEUTRAL_CREDIBILITY};

/// Weight of a vote that counts fully in favour
pub const FULL_CREDIT: u64 = 4;

/// A citizen's assessment of a threat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Confirm,
    Deny,
    Skeptical,
}

impl VoteKind {
    /// Map the binary credible / not-credible vote onto the three counters
    pub fn from_credible(credible: bool) -> Self {
        if credible {
            VoteKind::Confirm
        } else {
            VoteKind::Deny
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteKind::Confirm => "confirm",
            VoteKind::Deny => "deny",
            VoteKind::Skeptical => "skeptical",
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vote kind outside the accepted vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid vote kind '{0}', expected confirm, deny, skeptical, credible or not_credible")]
pub struct InvalidVoteError(pub String);

impl FromStr for VoteKind {
    type Err = InvalidVoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirm" | "credible" => Ok(VoteKind::Confirm),
            "deny" | "not_credible" | "not-credible" => Ok(VoteKind::Deny),
            "skeptical" => Ok(VoteKind::Skeptical),
            _ => Err(InvalidVoteError(s.to_string())),
        }
    }
}

/// Intermediate terms of a score, for audits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub numerator: u128,
    pub denominator: u128,
    pub score: u8,
}

fn default_confirm_weight() -> u64 {
    FULL_CREDIT
}

fn default_skeptical_weight() -> u64 {
    1
}

fn default_prior() -> u64 {
    1
}

fn default_min_votes() -> u64 {
    5
}

fn default_monitoring_threshold() -> u8 {
    25
}

fn default_reactivation_threshold() -> u8 {
    60
}

/// Scoring weights and lifecycle thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredibilityPolicy {
    /// Credit per confirm vote, in quarter-votes (capped at `FULL_CREDIT`)
    #[serde(default = "default_confirm_weight")]
    pub confirm_weight: u64,
    #[serde(default = "default_skeptical_weight")]
    pub skeptical_weight: u64,
    #[serde(default)]
    pub deny_weight: u64,
    /// Pseudo-votes added to each side (Laplace smoothing)
    #[serde(default = "default_prior")]
    pub prior: u64,
    /// Votes required before status may change
    #[serde(default = "default_min_votes")]
    pub min_votes_for_transition: u64,
    /// At or below this score an active threat drops to monitoring
    #[serde(default = "default_monitoring_threshold")]
    pub monitoring_threshold: u8,
    /// At or above this score a monitored threat returns to active
    #[serde(default = "default_reactivation_threshold")]
    pub reactivation_threshold: u8,
}

impl Default for CredibilityPolicy {
    fn default() -> Self {
        Self {
            confirm_weight: default_confirm_weight(),
            skeptical_weight: default_skeptical_weight(),
            deny_weight: 0,
            prior: default_prior(),
            min_votes_for_transition: default_min_votes(),
            monitoring_threshold: default_monitoring_threshold(),
            reactivation_threshold: default_reactivation_threshold(),
        }
    }
}

impl CredibilityPolicy {
    /// Compute the score with all intermediate terms
    pub fn explain(&self, votes: &VoteTally) -> ScoreBreakdown {
        let weight = |w: u64| u128::from(w.min(FULL_CREDIT));
        let full = u128::from(FULL_CREDIT);
        let prior = u128::from(self.prior);

        let numerator = weight(self.confirm_weight) * u128::from(votes.confirm)
            + weight(self.skeptical_weight) * u128::from(votes.skeptical)
            + weight(self.deny_weight) * u128::from(votes.deny)
            + full * prior;
        let denominator = full * (u128::from(votes.total()) + 2 * prior);

        let score = if denominator == 0 {
            NEUTRAL_CREDIBILITY
        } else {
            // Round half up: floor((200n + d) / 2d)
            let hundredths = (200 * numerator + denominator) / (2 * denominator);
            hundredths.min(u128::from(MAX_SCORE)) as u8
        };

        ScoreBreakdown {
            numerator,
            denominator,
            score,
        }
    }

    /// Credibility score in [0, 100]
    pub fn score(&self, votes: &VoteTally) -> u8 {
        self.explain(votes).score
    }

    /// Status after a vote. Resolution is administrative and never undone here.
    pub fn next_status(&self, current: ThreatStatus, votes: &VoteTally, score: u8) -> ThreatStatus {
        if current == ThreatStatus::Resolved || votes.total() < self.min_votes_for_transition {
            return current;
        }

        match current {
            ThreatStatus::Active if score <= self.monitoring_threshold => ThreatStatus::Monitoring,
            ThreatStatus::Monitoring if score >= self.reactivation_threshold => {
                ThreatStatus::Active
            }
            other => other,
        }
    }
}
