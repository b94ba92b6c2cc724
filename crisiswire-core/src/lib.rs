//! crisiswire Core - Threat records and the credibility model
//!
//! This crate provides the foundational primitives:
//! - The canonical [`ThreatRecord`] and its untyped [`Candidate`] precursor
//! - Validation of raw candidates (required fields, ranges, categories)
//! - Sanitization that coerces anything into a storable shape
//! - The vote-driven credibility formula and lifecycle policy
//! - Vote audit entries and layered configuration

pub mod audit;
pub mod candidate;
pub mod config;
pub mod credibility;
pub mod record;
pub mod sanitize;
pub mod validate;

pub use audit::*;
pub use candidate::*;
pub use config::*;
pub use credibility::*;
pub use record::*;
pub use sanitize::*;
pub use validate::*;

/// Credibility of a record nobody has voted on yet
pub const NEUTRAL_CREDIBILITY: u8 = 50;

/// Upper bound shared by severity and credibility
pub const MAX_SCORE: u8 = 100;

/// Default maximum title length in characters
pub const TITLE_MAX_CHARS: usize = 200;

/// Default maximum summary length in characters
pub const SUMMARY_MAX_CHARS: usize = 1000;

/// Default per-item timeout when forwarding candidates to the core
pub const DEFAULT_FORWARD_TIMEOUT_SECS: u64 = 10;
