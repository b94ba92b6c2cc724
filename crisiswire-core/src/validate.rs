//! Candidate validation
//!
//! The validator is the gate in front of the store. It runs against the raw
//! candidate, before any clamping or truncation, so sanitization can never
//! paper over a missing field or an out-of-range severity.
//!
//! Checks run in a fixed order and stop at the first failing one:
//! 1. required fields present (all absent fields are reported together)
//! 2. severity within [0, 100]
//! 3. type within the closed category set

use serde_json::Value;
use thiserror::Error;

use crate::sanitize::{score_value, value_to_text};
use crate::{Candidate, ThreatCategory, MAX_SCORE};

/// Fields every candidate must carry
pub const REQUIRED_FIELDS: [&str; 4] = ["title", "type", "severity", "summary"];

/// Why a candidate was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("{field} must be a number within [0, {max}], got {value}", max = MAX_SCORE)]
    RangeViolation { field: String, value: String },

    #[error("invalid threat type '{0}', expected one of Cyber, Health, Climate, Conflict, Economic, AI")]
    InvalidType(String),
}

impl ValidationError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingFields(_) => "missing_fields",
            ValidationError::RangeViolation { .. } => "range_violation",
            ValidationError::InvalidType(_) => "invalid_type",
        }
    }
}

/// A field counts as missing when absent, null, `false`, or blank text.
/// Numeric zero is a real value (severity 0 is in range).
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Whether `field` would be reported missing for this candidate
pub fn is_missing_field(candidate: &Candidate, field: &str) -> bool {
    is_missing(candidate.get(field))
}

/// Validate a raw candidate without side effects
pub fn validate(candidate: &Candidate) -> Result<(), ValidationError> {
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| is_missing(candidate.get(field)))
        .map(|field| field.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    // Present after the check above
    let severity = candidate.get("severity").cloned().unwrap_or(Value::Null);
    let in_range =
        score_value(&severity).is_some_and(|n| (0.0..=f64::from(MAX_SCORE)).contains(&n));
    if !in_range {
        return Err(ValidationError::RangeViolation {
            field: "severity".to_string(),
            value: value_to_text(&severity),
        });
    }

    match candidate.get("type") {
        Some(Value::String(name)) => {
            name.parse::<ThreatCategory>()?;
        }
        other => {
            let text = other.map(value_to_text).unwrap_or_default();
            return Err(ValidationError::InvalidType(text));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Candidate {
        Candidate::new()
            .with("title", "Ransomware hits hospital network")
            .with("type", "Cyber")
            .with("severity", 80)
            .with("summary", "Regional hospitals diverting patients")
    }

    #[test]
    fn test_valid_candidate_passes() {
        assert_eq!(validate(&valid()), Ok(()));
    }

    #[test]
    fn test_missing_fields_lists_exactly_the_absent_ones() {
        let candidate = Candidate::new().with("title", "Only a title").with("severity", 10);
        let err = validate(&candidate).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["type".to_string(), "summary".to_string()])
        );
        assert_eq!(err.kind(), "missing_fields");
    }

    #[test]
    fn test_every_required_field_is_checked() {
        for field in REQUIRED_FIELDS {
            let mut candidate = valid();
            candidate.set(field, Value::Null);
            let err = validate(&candidate).unwrap_err();
            assert_eq!(err, ValidationError::MissingFields(vec![field.to_string()]));
        }
    }

    #[test]
    fn test_blank_and_false_count_as_missing() {
        let candidate = valid().with("title", "   ").with("summary", false);
        let err = validate(&candidate).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["title".to_string(), "summary".to_string()])
        );
    }

    #[test]
    fn test_zero_severity_is_present() {
        assert!(validate(&valid().with("severity", 0)).is_ok());
    }

    #[test]
    fn test_out_of_range_severity() {
        for bad in [json!(-5), json!(150), json!(100.5), json!("high"), json!(true)] {
            let err = validate(&valid().with("severity", bad.clone())).unwrap_err();
            assert_eq!(err.kind(), "range_violation", "severity {}", bad);
        }
    }

    #[test]
    fn test_numeric_string_severity_accepted() {
        assert!(validate(&valid().with("severity", "42")).is_ok());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = validate(&valid().with("type", "Meteor")).unwrap_err();
        assert_eq!(err, ValidationError::InvalidType("Meteor".to_string()));

        let err = validate(&valid().with("type", 7)).unwrap_err();
        assert_eq!(err.kind(), "invalid_type");
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        // Missing summary, bad severity and bad type: missing wins
        let candidate = Candidate::new()
            .with("title", "x")
            .with("type", "Meteor")
            .with("severity", 500);
        assert_eq!(validate(&candidate).unwrap_err().kind(), "missing_fields");

        // Bad severity and bad type: range wins
        let candidate = valid().with("type", "Meteor").with("severity", 500);
        assert_eq!(validate(&candidate).unwrap_err().kind(), "range_violation");
    }
}
