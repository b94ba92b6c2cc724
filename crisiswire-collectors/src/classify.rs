//! Keyword classifier for raw signals
//!
//! Collected text rarely arrives with a clean category or a numeric severity.
//! These heuristics fill the gap; the validator still has the final word.

use regex::Regex;
use std::sync::LazyLock;

use crisiswire_core::ThreatCategory;

static CYBER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ransomware|malware|cyber\w*|hack\w*|breach\w*|ddos|phishing|exploit\w*|zero-day|botnet)\b").unwrap()
});

static HEALTH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(outbreak|pandemic|epidemic|virus|disease|cholera|measles|ebola|influenza|infection\w*|vaccine\w*|hospital\w*)\b").unwrap()
});

static CLIMATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(flood\w*|drought|wildfire\w*|heatwave|heat wave|hurricane|cyclone|typhoon|storm\w*|climate|sea level|glacier\w*)\b").unwrap()
});

static CONFLICT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(war|conflict|militar\w*|troops|airstrike\w*|missile\w*|insurgen\w*|coup|shelling|ceasefire|armed)\b").unwrap()
});

static ECONOMIC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(inflation|recession|default\w*|currency|market crash|bank run|supply chain|shortage\w*|tariff\w*|debt)\b").unwrap()
});

static AI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ai|artificial intelligence|deepfake\w*|llm\w*|machine learning|autonomous weapon\w*|chatbot\w*)\b").unwrap()
});

static ESCALATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(dead|deaths|killed|fatal\w*|emergency|critical|catastroph\w*|collapse\w*|nationwide|global|mass|evacuat\w*|state of emergency)\b").unwrap()
});

/// Base severity for a signal with no escalation language
pub const BASE_SEVERITY: u8 = 30;

/// Severity ceiling for keyword estimates; only sources may claim more
pub const MAX_ESTIMATED_SEVERITY: u8 = 90;

fn patterns() -> [(ThreatCategory, &'static Regex); 6] {
    [
        (ThreatCategory::Cyber, &*CYBER_REGEX),
        (ThreatCategory::Health, &*HEALTH_REGEX),
        (ThreatCategory::Climate, &*CLIMATE_REGEX),
        (ThreatCategory::Conflict, &*CONFLICT_REGEX),
        (ThreatCategory::Economic, &*ECONOMIC_REGEX),
        (ThreatCategory::Ai, &*AI_REGEX),
    ]
}

/// Pick the category with the most keyword hits; ties go to the earlier category
pub fn classify(text: &str) -> Option<ThreatCategory> {
    let mut best: Option<(ThreatCategory, usize)> = None;

    for (category, regex) in patterns() {
        let hits = regex.find_iter(text).count();
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((category, hits));
        }
    }

    best.map(|(category, _)| category)
}

/// Map a source's own category label onto the closed set.
///
/// Exact wire names (case-insensitive) win; otherwise the label is classified
/// like any other text.
pub fn match_category(label: &str) -> Option<ThreatCategory> {
    let label = label.trim();
    ThreatCategory::ALL
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(label))
        .or_else(|| classify(label))
}

/// Estimate severity from escalation language
pub fn estimate_severity(text: &str) -> u8 {
    let hits = ESCALATION_REGEX.find_iter(text).count().min(6) as u8;
    (BASE_SEVERITY + hits * 10).min(MAX_ESTIMATED_SEVERITY)
}
