//! Feed Collector
//!
//! Pulls JSON feeds of raw crisis signals (news wires, public alert APIs,
//! citizen submission exports) and maps their loosely named fields onto
//! candidates.
//! - Reads: a JSON array, or an object with `items` / `entries` / `data`
//! - Emits: candidates tagged `signalType = "feed"`

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crisiswire_core::Candidate;

use crate::{
    create_client, estimate_severity, fetch_text, fingerprint, match_category, tag_provenance,
    Collector, CollectorConfig, CollectorError, RecentFingerprints,
};

/// Fingerprints a feed collector remembers between runs
pub const FEED_SEEN_CAPACITY: usize = 10_000;

/// First present key among `keys`
fn first<'a>(item: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| item.get(*key).filter(|v| !v.is_null()))
}

fn first_str<'a>(item: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    first(item, keys).and_then(Value::as_str)
}

/// Locate the list of items in a feed document
fn feed_items(document: &Value) -> &[Value] {
    match document {
        Value::Array(items) => items,
        Value::Object(map) => ["items", "entries", "data"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Map one feed item onto a candidate.
///
/// Unknown categories and severities are inferred from the text; fields the
/// item simply lacks are left absent so the validator can report them.
pub fn map_feed_item(item: &Map<String, Value>, feed_url: &str) -> Candidate {
    let mut candidate = Candidate::new();

    let title = first_str(item, &["title", "headline", "name"]).unwrap_or_default();
    let summary = first_str(item, &["summary", "description", "content", "text"]).unwrap_or_default();
    if !title.is_empty() {
        candidate.set("title", title);
    }
    if !summary.is_empty() {
        candidate.set("summary", summary);
    }

    let text = format!("{} {}", title, summary);
    let category = first_str(item, &["category", "type"])
        .and_then(match_category)
        .or_else(|| match_category(&text));
    if let Some(category) = category {
        candidate.set("type", category.as_str());
    }

    match first(item, &["severity", "score", "impact"]) {
        Some(severity) => candidate.set("severity", severity.clone()),
        None if !text.trim().is_empty() => candidate.set("severity", estimate_severity(&text)),
        None => {}
    }

    let regions = match first(item, &["regions", "region", "country", "location"]) {
        Some(Value::Array(list)) => list.clone(),
        Some(Value::String(single)) => vec![Value::String(single.clone())],
        _ => Vec::new(),
    };
    candidate.set("regions", regions);

    let mut sources = Vec::new();
    if let Some(link) = first_str(item, &["link", "url", "source"]) {
        sources.push(Value::String(link.to_string()));
    }
    sources.push(Value::String(format!("feed:{}", feed_url)));
    candidate.set("sources", sources);

    if let Some(published) = first(item, &["timestamp", "published", "pubDate", "date"]) {
        candidate.set("timestamp", published.clone());
    }

    candidate
}

/// Parse a feed document into candidates
pub fn parse_feed(document: &Value, feed_url: &str) -> Vec<Candidate> {
    feed_items(document)
        .iter()
        .filter_map(Value::as_object)
        .map(|item| map_feed_item(item, feed_url))
        .collect()
}

/// Feed collector - polls JSON signal feeds
pub struct FeedCollector {
    config: CollectorConfig,
    client: Client,
    feeds: Vec<String>,
    seen: RecentFingerprints,
}

impl FeedCollector {
    pub fn new(config: CollectorConfig, feeds: Vec<String>) -> Result<Self, CollectorError> {
        let client = create_client(&config)?;
        Ok(Self {
            config,
            client,
            feeds,
            seen: RecentFingerprints::new(FEED_SEEN_CAPACITY),
        })
    }

    /// Drop candidates forwarded in an earlier run, cap the rest at
    /// `max_items` and tag what is left with this collector's provenance
    fn keep_unseen(&mut self, collected: Vec<Candidate>) -> Vec<Candidate> {
        let mut fresh = Vec::new();
        for candidate in collected {
            if fresh.len() >= self.config.max_items {
                break;
            }
            if !self.seen.insert(fingerprint(&candidate)) {
                continue;
            }
            fresh.push(tag_provenance(candidate, self.signal_type(), &self.config.id));
        }
        fresh
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<Candidate>, CollectorError> {
        let body = fetch_text(&self.client, url).await?;
        let document: Value =
            serde_json::from_str(&body).map_err(|e| CollectorError::Parse(e.to_string()))?;
        Ok(parse_feed(&document, url))
    }
}

#[async_trait]
impl Collector for FeedCollector {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn signal_type(&self) -> &str {
        "feed"
    }

    async fn collect(&mut self) -> Result<Vec<Candidate>, CollectorError> {
        let mut collected = Vec::new();

        for url in &self.feeds {
            match self.fetch_feed(url).await {
                Ok(candidates) => {
                    debug!("Feed {} returned {} items", url, candidates.len());
                    collected.extend(candidates);
                }
                Err(e) => {
                    warn!("Feed {} failed: {}", url, e);
                }
            }
        }

        let fresh = self.keep_unseen(collected);

        if fresh.is_empty() {
            return Err(CollectorError::NoWork);
        }

        info!("Feed collector {} found {} new signals", self.config.id, fresh.len());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FEED_URL: &str = "https://alerts.example/feed.json";

    #[test]
    fn test_parse_array_feed() {
        let document = json!([
            {
                "headline": "Flash floods hit coastal towns",
                "description": "Thousands evacuated as rivers burst banks",
                "link": "https://alerts.example/a/1",
                "region": "Bangladesh",
                "published": "2024-07-02T08:00:00Z"
            },
            "not an object",
            {
                "title": "Bank run on regional lender",
                "summary": "Depositors queue overnight",
                "category": "economic",
                "severity": 65,
                "regions": ["AR", "UY"]
            }
        ]);

        let candidates = parse_feed(&document, FEED_URL);
        assert_eq!(candidates.len(), 2);

        let floods = &candidates[0];
        assert_eq!(floods.get_str("title"), Some("Flash floods hit coastal towns"));
        assert_eq!(floods.get_str("type"), Some("Climate"));
        assert!(floods.get("severity").is_some());
        assert_eq!(floods.get("regions"), Some(&json!(["Bangladesh"])));
        assert_eq!(
            floods.get("sources"),
            Some(&json!(["https://alerts.example/a/1", format!("feed:{}", FEED_URL)]))
        );
        assert_eq!(floods.get_str("timestamp"), Some("2024-07-02T08:00:00Z"));

        let bank = &candidates[1];
        assert_eq!(bank.get_str("type"), Some("Economic"));
        assert_eq!(bank.get("severity"), Some(&json!(65)));
        assert_eq!(bank.get("regions"), Some(&json!(["AR", "UY"])));
    }

    #[test]
    fn test_parse_wrapped_feed() {
        let document = json!({"items": [{"title": "Heatwave", "summary": "Record temperatures"}]});
        assert_eq!(parse_feed(&document, FEED_URL).len(), 1);

        let document = json!({"entries": []});
        assert!(parse_feed(&document, FEED_URL).is_empty());

        assert!(parse_feed(&json!("garbage"), FEED_URL).is_empty());
    }

    #[test]
    fn test_unclassifiable_item_keeps_type_absent() {
        let item = json!({"title": "Community picnic", "summary": "Sunny afternoon"});
        let candidate = map_feed_item(item.as_object().unwrap(), FEED_URL);
        assert!(!candidate.contains("type"));
        assert!(candidate.contains("severity"));
    }

    #[test]
    fn test_empty_item_leaves_required_fields_absent() {
        let candidate = map_feed_item(&Map::new(), FEED_URL);
        assert!(!candidate.contains("title"));
        assert!(!candidate.contains("summary"));
        assert!(!candidate.contains("severity"));
        assert!(!candidate.contains("type"));
    }

    #[test]
    fn test_keep_unseen_skips_repeats_across_runs() {
        let mut collector =
            FeedCollector::new(CollectorConfig::default().with_id("feed-t"), Vec::new()).unwrap();
        let item = |title: &str| {
            Candidate::new()
                .with("title", title)
                .with("sources", json!(["https://alerts.example/a/1"]))
        };

        let first = collector.keep_unseen(vec![item("Dam breach"), item("dam breach"), item("Wildfire")]);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].get_str("signalType"), Some("feed"));

        let second = collector.keep_unseen(vec![item("Wildfire"), item("Landslide")]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].get_str("title"), Some("Landslide"));
        assert_eq!(collector.seen.len(), 3);
    }
}
