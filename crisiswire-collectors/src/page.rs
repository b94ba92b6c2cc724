//! Page Collector
//!
//! Scrapes public web pages (advisories, situation reports, bulletins) and
//! turns each page into one candidate.
//! - Reads: HTML pages from a fixed URL list
//! - Emits: candidates tagged `signalType = "scrape"`

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crisiswire_core::Candidate;

use crate::{
    classify, create_client, estimate_severity, fetch_text, tag_provenance, Collector,
    CollectorConfig, CollectorError,
};

/// Maximum characters kept from a page body
const MAX_CONTENT_CHARS: usize = 4000;

/// Text pulled out of one page
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    /// `<meta name="description">`, when the page has one
    pub description: Option<String>,
    pub text: String,
}

/// Extract title, meta description and visible body text from HTML
pub fn extract_content(html: &str) -> (Option<String>, Option<String>, String) {
    use scraper::node::Node;

    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").unwrap();
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let meta_selector = Selector::parse(r#"meta[name="description"]"#).unwrap();
    let description = document
        .select(&meta_selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(normalize_whitespace)
        .filter(|d| !d.is_empty());

    let body_selector = Selector::parse("body").unwrap();
    let text = match document.select(&body_selector).next() {
        Some(body) => {
            let mut parts = Vec::new();
            for node_ref in body.descendants() {
                if let Node::Text(text_node) = node_ref.value() {
                    let hidden = node_ref.ancestors().any(|ancestor| {
                        ancestor
                            .value()
                            .as_element()
                            .map(|el| matches!(el.name(), "script" | "style" | "noscript"))
                            .unwrap_or(false)
                    });

                    let trimmed = text_node.trim();
                    if !hidden && !trimmed.is_empty() {
                        parts.push(trimmed.to_string());
                    }
                }
            }
            normalize_whitespace(&parts.join(" "))
        }
        None => String::new(),
    };

    (title, description, text)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Build a candidate from a scraped page.
///
/// Returns `None` for pages with no usable text.
pub fn page_candidate(page: &ScrapedPage) -> Option<Candidate> {
    if page.text.is_empty() && page.description.is_none() {
        return None;
    }

    let title = page.title.clone().unwrap_or_else(|| page.url.clone());
    let summary = page.description.clone().unwrap_or_else(|| page.text.clone());
    let text = format!("{} {} {}", title, summary, page.text);

    let mut candidate = Candidate::new()
        .with("title", title)
        .with("summary", summary)
        .with("severity", estimate_severity(&text))
        .with("sources", vec![page.url.clone()]);

    if let Some(category) = classify(&text) {
        candidate.set("type", category.as_str());
    }

    Some(candidate)
}

/// Page collector - scrapes a fixed set of web pages
pub struct PageCollector {
    config: CollectorConfig,
    client: Client,
    pages: Vec<String>,
    scraped_urls: HashSet<String>,
}

impl PageCollector {
    pub fn new(config: CollectorConfig, pages: Vec<String>) -> Result<Self, CollectorError> {
        let client = create_client(&config)?;
        Ok(Self {
            config,
            client,
            pages,
            scraped_urls: HashSet::new(),
        })
    }
}

async fn scrape_page(client: &Client, url: &str) -> Result<ScrapedPage, CollectorError> {
    let html = fetch_text(client, url).await?;
    let (title, description, text) = extract_content(&html);

    Ok(ScrapedPage {
        url: url.to_string(),
        title,
        description,
        text: truncate_chars(&text, MAX_CONTENT_CHARS),
    })
}

#[async_trait]
impl Collector for PageCollector {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn signal_type(&self) -> &str {
        "scrape"
    }

    async fn collect(&mut self) -> Result<Vec<Candidate>, CollectorError> {
        let urls: Vec<String> = self
            .pages
            .iter()
            .filter(|url| !self.scraped_urls.contains(*url))
            .take(self.config.max_items)
            .cloned()
            .collect();

        if urls.is_empty() {
            return Err(CollectorError::NoWork);
        }

        info!("Page collector processing {} URLs", urls.len());

        // Mark as scraped even if it fails, to avoid retrying
        self.scraped_urls.extend(urls.iter().cloned());

        let client = &self.client;
        let pages: Vec<ScrapedPage> = stream::iter(urls)
            .map(|url| async move {
                match scrape_page(client, &url).await {
                    Ok(page) => Some(page),
                    Err(e) => {
                        warn!("Failed to scrape {}: {}", url, e);
                        None
                    }
                }
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .filter_map(|page| async { page })
            .collect()
            .await;

        let candidates: Vec<Candidate> = pages
            .iter()
            .filter_map(|page| {
                let candidate = page_candidate(page);
                if candidate.is_none() {
                    debug!("Empty content from {}", page.url);
                }
                candidate
            })
            .map(|candidate| tag_provenance(candidate, "scrape", &self.config.id))
            .collect();

        if candidates.is_empty() {
            return Err(CollectorError::NoWork);
        }

        info!("Page collector emitted {} candidates", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ADVISORY: &str = r#"
        <html>
        <head>
            <title>Advisory: Ransomware   campaign</title>
            <meta name="description" content="Hospitals targeted by ransomware affiliate">
        </head>
        <body>
            <script>var tracker = 1;</script>
            <h1>Critical advisory</h1>
            <p>Attackers exploit an unpatched VPN appliance.</p>
            <style>.banner { color: red; }</style>
            <noscript>Enable JavaScript</noscript>
        </body>
        </html>
    "#;

    #[test]
    fn test_extract_content() {
        let (title, description, text) = extract_content(ADVISORY);

        assert_eq!(title.as_deref(), Some("Advisory: Ransomware campaign"));
        assert_eq!(
            description.as_deref(),
            Some("Hospitals targeted by ransomware affiliate")
        );
        assert!(text.contains("Critical advisory"));
        assert!(text.contains("unpatched VPN"));
        assert!(!text.contains("tracker"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Enable JavaScript"));
    }

    #[test]
    fn test_page_candidate() {
        let (title, description, text) = extract_content(ADVISORY);
        let page = ScrapedPage {
            url: "https://cert.example/advisory/42".to_string(),
            title,
            description,
            text,
        };

        let candidate = page_candidate(&page).unwrap();
        assert_eq!(candidate.get_str("title"), Some("Advisory: Ransomware campaign"));
        assert_eq!(
            candidate.get_str("summary"),
            Some("Hospitals targeted by ransomware affiliate")
        );
        assert_eq!(candidate.get_str("type"), Some("Cyber"));
        assert_eq!(
            candidate.get("sources"),
            Some(&json!(["https://cert.example/advisory/42"]))
        );
    }

    #[test]
    fn test_untitled_page_uses_url_and_body() {
        let page = ScrapedPage {
            url: "https://example.org/notice".to_string(),
            title: None,
            description: None,
            text: "Water supply restored".to_string(),
        };

        let candidate = page_candidate(&page).unwrap();
        assert_eq!(candidate.get_str("title"), Some("https://example.org/notice"));
        assert_eq!(candidate.get_str("summary"), Some("Water supply restored"));
    }

    #[test]
    fn test_empty_page_is_skipped() {
        let page = ScrapedPage {
            url: "https://example.org/blank".to_string(),
            title: Some("Blank".to_string()),
            description: None,
            text: String::new(),
        };
        assert!(page_candidate(&page).is_none());
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
