//! HTTP client for collectors
//!
//! Every request carries the collector's timeout so a stalled source can
//! never hold up a run indefinitely.

use reqwest::Client;
use tracing::{debug, warn};

use crate::{CollectorConfig, CollectorError};

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Identifies us honestly when rotation is off
pub const DEFAULT_USER_AGENT: &str = "crisiswire-collector/0.1";

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Create an HTTP client for a collector
pub fn create_client(config: &CollectorConfig) -> Result<Client, CollectorError> {
    let user_agent = if config.rotate_user_agent {
        random_user_agent()
    } else {
        DEFAULT_USER_AGENT
    };

    Client::builder()
        .timeout(config.request_timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| CollectorError::Network(e.to_string()))
}

/// GET a URL and return its body, treating non-2xx as an error
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, CollectorError> {
    debug!("Fetching: {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CollectorError::Network(e.to_string()))?;

    if !response.status().is_success() {
        warn!("Fetch of {} returned status: {}", url, response.status());
        return Err(CollectorError::Network(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| CollectorError::Network(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_user_agent() {
        let ua = random_user_agent();
        assert!(ua.contains("Mozilla"));
    }

    #[test]
    fn test_create_client() {
        let config = CollectorConfig {
            rotate_user_agent: false,
            ..Default::default()
        };
        assert!(create_client(&config).is_ok());
    }
}
