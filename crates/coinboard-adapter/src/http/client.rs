/*
[INPUT]:  HTTP configuration (timeouts, user agent, retry policy)
[OUTPUT]: Configured reqwest client ready to fetch listing pages
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use crate::http::{CoinboardError, Result};
use reqwest::{Client, Url};
use std::time::Duration;

/// Default listings page
pub const DEFAULT_LISTINGS_URL: &str = "https://coinmarketcap.com/";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Bounded retry with exponential backoff.
///
/// `max_attempts` counts the first try, so the default of 1 never retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

/// HTTP client for the listings page
#[derive(Debug, Clone)]
pub struct ListingsClient {
    http_client: Client,
    config: ClientConfig,
}

impl ListingsClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let http_client = builder.build()?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issue a single GET and return the body of a 2xx response
    pub(crate) async fn get_text(&self, url: &Url) -> Result<(u16, String)> {
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.transport_error(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoinboardError::status_error(url.as_str(), status));
        }

        let body = response
            .text()
            .await
            .map_err(|err| self.transport_error(url, err))?;
        Ok((status.as_u16(), body))
    }

    fn transport_error(&self, url: &Url, err: reqwest::Error) -> CoinboardError {
        if err.is_timeout() {
            CoinboardError::Timeout {
                url: url.to_string(),
                duration_secs: self.config.timeout.as_secs(),
            }
        } else {
            CoinboardError::Http(err)
        }
    }
}
