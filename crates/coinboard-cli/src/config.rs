/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed board configuration (source, HTTP, cache, default view)
[POS]:    Configuration layer - pipeline and view setup
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use anyhow::{Result, bail};
use coinboard_adapter::{
    CachePolicy, ClientConfig, DEFAULT_LISTINGS_URL, MAX_LISTINGS, RetryPolicy, Timeframe,
};
use serde::{Deserialize, Serialize};

use crate::view::{CoinFilter, DEFAULT_TOP_N, ViewParams};

/// Top-level configuration for the listings board
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

/// Where listings come from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Listings page URL
    #[serde(default = "default_url")]
    pub url: String,
    /// Quote unit; the page only embeds USD quotes
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            currency: default_currency(),
        }
    }
}

/// Outbound HTTP behavior
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Total attempts per fetch, first try included
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retries: default_retries(),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Snapshot lifetime; `null` keeps the first snapshot until refreshed
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// Initial view parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewConfig {
    /// Symbols to show; empty means all
    #[serde(default)]
    pub coins: Vec<String>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,
    #[serde(default = "default_sort")]
    pub sort: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            coins: Vec::new(),
            top_n: default_top_n(),
            timeframe: default_timeframe(),
            sort: default_sort(),
        }
    }
}

fn default_url() -> String {
    DEFAULT_LISTINGS_URL.to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retries() -> u32 {
    1
}

fn default_ttl_secs() -> Option<u64> {
    Some(300)
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_timeframe() -> Timeframe {
    Timeframe::Day7
}

fn default_sort() -> bool {
    true
}

impl BoardConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.source.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("source.url must be an http(s) URL, got `{}`", self.source.url);
        }
        if self.source.currency.trim().is_empty() {
            bail!("source.currency must not be empty");
        }
        if self.http.timeout_secs == 0 {
            bail!("http.timeout_secs must be positive");
        }
        if self.http.retries == 0 {
            bail!("http.retries counts the first attempt and must be at least 1");
        }
        if !(1..=MAX_LISTINGS).contains(&self.view.top_n) {
            bail!("view.top_n must be between 1 and {MAX_LISTINGS}, got {}", self.view.top_n);
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            user_agent: self.http.user_agent.clone(),
            retry: RetryPolicy::with_attempts(self.http.retries),
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        match self.cache.ttl_secs {
            Some(secs) => CachePolicy::with_ttl(Duration::from_secs(secs)),
            None => CachePolicy::forever(),
        }
    }

    pub fn view_params(&self) -> ViewParams {
        let coins = if self.view.coins.is_empty() {
            CoinFilter::All
        } else {
            CoinFilter::only(self.view.coins.iter().map(String::as_str))
        };
        ViewParams {
            coins,
            top_n: self.view.top_n,
            timeframe: self.view.timeframe,
            sort: self.view.sort,
        }
    }
}
