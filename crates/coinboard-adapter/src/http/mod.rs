/*
[INPUT]:  HTTP client configuration and listing page URL
[OUTPUT]: Raw page documents and typed network errors
[POS]:    HTTP layer - page retrieval
[UPDATE]: When adding new fetch options or changing client behavior
*/

pub mod client;
pub mod error;
pub mod fetcher;

pub use error::{CoinboardError, ErrorKind, PipelineStage, Remediation, Result};
pub use fetcher::Fetcher;

pub use client::{ClientConfig, DEFAULT_LISTINGS_URL, ListingsClient, RetryPolicy};
