/*
[INPUT]:  Listing page URL
[OUTPUT]: RawDocument (HTTP body) or a network error
[POS]:    HTTP layer - page retrieval seam used by the snapshot cache
[UPDATE]: When changing retry behavior or the fetch contract
*/

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, warn};

use crate::http::{ListingsClient, Result};
use crate::types::RawDocument;

/// Retrieves the raw listings page.
///
/// Implemented by [`ListingsClient`]; tests substitute in-memory fetchers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawDocument>;
}

#[async_trait]
impl Fetcher for ListingsClient {
    async fn fetch(&self, url: &str) -> Result<RawDocument> {
        let url = Url::parse(url)?;
        let policy = &self.config().retry;
        let mut attempt = 1;

        loop {
            debug!(%url, attempt, "fetching listings page");
            match self.get_text(&url).await {
                Ok((status, body)) => {
                    debug!(%url, status, bytes = body.len(), "listings page fetched");
                    return Ok(RawDocument::new(url.as_str(), status, body));
                }
                Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        %url,
                        attempt,
                        max_attempts = policy.max_attempts,
                        ?delay,
                        error = %err,
                        "listings fetch failed; retrying with backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
