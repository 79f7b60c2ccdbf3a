/*
[INPUT]:  Error sources (HTTP transport, page extraction, payload schema, CSV, setup)
[OUTPUT]: Structured error types with pipeline stage and remediation hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the coinboard adapter
#[derive(Error, Debug)]
pub enum CoinboardError {
    /// HTTP transport failed (connect, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request exceeded the configured timeout
    #[error("Request to {url} timed out after {duration_secs}s")]
    Timeout { url: String, duration_secs: u64 },

    /// Server answered with a non-success status
    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The embedded state script element is not in the page
    #[error("Embedded payload element `{element_id}` not found in page")]
    MissingPayload { element_id: String },

    /// The embedded state script element does not hold valid JSON
    #[error("Embedded payload is malformed: {reason}")]
    MalformedPayload { reason: String },

    /// The listing array could not be reached through the expected key path
    #[error("Payload schema mismatch at `{segment}` of `{path}`: {found}")]
    SchemaMismatch {
        path: String,
        segment: String,
        found: String,
    },

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// CSV encoding/decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure of one pipeline run, handed to every caller that waited on it
    #[error(transparent)]
    Shared(Arc<CoinboardError>),
}

/// Failure families the presentation layer branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    MissingPayload,
    MalformedPayload,
    SchemaMismatch,
    Other,
}

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Setup,
    Fetch,
    Extract,
    Normalize,
    Export,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Setup => "setup",
            PipelineStage::Fetch => "fetch",
            PipelineStage::Extract => "extract",
            PipelineStage::Normalize => "normalize",
            PipelineStage::Export => "export",
        };
        f.write_str(name)
    }
}

/// What a user can do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    /// Source temporarily unreachable; try again later
    Retry,
    /// Source page format changed; needs a code update
    WaitForFix,
    /// Local input or configuration is wrong
    FixInput,
}

impl CoinboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoinboardError::Shared(inner) => inner.kind(),
            CoinboardError::Http(_)
            | CoinboardError::Timeout { .. }
            | CoinboardError::HttpStatus { .. } => ErrorKind::Network,
            CoinboardError::MissingPayload { .. } => ErrorKind::MissingPayload,
            CoinboardError::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            CoinboardError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            CoinboardError::UrlParse(_) | CoinboardError::Csv(_) | CoinboardError::Config(_) => {
                ErrorKind::Other
            }
        }
    }

    pub fn stage(&self) -> PipelineStage {
        match self {
            CoinboardError::Shared(inner) => inner.stage(),
            CoinboardError::Http(_)
            | CoinboardError::Timeout { .. }
            | CoinboardError::HttpStatus { .. } => PipelineStage::Fetch,
            CoinboardError::MissingPayload { .. } | CoinboardError::MalformedPayload { .. } => {
                PipelineStage::Extract
            }
            CoinboardError::SchemaMismatch { .. } => PipelineStage::Normalize,
            CoinboardError::Csv(_) => PipelineStage::Export,
            CoinboardError::UrlParse(_) | CoinboardError::Config(_) => PipelineStage::Setup,
        }
    }

    /// Check if the error is retryable
    ///
    /// Client errors other than 429 are not: asking again gets the same answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoinboardError::Shared(inner) => inner.is_retryable(),
            CoinboardError::Http(_) | CoinboardError::Timeout { .. } => true,
            CoinboardError::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }

    pub fn remediation(&self) -> Remediation {
        match self.kind() {
            ErrorKind::Network => Remediation::Retry,
            ErrorKind::MissingPayload | ErrorKind::MalformedPayload | ErrorKind::SchemaMismatch => {
                Remediation::WaitForFix
            }
            ErrorKind::Other => Remediation::FixInput,
        }
    }

    /// The underlying error, looking through [`CoinboardError::Shared`].
    pub fn root(&self) -> &CoinboardError {
        match self {
            CoinboardError::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Create a status error from a response status code
    pub fn status_error(url: impl Into<String>, status: StatusCode) -> Self {
        CoinboardError::HttpStatus {
            url: url.into(),
            status: status.as_u16(),
        }
    }
}

/// Result type alias for coinboard operations
pub type Result<T> = std::result::Result<T, CoinboardError>;
