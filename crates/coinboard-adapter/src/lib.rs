/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public listings adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod cache;
pub mod export;
pub mod http;
pub mod normalize;
pub mod payload;
pub mod types;

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    CoinboardError,
    DEFAULT_LISTINGS_URL,
    ErrorKind,
    Fetcher,
    ListingsClient,
    PipelineStage,
    Remediation,
    Result,
    RetryPolicy,
};

pub use cache::{CachePolicy, CacheStats, InMemoryStore, SnapshotCache, SnapshotStore};
pub use export::{CSV_HEADER, read_csv, to_csv_string, write_csv};
pub use normalize::{ListingSchema, NormalizeReport, normalize};
pub use payload::{PayloadLocator, extract};

// Re-export all types
pub use types::*;
