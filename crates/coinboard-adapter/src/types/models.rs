/*
[INPUT]:  Listing page schema and normalized table requirements
[OUTPUT]: Typed Rust structs for documents, payloads, rows and snapshots
[POS]:    Data layer - type definitions shared by the pipeline stages
[UPDATE]: When the normalized table gains or loses a column
*/

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on rows per snapshot; the source page lists the top 100.
pub const MAX_LISTINGS: usize = 100;

/// Raw HTTP response body for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl RawDocument {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            body: body.into(),
        }
    }
}

/// Generic JSON tree parsed out of the page's embedded state script.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPayload(Value);

impl ParsedPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn root(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for ParsedPayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One asset row of a snapshot.
///
/// Numeric fields are `None` when the source omitted them or sent something
/// that is not a finite number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub symbol: String,
    pub price: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
}

impl ListingRecord {
    /// Percent change for the given window.
    pub fn percent_change(&self, timeframe: Timeframe) -> Option<f64> {
        match timeframe {
            Timeframe::Hour1 => self.percent_change_1h,
            Timeframe::Hour24 => self.percent_change_24h,
            Timeframe::Day7 => self.percent_change_7d,
        }
    }

    /// Number of numeric fields recorded as missing.
    pub fn missing_fields(&self) -> usize {
        [
            self.price,
            self.percent_change_1h,
            self.percent_change_24h,
            self.percent_change_7d,
            self.market_cap,
            self.volume_24h,
        ]
        .iter()
        .filter(|value| value.is_none())
        .count()
    }
}

/// Percent-change window reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "24h")]
    Hour24,
    #[serde(rename = "7d")]
    Day7,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Day7, Timeframe::Hour24, Timeframe::Hour1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Hour1 => "1h",
            Timeframe::Hour24 => "24h",
            Timeframe::Day7 => "7d",
        }
    }

    /// Human label used above charts, e.g. "7 day period".
    pub fn period_label(&self) -> &'static str {
        match self {
            Timeframe::Hour1 => "1 hour period",
            Timeframe::Hour24 => "24 hour period",
            Timeframe::Day7 => "7 day period",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1h" => Ok(Timeframe::Hour1),
            "24h" => Ok(Timeframe::Hour24),
            "7d" => Ok(Timeframe::Day7),
            other => Err(format!("unknown timeframe `{other}` (expected 1h, 24h or 7d)")),
        }
    }
}

/// Immutable, ordered table produced by one fetch + normalize cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source_url: String,
    pub currency: String,
    pub fetched_at: DateTime<Utc>,
    records: Vec<ListingRecord>,
}

impl Snapshot {
    pub fn new(
        source_url: impl Into<String>,
        currency: impl Into<String>,
        fetched_at: DateTime<Utc>,
        records: Vec<ListingRecord>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            currency: currency.into(),
            fetched_at,
            records,
        }
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&ListingRecord> {
        self.records.iter().find(|record| record.symbol == symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.symbol.as_str())
    }
}
