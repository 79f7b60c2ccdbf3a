/*
[INPUT]:  ParsedPayload (page state JSON) and a currency unit
[OUTPUT]: Snapshot of fixed-width ListingRecord rows + NormalizeReport
[POS]:    Normalization layer - the only code that knows the upstream schema
[UPDATE]: When the upstream listing schema drifts
*/

use std::collections::HashSet;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::http::{CoinboardError, Result};
use crate::types::{ListingRecord, MAX_LISTINGS, ParsedPayload, Snapshot};

/// state container -> domain section -> listings collection -> data array
pub const DEFAULT_LISTING_PATH: [&str; 5] = [
    "props",
    "initialState",
    "cryptocurrency",
    "listingLatest",
    "data",
];

/// JSON value shape, used in schema mismatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl Shape {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Shape::Null,
            Value::Bool(_) => Shape::Bool,
            Value::Number(_) => Shape::Number,
            Value::String(_) => Shape::String,
            Value::Array(_) => Shape::Array,
            Value::Object(_) => Shape::Object,
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Shape::Null => "null",
            Shape::Bool => "bool",
            Shape::Number => "number",
            Shape::String => "string",
            Shape::Array => "array",
            Shape::Object => "object",
        };
        f.write_str(name)
    }
}

/// Outcome of reading one key from a JSON node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step<'a> {
    Found(&'a Value),
    WrongShape { expected: Shape, actual: Shape },
    Absent,
}

/// Read `key` from `node`, reporting whether `node` was an object at all.
pub fn step<'a>(node: &'a Value, key: &str) -> Step<'a> {
    match node {
        Value::Object(map) => map.get(key).map_or(Step::Absent, Step::Found),
        other => Step::WrongShape {
            expected: Shape::Object,
            actual: Shape::of(other),
        },
    }
}

/// Follow `path` from `root`; any failed step becomes one `SchemaMismatch`.
pub fn descend<'a, S: AsRef<str>>(root: &'a Value, path: &[S]) -> Result<&'a Value> {
    let full_path = join_path(path);
    let mut node = root;

    for (depth, key) in path.iter().enumerate() {
        let key = key.as_ref();
        node = match step(node, key) {
            Step::Found(next) => next,
            Step::Absent => {
                return Err(CoinboardError::SchemaMismatch {
                    path: full_path,
                    segment: key.to_string(),
                    found: "key absent".to_string(),
                });
            }
            Step::WrongShape { expected, actual } => {
                let parent = if depth == 0 {
                    "<root>".to_string()
                } else {
                    join_path(&path[..depth])
                };
                return Err(CoinboardError::SchemaMismatch {
                    path: full_path,
                    segment: key.to_string(),
                    found: format!("expected {expected} at `{parent}`, found {actual}"),
                });
            }
        };
    }

    Ok(node)
}

fn join_path<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}

/// Where the listing array lives and how many rows a snapshot may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSchema {
    pub path: Vec<String>,
    pub max_listings: usize,
}

impl Default for ListingSchema {
    fn default() -> Self {
        Self {
            path: DEFAULT_LISTING_PATH.iter().map(|s| s.to_string()).collect(),
            max_listings: MAX_LISTINGS,
        }
    }
}

/// Row accounting for one normalize run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub listed: usize,
    pub kept: usize,
    pub skipped_invalid: usize,
    pub skipped_duplicate: usize,
    pub truncated: usize,
}

impl NormalizeReport {
    pub fn skipped(&self) -> usize {
        self.skipped_invalid + self.skipped_duplicate + self.truncated
    }
}

impl ListingSchema {
    pub fn listings<'a>(&self, payload: &'a ParsedPayload) -> Result<&'a [Value]> {
        let node = descend(payload.root(), self.path.as_slice())?;
        match node {
            Value::Array(items) => Ok(items),
            other => Err(CoinboardError::SchemaMismatch {
                path: join_path(self.path.as_slice()),
                segment: self.path.last().cloned().unwrap_or_default(),
                found: format!("expected array, found {}", Shape::of(other)),
            }),
        }
    }

    pub fn normalize(
        &self,
        payload: &ParsedPayload,
        currency: &str,
        source_url: &str,
    ) -> Result<(Snapshot, NormalizeReport)> {
        let listings = self.listings(payload)?;
        let mut report = NormalizeReport {
            listed: listings.len(),
            ..NormalizeReport::default()
        };
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(listings.len().min(self.max_listings));

        for (index, listing) in listings.iter().enumerate() {
            let Some(record) = project_listing(listing, currency) else {
                warn!(index, "skipping listing without usable slug/symbol");
                report.skipped_invalid += 1;
                continue;
            };

            if !seen.insert(record.symbol.clone()) {
                warn!(index, symbol = %record.symbol, "skipping duplicate symbol");
                report.skipped_duplicate += 1;
                continue;
            }

            if records.len() == self.max_listings {
                report.truncated += 1;
                continue;
            }
            records.push(record);
        }

        if report.truncated > 0 {
            debug!(
                truncated = report.truncated,
                max_listings = self.max_listings,
                "listing array longer than snapshot bound"
            );
        }

        report.kept = records.len();
        let snapshot = Snapshot::new(source_url, currency, Utc::now(), records);
        Ok((snapshot, report))
    }
}

/// Normalize with the default schema.
pub fn normalize(payload: &ParsedPayload, currency: &str, source_url: &str) -> Result<Snapshot> {
    ListingSchema::default()
        .normalize(payload, currency, source_url)
        .map(|(snapshot, _)| snapshot)
}

fn project_listing(listing: &Value, currency: &str) -> Option<ListingRecord> {
    let listing = listing.as_object()?;
    let name = non_empty_str(listing.get("slug"))?;
    let symbol = non_empty_str(listing.get("symbol"))?;
    let id = listing.get("id").and_then(coerce_i64);

    let quote = quote_for(listing, currency);
    let field = |key: &str| coerce_f64(quote.and_then(|q| q.get(key)));

    Some(ListingRecord {
        id,
        name,
        symbol,
        price: field("price"),
        percent_change_1h: field("percentChange1h"),
        percent_change_24h: field("percentChange24h"),
        percent_change_7d: field("percentChange7d"),
        market_cap: field("marketCap"),
        volume_24h: field("volume24h"),
    })
}

/// `quote.{currency}` object, falling back to the `quotes` array layout
/// (`[{ "name": "USD", ... }]`) some page revisions use.
fn quote_for<'a>(
    listing: &'a Map<String, Value>,
    currency: &str,
) -> Option<&'a Map<String, Value>> {
    if let Some(quote) = listing
        .get("quote")
        .and_then(|quote| quote.get(currency))
        .and_then(Value::as_object)
    {
        return Some(quote);
    }

    listing
        .get("quotes")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(Value::as_object)
        .find(|quote| quote.get("name").and_then(Value::as_str) == Some(currency))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Finite `f64` from a JSON number or numeric string; anything else is missing.
pub fn coerce_f64(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
