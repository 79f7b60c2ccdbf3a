/*
[INPUT]:  ListingRecord rows (usually a filtered subset of a Snapshot)
[OUTPUT]: CSV bytes with the fixed download header, and rows decoded back
[POS]:    Export layer - CSV contract shared with downstream consumers
[UPDATE]: Never reorder or rename columns; downstream tools depend on them
*/

use std::io::{self, Read, Write};
use std::string::FromUtf8Error;

use serde::{Deserialize, Serialize};

use crate::http::{CoinboardError, Result};
use crate::types::ListingRecord;

pub const CSV_HEADER: [&str; 8] = [
    "name",
    "symbol",
    "price",
    "percentChange1h",
    "percentChange24h",
    "percentChange7d",
    "marketCap",
    "volume24h",
];

/// Wire shape of one CSV row; `None` is written as an empty field.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    name: String,
    symbol: String,
    price: Option<f64>,
    #[serde(rename = "percentChange1h")]
    percent_change_1h: Option<f64>,
    #[serde(rename = "percentChange24h")]
    percent_change_24h: Option<f64>,
    #[serde(rename = "percentChange7d")]
    percent_change_7d: Option<f64>,
    #[serde(rename = "marketCap")]
    market_cap: Option<f64>,
    #[serde(rename = "volume24h")]
    volume_24h: Option<f64>,
}

impl From<&ListingRecord> for CsvRow {
    fn from(record: &ListingRecord) -> Self {
        Self {
            name: record.name.clone(),
            symbol: record.symbol.clone(),
            price: record.price,
            percent_change_1h: record.percent_change_1h,
            percent_change_24h: record.percent_change_24h,
            percent_change_7d: record.percent_change_7d,
            market_cap: record.market_cap,
            volume_24h: record.volume_24h,
        }
    }
}

impl From<CsvRow> for ListingRecord {
    fn from(row: CsvRow) -> Self {
        let finite = |value: Option<f64>| value.filter(|v| v.is_finite());
        Self {
            id: None,
            name: row.name,
            symbol: row.symbol,
            price: finite(row.price),
            percent_change_1h: finite(row.percent_change_1h),
            percent_change_24h: finite(row.percent_change_24h),
            percent_change_7d: finite(row.percent_change_7d),
            market_cap: finite(row.market_cap),
            volume_24h: finite(row.volume_24h),
        }
    }
}

/// Write `rows` as CSV (header included) into `writer`.
pub fn write_csv<'a, W, I>(writer: W, rows: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a ListingRecord>,
{
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;
    for record in rows {
        csv_writer.serialize(CsvRow::from(record))?;
    }
    csv_writer
        .flush()
        .map_err(|err| CoinboardError::Csv(csv::Error::from(err)))?;
    Ok(())
}

pub fn to_csv_string<'a, I>(rows: I) -> Result<String>
where
    I: IntoIterator<Item = &'a ListingRecord>,
{
    let mut buffer = Vec::new();
    write_csv(&mut buffer, rows)?;
    String::from_utf8(buffer).map_err(not_utf8)
}

fn not_utf8(err: FromUtf8Error) -> CoinboardError {
    CoinboardError::Csv(csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, err)))
}

/// Decode rows written by [`write_csv`]; the header must match exactly.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<ListingRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?;
    if headers.iter().ne(CSV_HEADER.iter().copied()) {
        return Err(CoinboardError::Config(format!(
            "unexpected CSV header `{}`",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    csv_reader
        .deserialize::<CsvRow>()
        .map(|row| row.map(ListingRecord::from).map_err(CoinboardError::from))
        .collect()
}
