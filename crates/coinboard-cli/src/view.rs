/*
[INPUT]:  Shared Snapshot and user-chosen view parameters
[OUTPUT]: Filtered rows, dimension line, change table and bar series
[POS]:    View layer - pure projections consumed by the renderers
[UPDATE]: When adding view controls or changing filter/slice order
*/

use std::cmp::Ordering;
use std::collections::BTreeSet;

use anyhow::{Result, bail};
use coinboard_adapter::{CSV_HEADER, ListingRecord, MAX_LISTINGS, Snapshot, Timeframe};

pub const DEFAULT_TOP_N: usize = 25;

/// Columns in the listing grid and the CSV download
pub const COLUMN_COUNT: usize = CSV_HEADER.len();

/// Which symbols the view keeps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CoinFilter {
    #[default]
    All,
    /// An empty set keeps nothing
    Only(BTreeSet<String>),
}

impl CoinFilter {
    pub fn only<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Self {
        CoinFilter::Only(symbols.into_iter().map(str::to_string).collect())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        match self {
            CoinFilter::All => true,
            CoinFilter::Only(symbols) => symbols.contains(symbol),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewParams {
    pub coins: CoinFilter,
    pub top_n: usize,
    pub timeframe: Timeframe,
    pub sort: bool,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            coins: CoinFilter::All,
            top_n: DEFAULT_TOP_N,
            timeframe: Timeframe::Day7,
            sort: true,
        }
    }
}

impl ViewParams {
    pub fn set_top_n(&mut self, top_n: usize) -> Result<()> {
        if !(1..=MAX_LISTINGS).contains(&top_n) {
            bail!("top N must be between 1 and {MAX_LISTINGS}, got {top_n}");
        }
        self.top_n = top_n;
        Ok(())
    }
}

/// Percent change in one window, with its sign flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Change {
    pub value: Option<f64>,
    /// `value > 0`; missing values are not positive
    pub positive: bool,
}

impl Change {
    fn of(value: Option<f64>) -> Self {
        Self {
            value,
            positive: value.is_some_and(|v| v > 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRow {
    pub symbol: String,
    pub hour_1: Change,
    pub hour_24: Change,
    pub day_7: Change,
}

impl ChangeRow {
    pub fn change(&self, timeframe: Timeframe) -> Change {
        match timeframe {
            Timeframe::Hour1 => self.hour_1,
            Timeframe::Hour24 => self.hour_24,
            Timeframe::Day7 => self.day_7,
        }
    }
}

/// One horizontal bar
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub value: Option<f64>,
    pub positive: bool,
}

/// Symbols in alphabetical order, for the coin picker.
pub fn sorted_symbols(snapshot: &Snapshot) -> Vec<String> {
    let mut symbols = snapshot.symbols().map(str::to_string).collect::<Vec<_>>();
    symbols.sort();
    symbols
}

/// Rows kept by the coin filter, in source order, before the top-N slice.
pub fn filtered_rows<'a>(snapshot: &'a Snapshot, params: &ViewParams) -> Vec<&'a ListingRecord> {
    snapshot
        .records()
        .iter()
        .filter(|record| params.coins.contains(&record.symbol))
        .collect()
}

/// Filter first, then take the first `top_n` rows.
pub fn select_rows<'a>(snapshot: &'a Snapshot, params: &ViewParams) -> Vec<&'a ListingRecord> {
    let mut rows = filtered_rows(snapshot, params);
    rows.truncate(params.top_n);
    rows
}

/// `(rows, columns)` of the filtered, unsliced table.
pub fn dimensions(snapshot: &Snapshot, params: &ViewParams) -> (usize, usize) {
    (filtered_rows(snapshot, params).len(), COLUMN_COUNT)
}

pub fn change_table(rows: &[&ListingRecord]) -> Vec<ChangeRow> {
    rows.iter()
        .map(|record| ChangeRow {
            symbol: record.symbol.clone(),
            hour_1: Change::of(record.percent_change_1h),
            hour_24: Change::of(record.percent_change_24h),
            day_7: Change::of(record.percent_change_7d),
        })
        .collect()
}

/// Bars for `timeframe`; with `sort` they ascend by value and missing values go last.
pub fn bar_series(rows: &[&ListingRecord], timeframe: Timeframe, sort: bool) -> Vec<Bar> {
    let mut bars = rows
        .iter()
        .map(|record| {
            let change = Change::of(record.percent_change(timeframe));
            Bar {
                symbol: record.symbol.clone(),
                value: change.value,
                positive: change.positive,
            }
        })
        .collect::<Vec<_>>();

    if sort {
        bars.sort_by(|a, b| match (a.value, b.value) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
    bars
}
