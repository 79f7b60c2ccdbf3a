/*
[INPUT]:  View projections (rows, change table, bar series)
[OUTPUT]: Terminal-ready strings with console colors
[POS]:    Presentation layer - text rendering
[UPDATE]: When changing table layout or chart appearance
*/

use std::fmt::Write as _;

use coinboard_adapter::{CSV_HEADER, ListingRecord, Snapshot, Timeframe};
use console::style;

use crate::view::{Bar, Change, ChangeRow};

const BAR_WIDTH: usize = 40;

fn number(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "-".to_string(),
    }
}

/// Pads before styling so escape codes do not skew the columns.
fn colored_change(change: Change, width: usize) -> String {
    let text = format!("{:>width$}", number(change.value, 2));
    if change.positive {
        style(text).green().to_string()
    } else if change.value.is_some() {
        style(text).red().to_string()
    } else {
        style(text).dim().to_string()
    }
}

pub fn render_heading(snapshot: &Snapshot) -> String {
    format!(
        "{}\n{} {} ({}, fetched {})",
        style("Price Data of selected Cryptocurrency").bold().cyan(),
        style("Source:").dim(),
        snapshot.source_url,
        snapshot.currency,
        snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub fn render_dimensions((rows, columns): (usize, usize)) -> String {
    format!("Data Dimension: {rows} rows and {columns} columns.")
}

/// Listing grid in CSV column order.
pub fn render_grid(rows: &[&ListingRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<8} {:>14} {:>16} {:>16} {:>15} {:>20} {:>18}",
        CSV_HEADER[0],
        CSV_HEADER[1],
        CSV_HEADER[2],
        CSV_HEADER[3],
        CSV_HEADER[4],
        CSV_HEADER[5],
        CSV_HEADER[6],
        CSV_HEADER[7],
    );
    for record in rows {
        let _ = writeln!(
            out,
            "{:<20} {:<8} {:>14} {:>16} {:>16} {:>15} {:>20} {:>18}",
            record.name,
            record.symbol,
            number(record.price, 4),
            number(record.percent_change_1h, 2),
            number(record.percent_change_24h, 2),
            number(record.percent_change_7d, 2),
            number(record.market_cap, 0),
            number(record.volume_24h, 0),
        );
    }
    out
}

/// Percent changes per symbol; green when positive, red otherwise.
pub fn render_change_table(table: &[ChangeRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style("Table of percentual Price Change").bold());
    let _ = writeln!(out, "{:<8} {:>10} {:>10} {:>10}", "symbol", "1h", "24h", "7d");
    for row in table {
        let cells = [row.hour_1, row.hour_24, row.day_7].map(|change| colored_change(change, 10));
        let _ = writeln!(out, "{:<8} {} {} {}", row.symbol, cells[0], cells[1], cells[2]);
    }
    out
}

/// Horizontal bar chart scaled to the largest magnitude.
pub fn render_bar_chart(bars: &[Bar], timeframe: Timeframe) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        style("Bar Plot of percentual Price Change").bold(),
        style(format!("({})", timeframe.period_label())).italic()
    );

    let max = bars
        .iter()
        .filter_map(|bar| bar.value)
        .map(f64::abs)
        .fold(0.0_f64, f64::max);

    for bar in bars {
        let Some(value) = bar.value else {
            let _ = writeln!(out, "{:<8} {}", bar.symbol, style("n/a").dim());
            continue;
        };
        let len = if max > 0.0 {
            ((value.abs() / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let body = "█".repeat(len.max(1));
        let body = if bar.positive {
            style(body).green()
        } else {
            style(body).red()
        };
        let _ = writeln!(out, "{:<8} {} {:.2}", bar.symbol, body, value);
    }
    out
}
