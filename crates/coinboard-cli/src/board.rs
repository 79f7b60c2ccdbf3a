/*
[INPUT]:  Snapshot, ViewParams, export path, pipeline errors
[OUTPUT]: Full board text, CSV download file, user-facing error messages
[POS]:    Presentation layer - composes view projections for both CLI modes
[UPDATE]: When the board layout, download contract or error wording changes
*/

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use coinboard_adapter::{CoinboardError, Remediation, Snapshot, SnapshotCache, write_csv};
use tracing::{info, warn};

use crate::config::SourceConfig;

use crate::render::{
    render_bar_chart, render_change_table, render_dimensions, render_grid, render_heading,
};
use crate::view::{ViewParams, bar_series, change_table, dimensions, filtered_rows, select_rows};

pub fn render_board(snapshot: &Snapshot, params: &ViewParams) -> String {
    let rows = select_rows(snapshot, params);
    let table = change_table(&rows);
    let bars = bar_series(&rows, params.timeframe, params.sort);

    [
        render_heading(snapshot),
        render_dimensions(dimensions(snapshot, params)),
        render_grid(&rows),
        render_change_table(&table),
        render_bar_chart(&bars, params.timeframe),
    ]
    .join("\n")
}

/// Write the filtered rows (ignoring top N) as CSV; returns the row count.
pub fn export_csv(snapshot: &Snapshot, params: &ViewParams, path: &Path) -> Result<usize> {
    let rows = filtered_rows(snapshot, params);
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_csv(BufWriter::new(file), rows.iter().copied()).context("write CSV")?;
    info!(path = %path.display(), rows = rows.len(), "CSV exported");
    Ok(rows.len())
}

/// Snapshot to show now, read through the cache so its TTL applies.
///
/// On failure falls back to the last stored snapshot (or `shown`) and returns
/// the message to display alongside it.
pub async fn current_snapshot(
    cache: &SnapshotCache,
    source: &SourceConfig,
    shown: &Arc<Snapshot>,
) -> (Arc<Snapshot>, Option<String>) {
    match cache.get_snapshot(&source.url, &source.currency).await {
        Ok(snapshot) => (snapshot, None),
        Err(err) => {
            warn!(error = %err, "snapshot reload failed; showing last good snapshot");
            let fallback = cache
                .last_good(&source.url, &source.currency)
                .unwrap_or_else(|| Arc::clone(shown));
            (fallback, Some(describe_error(&err)))
        }
    }
}

pub fn describe_error(err: &CoinboardError) -> String {
    match err.remediation() {
        Remediation::Retry => format!(
            "The listings source is temporarily unreachable ({err}). Please try again shortly."
        ),
        Remediation::WaitForFix => format!(
            "The listings page format has changed ({err}). Please wait for an updated release."
        ),
        Remediation::FixInput => format!("Invalid input: {err}"),
    }
}
