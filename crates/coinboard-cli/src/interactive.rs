/*
[INPUT]:  Snapshot cache, source settings and user input via dialoguer
[OUTPUT]: Board views, refreshed snapshots and CSV downloads
[POS]:    CLI interactive flow
[UPDATE]: When adding view controls or menu actions
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use coinboard_adapter::{MAX_LISTINGS, Snapshot, SnapshotCache, Timeframe};
use console::style;
use dialoguer::{Confirm, Input, MultiSelect, Select, theme::ColorfulTheme};
use tracing::warn;

use crate::board::{current_snapshot, describe_error, export_csv, render_board};
use crate::config::SourceConfig;
use crate::view::{CoinFilter, ViewParams, sorted_symbols};

pub async fn run_interactive(
    cache: &SnapshotCache,
    source: &SourceConfig,
    mut params: ViewParams,
) -> Result<()> {
    let theme = ColorfulTheme::default();
    println!("{}", style("Cryptocurrency Prices").bold().cyan());
    println!(
        "Retrieves prices for up to {MAX_LISTINGS} top cryptocurrencies. Currency: {}\n",
        source.currency
    );

    let Some(mut snapshot) = load(cache, source, &theme).await? else {
        return Ok(());
    };

    loop {
        let actions = [
            "View board",
            "Select coins",
            "Display top N coins",
            "Timeframe",
            "Toggle sorting",
            "Refresh data",
            "Download CSV",
            "Exit",
        ];
        let selection = Select::with_theme(&theme)
            .with_prompt("Select action")
            .items(&actions)
            .default(0)
            .interact()?;

        // actions that read listings go through the cache so expired data is refetched
        if matches!(selection, 0 | 1 | 6) {
            let (latest, notice) = current_snapshot(cache, source, &snapshot).await;
            if let Some(notice) = notice {
                println!("{}", style(notice).red());
            }
            snapshot = latest;
        }

        match selection {
            0 => println!("{}", render_board(&snapshot, &params)),
            1 => select_coins(&snapshot, &mut params, &theme)?,
            2 => select_top_n(&mut params, &theme)?,
            3 => select_timeframe(&mut params, &theme)?,
            4 => {
                params.sort = !params.sort;
                let state = if params.sort { "on" } else { "off" };
                println!("{}", style(format!("Sorting {state}")).yellow());
            }
            5 => match cache.refresh(&source.url, &source.currency).await {
                Ok(fresh) => {
                    println!("{}", style(format!("Loaded {} listings.", fresh.len())).green());
                    snapshot = fresh;
                }
                Err(err) => {
                    warn!(error = %err, "refresh failed; showing previous snapshot");
                    println!("{}", style(describe_error(&err)).red());
                }
            },
            6 => download_csv(&snapshot, &params, &theme)?,
            _ => return Ok(()),
        }
    }
}

/// First load; offers a retry on failure. `None` means the user gave up.
async fn load(
    cache: &SnapshotCache,
    source: &SourceConfig,
    theme: &ColorfulTheme,
) -> Result<Option<Arc<Snapshot>>> {
    loop {
        match cache.get_snapshot(&source.url, &source.currency).await {
            Ok(snapshot) => return Ok(Some(snapshot)),
            Err(err) => {
                println!("{}", style(describe_error(&err)).red());
                let retry = Confirm::with_theme(theme)
                    .with_prompt("Try again?")
                    .default(err.is_retryable())
                    .interact()?;
                if !retry {
                    return Ok(None);
                }
            }
        }
    }
}

fn select_coins(snapshot: &Snapshot, params: &mut ViewParams, theme: &ColorfulTheme) -> Result<()> {
    let symbols = sorted_symbols(snapshot);
    let defaults = symbols
        .iter()
        .map(|symbol| params.coins.contains(symbol))
        .collect::<Vec<_>>();

    let chosen = MultiSelect::with_theme(theme)
        .with_prompt("Cryptocurrency (space to toggle)")
        .items(&symbols)
        .defaults(&defaults)
        .interact()?;

    params.coins = if chosen.len() == symbols.len() {
        CoinFilter::All
    } else {
        CoinFilter::only(chosen.iter().map(|&idx| symbols[idx].as_str()))
    };
    if chosen.is_empty() {
        println!("{}", style("No coins selected.").yellow());
    }
    Ok(())
}

fn select_top_n(params: &mut ViewParams, theme: &ColorfulTheme) -> Result<()> {
    let top_n: usize = Input::with_theme(theme)
        .with_prompt(format!("Display top N coins (1-{MAX_LISTINGS})"))
        .default(params.top_n)
        .validate_with(|n: &usize| -> std::result::Result<(), String> {
            if (1..=MAX_LISTINGS).contains(n) {
                Ok(())
            } else {
                Err(format!("enter a number between 1 and {MAX_LISTINGS}"))
            }
        })
        .interact_text()?;
    params.set_top_n(top_n)
}

fn select_timeframe(params: &mut ViewParams, theme: &ColorfulTheme) -> Result<()> {
    let labels = Timeframe::ALL.map(|timeframe| timeframe.as_str());
    let current = Timeframe::ALL
        .iter()
        .position(|&timeframe| timeframe == params.timeframe)
        .unwrap_or(0);

    let selection = Select::with_theme(theme)
        .with_prompt("Timeframe")
        .items(&labels)
        .default(current)
        .interact()?;
    params.timeframe = Timeframe::ALL[selection];
    Ok(())
}

fn download_csv(snapshot: &Snapshot, params: &ViewParams, theme: &ColorfulTheme) -> Result<()> {
    let path: String = Input::with_theme(theme)
        .with_prompt("Save CSV to")
        .default("crypto.csv".to_string())
        .interact_text()?;

    match export_csv(snapshot, params, &PathBuf::from(&path)) {
        Ok(rows) => println!("{}", style(format!("Wrote {rows} rows to {path}")).green()),
        Err(err) => println!("{}", style(format!("Download failed: {err:#}")).red()),
    }
    Ok(())
}
