/*
[INPUT]:  Optional listings page URL (first CLI argument)
[OUTPUT]: Top listings printed to stdout
[POS]:    Examples - one-shot snapshot fetch through the cache
[UPDATE]: When the public pipeline API changes
*/

use std::sync::Arc;

use coinboard_adapter::*;

/// Example: fetch one snapshot and print the first ten rows
#[tokio::main]
async fn main() {
    println!("=== Coinboard Listings Example ===\n");

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_LISTINGS_URL.to_string());

    let client = match ListingsClient::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    let cache = SnapshotCache::new(Arc::new(client));

    println!("Fetching {}...", url);
    let snapshot = match cache.get_snapshot(&url, "USD").await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            println!("✗ Error ({:?}): {}", e.kind(), e);
            return;
        }
    };
    println!("✓ {} listings fetched at {}\n", snapshot.len(), snapshot.fetched_at);

    for record in snapshot.records().iter().take(10) {
        let price = record
            .price
            .map(|p| format!("{:.4}", p))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<8} {:<20} {:>16}", record.symbol, record.name, price);
    }

    // Second call is served from the cache
    if let Ok(again) = cache.get_snapshot(&url, "USD").await {
        println!("\n✓ Cached snapshot reused: {}", Arc::ptr_eq(&snapshot, &again));
    }
}
