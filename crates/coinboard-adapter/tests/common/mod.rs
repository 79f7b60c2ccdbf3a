/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for coinboard-adapter tests

use serde_json::{Value, json};
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// One listing in the upstream page-state shape
#[allow(dead_code)]
pub fn listing(slug: &str, symbol: &str, price: f64, change_7d: Option<f64>) -> Value {
    let mut usd = json!({
        "price": price,
        "percentChange1h": 0.1,
        "percentChange24h": -0.4,
        "marketCap": price * 1000.0,
        "volume24h": price * 10.0,
    });
    if let Some(change) = change_7d {
        usd["percentChange7d"] = json!(change);
    }
    json!({
        "id": price as i64,
        "slug": slug,
        "symbol": symbol,
        "quote": { "USD": usd },
    })
}

/// Full HTML page embedding `listings` under the page-state script
pub fn listings_page(listings: Vec<Value>) -> String {
    let state = json!({
        "props": {
            "initialState": {
                "cryptocurrency": {
                    "listingLatest": { "data": listings }
                }
            }
        }
    });
    format!(
        "<!DOCTYPE html><html><head><title>Cryptocurrency Prices</title></head><body>\
         <div id=\"__next\"></div>\
         <script id=\"__NEXT_DATA__\" type=\"application/json\">{state}</script>\
         </body></html>"
    )
}

/// The three-coin page used across integration tests
#[allow(dead_code)]
pub fn three_coin_page() -> String {
    listings_page(vec![
        listing("bitcoin", "BTC", 60000.0, Some(5.0)),
        listing("ethereum", "ETH", 3000.0, None),
        listing("tether", "USDT", 1.0, Some(-0.01)),
    ])
}
