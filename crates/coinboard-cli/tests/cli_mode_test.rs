/*
[INPUT]:  coinboard binary, sample config, mock listings page
[OUTPUT]: Test results for one-shot CLI mode
[POS]:    Integration tests - binary smoke tests
[UPDATE]: When CLI flags or one-shot output change
*/

use std::process::{Command, Output};

use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const BINARY: &str = env!("CARGO_BIN_EXE_coinboard");

fn sample_config() -> String {
    format!("{}/config/coinboard.yaml", env!("CARGO_MANIFEST_DIR"))
}

fn listings_page() -> String {
    let listing = |slug: &str, symbol: &str, price: f64, change_7d: f64| {
        serde_json::json!({
            "id": price as i64,
            "slug": slug,
            "symbol": symbol,
            "quote": { "USD": {
                "price": price,
                "percentChange1h": 0.2,
                "percentChange24h": -1.1,
                "percentChange7d": change_7d,
                "marketCap": price * 1000.0,
                "volume24h": price * 10.0
            } }
        })
    };
    let state = serde_json::json!({
        "props": { "initialState": { "cryptocurrency": { "listingLatest": { "data": [
            listing("bitcoin", "BTC", 60000.0, 4.2),
            listing("ethereum", "ETH", 3000.0, -2.4),
            listing("solana", "SOL", 150.0, 9.9),
        ] } } } }
    });
    format!(
        "<html><body>\
         <script id=\"__NEXT_DATA__\" type=\"application/json\">{state}</script>\
         </body></html>"
    )
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "Process exited with non-zero status: {}\nStdout: {}\nStderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn cli_mode_with_config_and_dry_run_works() {
    let output = Command::new(BINARY)
        .arg("--config")
        .arg(sample_config())
        .arg("--dry-run")
        .arg("--log-level")
        .arg("error")
        .output()
        .expect("Failed to start coinboard binary");

    assert_success(&output);
}

#[test]
fn dry_run_rejects_out_of_range_top_n() {
    let output = Command::new(BINARY)
        .args(["--dry-run", "--log-level", "error", "--top", "0"])
        .output()
        .expect("Failed to start coinboard binary");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("top_n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn one_shot_prints_board_and_writes_csv() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listings_page()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let csv_path = dir.path().join("crypto.csv");
    let uri = server.uri();
    let csv_arg = csv_path.clone();

    let output = tokio::task::spawn_blocking(move || {
        Command::new(BINARY)
            .arg("--url")
            .arg(uri)
            .args(["--coins", "BTC,SOL", "--top", "1", "--log-level", "error"])
            .arg("--csv")
            .arg(csv_arg)
            .output()
            .expect("Failed to start coinboard binary")
    })
    .await
    .expect("join");

    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Data Dimension: 2 rows and 8 columns."));
    assert!(stdout.contains("Wrote 2 rows"));

    let csv = std::fs::read_to_string(&csv_path).expect("csv written");
    let lines = csv.lines().collect::<Vec<_>>();
    assert_eq!(
        lines[0],
        "name,symbol,price,percentChange1h,percentChange24h,percentChange7d,marketCap,volume24h"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("bitcoin,BTC,"));
    assert!(lines[2].starts_with("solana,SOL,"));
}

#[tokio::test(flavor = "multi_thread")]
async fn one_shot_reports_page_format_change() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        Command::new(BINARY)
            .arg("--url")
            .arg(uri)
            .args(["--log-level", "error"])
            .output()
            .expect("Failed to start coinboard binary")
    })
    .await
    .expect("join");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("format has changed"));
    // the underlying error appears once, inside the message
    assert_eq!(stderr.matches("__NEXT_DATA__").count(), 1, "stderr: {stderr}");
}
