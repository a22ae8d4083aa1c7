use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use liquidity_signals::cache::MemorySnapshotStore;
use liquidity_signals::{QeState, ScoreMode, Settings, SignalFeed, SignalSources, SignalStatus};

fn fred_body(rows: &[(&str, f64)]) -> Value {
    let observations: Vec<Value> = rows
        .iter()
        .map(|(date, value)| json!({ "date": date, "value": value.to_string() }))
        .collect();
    json!({ "observations": observations })
}

fn chart_body(timestamps: &[i64], closes: &[f64]) -> Value {
    json!({
        "chart": {
            "result": [{
                "timestamp": timestamps,
                "indicators": { "quote": [{ "close": closes }] }
            }],
            "error": null
        }
    })
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_fred(server: &MockServer, series: &str, rows: &[(&str, f64)]) {
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .and(query_param("series_id", series))
        .respond_with(ResponseTemplate::new(200).set_body_json(fred_body(rows)))
        .mount(server)
        .await;
}

/// Every upstream except the BTC spot price
async fn mount_market(server: &MockServer) {
    // 7.50T assets, 500B RRP, 750B TGA: 6.25T net liquidity
    mount_fred(server, "WALCL", &[("2024-02-28", 7_400_000.0), ("2024-03-06", 7_500_000.0)]).await;
    mount_fred(server, "RRPONTSYD", &[("2024-03-05", 480.0), ("2024-03-06", 500.0)]).await;
    mount_fred(server, "WTREGEN", &[("2024-02-28", 760_000.0), ("2024-03-06", 750_000.0)]).await;
    mount_fred(server, "TREAST", &[("2024-02-28", 4_500_000.0), ("2024-03-06", 4_500_000.0)]).await;
    // swaps below the $1B floor
    mount_fred(server, "SWPT", &[("2024-02-28", 100.0), ("2024-03-06", 120.0)]).await;

    // USDJPY +1.35% week over week
    mount_json(
        server,
        "/chart/USDJPY=X",
        chart_body(&[1_709_078_400, 1_709_683_200], &[148.0, 150.0]),
    )
    .await;
    mount_json(
        server,
        "/chart/DX-Y.NYB",
        chart_body(&[1_709_596_800, 1_709_683_200], &[103.8, 104.1]),
    )
    .await;
    mount_json(
        server,
        "/chart/GC=F",
        chart_body(&[1_709_596_800, 1_709_683_200], &[2000.0, 2010.0]),
    )
    .await;

    mount_json(server, "/fng/", json!({ "data": [{ "value": "20" }] })).await;
    mount_json(
        server,
        "/coinmetrics/timeseries/asset-metrics",
        json!({ "data": [{ "asset": "btc", "FlowInExNtv": "1000.0", "FlowOutExNtv": "3000.0" }] }),
    )
    .await;
    mount_json(
        server,
        "/fapi/v1/fundingRate",
        json!([{ "symbol": "BTCUSDT", "fundingRate": "0.00010000" }]),
    )
    .await;
    mount_json(
        server,
        "/gist/etf_flow.json",
        json!({ "date": "2024-03-06", "total_daily_flow": 250.0, "top_flows": [] }),
    )
    .await;
}

async fn mount_btc(server: &MockServer) {
    mount_json(
        server,
        "/chart/BTC-USD",
        chart_body(&[1_709_596_800, 1_709_683_200], &[64_000.0, 65_000.0]),
    )
    .await;
}

fn settings_for(server: &MockServer) -> Settings {
    let uri = server.uri();
    let mut settings = Settings {
        fred_api_key: Some("test-key".to_string()),
        etf_gist_url: Some(format!("{}/gist/etf_flow.json", uri)),
        request_timeout_secs: 5,
        ..Settings::default()
    };
    settings.endpoints.fred = format!("{}/fred", uri);
    settings.endpoints.yahoo = format!("{}/chart", uri);
    settings.endpoints.binance = uri.clone();
    settings.endpoints.okx = uri.clone();
    settings.endpoints.coinglass = uri.clone();
    settings.endpoints.fear_greed = uri.clone();
    settings.endpoints.coinmetrics = format!("{}/coinmetrics", uri);
    settings
}

fn feed_for(settings: &Settings) -> SignalFeed {
    let sources = SignalSources::from_settings(settings).unwrap();
    SignalFeed::new(sources, settings, Arc::new(MemorySnapshotStore::new())).unwrap()
}

#[tokio::test]
async fn feed_scores_every_signal() {
    let server = MockServer::start().await;
    mount_market(&server).await;
    mount_btc(&server).await;

    let feed = feed_for(&settings_for(&server));
    let payload = feed.build(ScoreMode::Conservative).await.unwrap();

    assert!(!payload.is_fallback);
    assert_eq!(payload.btc_price.price, rust_decimal::Decimal::from(65_000));
    assert_eq!(payload.signals.len(), 8);
    assert!(payload.signals.iter().all(|s| s.available));

    let by_name = |name: &str| payload.signals.iter().find(|s| s.name == name).unwrap();
    assert_eq!(by_name("USD Liquidity").value_display, "$6.25T");
    assert_eq!(by_name("USD Liquidity").weight, 2);
    assert_eq!(by_name("Fear & Greed").weight, 2);
    assert_eq!(by_name("Exchange Flow").status, SignalStatus::Bullish);
    assert_eq!(by_name("Funding Rate").status, SignalStatus::Neutral);
    assert_eq!(by_name("DXY").status, SignalStatus::Neutral);
    assert_eq!(by_name("Gold").status, SignalStatus::Neutral);
    assert_eq!(by_name("ETF Flow").weight, 1);

    // assets, treasury and USDJPY met; swaps below the floor
    assert_eq!(payload.hidden_qe.score, 3);
    assert_eq!(payload.hidden_qe.signal, QeState::Watch);
    assert_eq!(by_name("Hidden QE").status, SignalStatus::Bullish);

    // bullish 7, bearish 0, neutral 3
    assert_eq!(payload.composite.bullish_weight, 7);
    assert_eq!(payload.composite.neutral_weight, 3);
    assert!((payload.composite.score - 70.0).abs() < 1e-9);
    assert_eq!(payload.composite.coverage, 100.0);
    assert!(payload.composite.warning.is_none());
}

#[tokio::test]
async fn feed_degrades_when_sources_fail() {
    let server = MockServer::start().await;
    mount_btc(&server).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let feed = feed_for(&settings_for(&server));
    let payload = feed.build(ScoreMode::Momentum).await.unwrap();

    assert_eq!(payload.signals.len(), 8);
    assert!(payload.signals.iter().all(|s| !s.available));
    assert_eq!(payload.composite.coverage, 0.0);
    assert_eq!(payload.composite.score, 0.0);
    assert!(payload.composite.warning.is_some());
    assert!(payload.hidden_qe.conditions.all_unavailable());
}

#[tokio::test]
async fn feed_falls_back_to_last_good_snapshot() {
    let server = MockServer::start().await;
    mount_market(&server).await;
    mount_btc(&server).await;

    let feed = feed_for(&settings_for(&server));
    let fresh = feed.payload(ScoreMode::Momentum).await.unwrap();
    assert!(!fresh.is_fallback);

    // BTC price gone: the build fails and the snapshot is served
    server.reset().await;
    mount_market(&server).await;

    let fallback = feed.payload(ScoreMode::Conservative).await.unwrap();
    assert!(fallback.is_fallback);
    assert_eq!(fallback.timestamp, fresh.timestamp);
    assert_eq!(fallback.summary.title, "Showing previous data");
    assert_eq!(fallback.composite.mode, ScoreMode::Conservative);
    assert!((fallback.composite.score - 70.0).abs() < 1e-9);
}

#[tokio::test]
async fn feed_without_snapshot_reports_error() {
    let server = MockServer::start().await;
    mount_market(&server).await;

    let feed = feed_for(&settings_for(&server));
    assert!(feed.payload(ScoreMode::Momentum).await.is_err());
}

#[tokio::test]
async fn history_scan_over_mocked_series() {
    let server = MockServer::start().await;
    mount_market(&server).await;

    let feed = feed_for(&settings_for(&server));
    let scan = feed.history(0).await.unwrap();

    // scan dates: union of WALCL, TREAST and SWPT dates
    assert_eq!(scan.evaluations.len(), 2);
    let latest = scan.evaluations.last().unwrap();
    assert_eq!(latest.signal, QeState::Watch);
    assert!(scan.transitions.is_empty());
}
