use chrono::{Duration, NaiveDate};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use liquidity_signals::cache::TtlCache;
use liquidity_signals::sources::HttpFetcher;
use liquidity_signals::{
    EtfFlowClient, FredClient, FundingRateClient, SeriesSource, SignalError, YahooClient,
};

const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn fred_observations_skip_missing_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .and(query_param("series_id", "WALCL"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("observation_start", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [
                { "date": "2024-01-10", "value": "7680000" },
                { "date": "2024-01-03", "value": "7700000" },
                { "date": "2024-01-17", "value": "." }
            ]
        })))
        .mount(&server)
        .await;

    let fred = FredClient::new(
        format!("{}/fred", server.uri()),
        Some("test-key".to_string()),
        TIMEOUT,
    )
    .unwrap();
    let points = fred
        .history("WALCL", date(2024, 1, 1), date(2024, 1, 31))
        .await
        .unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date, date(2024, 1, 3));
    assert_eq!(points[1].value, 7_680_000.0);

    let health = fred.health().await;
    assert!(health.is_healthy);
    assert_eq!(health.success_rate, 1.0);
}

#[tokio::test]
async fn fred_without_key_fails_before_any_request() {
    let server = MockServer::start().await;
    let fred = FredClient::new(server.uri(), None, TIMEOUT).unwrap();

    let result = fred.latest("WALCL").await;
    assert!(matches!(result, Err(SignalError::MissingApiKey(_))));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn fred_server_error_marks_source_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let fred = FredClient::new(server.uri(), Some("k".to_string()), TIMEOUT).unwrap();
    let result = fred.latest("WTREGEN").await;

    assert!(matches!(result, Err(SignalError::ApiError(_))));
    let health = fred.health().await;
    assert!(!health.is_healthy);
    assert_eq!(health.success_rate, 0.0);
}

#[tokio::test]
async fn yahoo_weekly_history_resolves_symbol_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chart/USDJPY=X"))
        .and(query_param("interval", "1wk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "result": [{
                    "timestamp": [1_704_067_200, 1_704_672_000],
                    "indicators": { "quote": [{ "close": [141.0, 144.5] }] }
                }],
                "error": null
            }
        })))
        .mount(&server)
        .await;

    let yahoo = YahooClient::new(format!("{}/chart", server.uri()), TIMEOUT).unwrap();
    let points = yahoo
        .weekly_history("usdjpy", date(2024, 1, 1), date(2024, 1, 15))
        .await
        .unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date, date(2024, 1, 1));
    assert_eq!(points[1].value, 144.5);
}

#[tokio::test]
async fn funding_rate_falls_back_to_okx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fapi/v1/fundingRate"))
        .respond_with(ResponseTemplate::new(451))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v5/public/funding-rate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "0",
            "data": [{ "instId": "BTC-USDT-SWAP", "fundingRate": "0.00025" }]
        })))
        .mount(&server)
        .await;

    let client = FundingRateClient::new(server.uri(), server.uri(), server.uri(), TIMEOUT).unwrap();
    let rate = client.latest_rate().await.unwrap();
    assert!((rate - 0.025).abs() < 1e-12);
}

#[tokio::test]
async fn funding_rate_fails_when_every_exchange_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = FundingRateClient::new(server.uri(), server.uri(), server.uri(), TIMEOUT).unwrap();
    assert!(matches!(
        client.latest_rate().await,
        Err(SignalError::SourceUnhealthy(_))
    ));
}

#[tokio::test]
async fn etf_flow_serves_stale_cache_when_gist_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gist/etf_flow.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "date": "2024-03-06",
            "total_daily_flow": 312.4,
            "top_flows": [{ "symbol": "IBIT", "daily_flow": 250.0 }],
            "updated_at": "2024-03-07T01:00:00Z"
        })))
        .mount(&server)
        .await;

    // zero TTL: every cached entry is already stale
    let cache = Arc::new(TtlCache::new(Duration::zero()));
    let client = EtfFlowClient::new(
        Some(format!("{}/gist/etf_flow.json", server.uri())),
        cache,
        TIMEOUT,
    )
    .unwrap();

    let fresh = client.latest().await.unwrap();
    assert_eq!(fresh.total_daily_flow, 312.4);
    assert_eq!(fresh.top_flows.len(), 1);

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let stale = client.latest().await.unwrap();
    assert_eq!(stale, fresh);
}

#[tokio::test]
async fn etf_flow_without_url_is_a_configuration_error() {
    let cache = Arc::new(TtlCache::new(Duration::hours(1)));
    let client = EtfFlowClient::new(None, cache, TIMEOUT).unwrap();
    assert!(matches!(
        client.latest().await,
        Err(SignalError::InvalidConfiguration(_))
    ));
}

#[tokio::test]
async fn fetcher_retries_once_after_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fng/"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fng/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "value": "42" }] })))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new("fear_greed", TIMEOUT)
        .unwrap()
        .with_retry_cap(std::time::Duration::ZERO);
    let url = url::Url::parse(&format!("{}/fng/", server.uri())).unwrap();
    let body: serde_json::Value = fetcher.get_json(url).await.unwrap();

    assert_eq!(body["data"][0]["value"], "42");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn fetcher_gives_up_after_second_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new("coinmetrics", TIMEOUT)
        .unwrap()
        .with_retry_cap(std::time::Duration::ZERO);
    let url = url::Url::parse(&server.uri()).unwrap();
    let result: Result<serde_json::Value, _> = fetcher.get_json(url).await;

    match result {
        Err(SignalError::RateLimit {
            source_name,
            retry_after,
        }) => {
            assert_eq!(source_name, "coinmetrics");
            assert_eq!(retry_after, Some(7));
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
}
