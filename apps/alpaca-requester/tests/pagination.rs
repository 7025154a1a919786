//! Pagination Integration Tests
//!
//! Runs whole queries against a mock data API and checks that every page is
//! requested in order and assembled into one result.

#![allow(clippy::unwrap_used)]

mod common;

use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alpaca_requester::{BarsQuery, RequestSpec, StockBars, TimeFrame, TradesQuery};
use common::{TEST_KEY, TEST_SECRET, bar, bars_page, client, request_count};

#[tokio::test]
async fn three_pages_are_concatenated_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/bars"))
        .and(query_param_is_missing("page_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bars_page(
            "AAPL",
            vec![bar(14, 180.0), bar(15, 181.0)],
            Some("p2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/bars"))
        .and(query_param("page_token", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bars_page(
            "AAPL",
            vec![bar(16, 182.0), bar(17, 183.0)],
            Some("p3"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/bars"))
        .and(query_param("page_token", "p3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bars_page(
            "AAPL",
            vec![bar(18, 184.0)],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let query = BarsQuery::new(["aapl"], TimeFrame::HOUR);
    let result = client.fetch_bars(&query).await.unwrap();

    assert_eq!(result.pages(), 3);
    assert_eq!(result.len(), 5);
    assert!(result.next_page_token().is_none());

    let closes: Vec<_> = result.records().iter().map(|b| b.close).collect();
    assert_eq!(
        closes,
        vec![dec!(180), dec!(181), dec!(182), dec!(183), dec!(184)]
    );
    assert!(result.records().iter().all(|b| b.symbol == "AAPL"));
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn query_parameters_and_credentials_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/bars"))
        .and(query_param("symbols", "AAPL,MSFT"))
        .and(query_param("timeframe", "1Day"))
        .and(query_param("limit", "10000"))
        .and(query_param("start", "2024-01-02T00:00:00Z"))
        .and(header("APCA-API-KEY-ID", TEST_KEY))
        .and(header("APCA-API-SECRET-KEY", TEST_SECRET))
        .and(header("Accept", "application/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"bars": {}, "next_page_token": null})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let start = "2024-01-02T00:00:00Z".parse().unwrap();
    let query = BarsQuery::new(["aapl", " msft "], TimeFrame::DAY).with_start(start);
    let result = client(&server).fetch_bars(&query).await.unwrap();

    assert!(result.is_empty());
    assert_eq!(result.pages(), 1);
}

#[tokio::test]
async fn starting_page_token_resumes_download() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/bars"))
        .and(query_param("page_token", "resume-here"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bars_page(
            "MSFT",
            vec![bar(10, 400.0)],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let query = BarsQuery::new(["MSFT"], TimeFrame::HOUR).with_page_token("resume-here");
    let result = client(&server).fetch_bars(&query).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.records()[0].symbol, "MSFT");
}

#[tokio::test]
async fn multi_symbol_page_keeps_server_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/bars"))
        // Written out by hand so TSLA stays ahead of AAPL on the wire.
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"{{"bars":{{"TSLA":[{},{}],"AAPL":[{}]}},"next_page_token":null}}"#,
                bar(14, 200.0),
                bar(15, 201.0),
                bar(14, 180.0),
            ),
            "application/json",
        ))
        .mount(&server)
        .await;

    let query = BarsQuery::new(["TSLA", "AAPL"], TimeFrame::HOUR);
    let result = client(&server).fetch_bars(&query).await.unwrap();

    let symbols: Vec<_> = result.records().iter().map(|b| b.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["TSLA", "TSLA", "AAPL"]);

    let summaries = result.summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].symbol, "TSLA");
    assert_eq!(summaries[0].count, 2);
    assert_eq!(summaries[1].symbol, "AAPL");
}

#[tokio::test]
async fn generic_fetch_with_raw_spec() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/bars"))
        .and(query_param("symbols", "SPY"))
        .and(query_param("timeframe", "5Min"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bars_page(
            "SPY",
            vec![bar(9, 500.0)],
            Some(""),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let spec = RequestSpec::new("/v2/stocks/bars")
        .param("symbols", "SPY")
        .param("timeframe", "5Min");
    let result = client(&server).fetch::<StockBars>(spec).await.unwrap();

    assert_eq!(result.len(), 1);
    assert!(result.next_page_token().is_none());
}

#[tokio::test]
async fn trades_are_paginated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/trades"))
        .and(query_param_is_missing("page_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "trades": {
                "AAPL": [
                    {"t": "2024-03-01T14:30:00Z", "x": "V", "p": 180.01, "s": 100, "c": ["@"], "i": 1, "z": "C"}
                ]
            },
            "next_page_token": "t2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/trades"))
        .and(query_param("page_token", "t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "trades": {
                "AAPL": [
                    {"t": "2024-03-01T14:30:01Z", "x": "P", "p": 180.02, "s": 5, "i": 2, "z": "C"}
                ]
            },
            "next_page_token": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = TradesQuery::new(["AAPL"]).with_limit(1);
    let result = client(&server).fetch_trades(&query).await.unwrap();

    assert_eq!(result.pages(), 2);
    let ids: Vec<_> = result.records().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(result.records()[0].price, dec!(180.01));
}

#[tokio::test]
async fn result_renders_as_csv() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/stocks/bars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bars_page(
            "AAPL",
            vec![bar(14, 180.0), bar(15, 181.0)],
            None,
        )))
        .mount(&server)
        .await;

    let query = BarsQuery::new(["AAPL"], TimeFrame::HOUR);
    let result = client(&server).fetch_bars(&query).await.unwrap();

    let table = result.to_table();
    assert_eq!(table.rows().len(), 2);
    assert_eq!(
        table.column("timestamp"),
        Some(vec!["2024-03-01T14:00:00Z", "2024-03-01T15:00:00Z"])
    );

    let mut out = Vec::new();
    table.write_csv(&mut out).unwrap();
    let csv = String::from_utf8(out).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.starts_with("symbol,timestamp,open"));
}
