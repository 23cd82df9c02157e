//! HTTP Quote Source Integration Tests
//!
//! Exercises `HttpQuoteSource` against a mock data server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quote_stream_chart::{HttpQuoteSource, QuoteSource, SourceError};

async fn source_for(server: &MockServer) -> HttpQuoteSource {
    let url = format!("{}/query?id=1", server.uri()).parse().unwrap();
    HttpQuoteSource::new(url, Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn fetches_and_decodes_a_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("id", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"stock": "ABC", "top_ask": {"price": 120.48, "size": 109}, "top_bid": {"price": 120.42, "size": 81}, "timestamp": "2019-02-11 22:06:30.572453"},
                {"stock": "DEF", "top_ask": {"price": 117.87, "size": 162}, "top_bid": {"price": 117.81, "size": 4}, "timestamp": "2019-02-11 22:06:30.572453"}
            ]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let batch = source_for(&server).await.fetch_batch().await.unwrap();

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].stock, "ABC");
    assert_eq!(batch[0].ask_price_or_zero(), dec!(120.48));
    assert_eq!(batch[1].bid_price_or_zero(), dec!(117.81));
    assert_eq!(
        batch[0].timestamp,
        Utc.with_ymd_and_hms(2019, 2, 11, 22, 6, 30).unwrap()
            + chrono::Duration::microseconds(572_453)
    );
}

#[tokio::test]
async fn missing_sides_and_bad_records_are_tolerated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"stock": "ABC", "top_ask": {}, "top_bid": {"price": 9.5, "size": 1}, "timestamp": "2019-02-11T22:06:30Z"},
                {"stock": "DEF", "timestamp": "yesterday"}
            ]"#,
        ))
        .mount(&server)
        .await;

    let batch = source_for(&server).await.fetch_batch().await.unwrap();

    assert_eq!(batch.len(), 1);
    assert!(batch[0].top_ask.is_none());
    assert_eq!(batch[0].ask_price_or_zero(), dec!(0));
    assert_eq!(batch[0].bid_price_or_zero(), dec!(9.5));
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .mount(&server)
        .await;

    let err = source_for(&server).await.fetch_batch().await.unwrap_err();

    match err {
        SourceError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "warming up");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = source_for(&server).await.fetch_batch().await.unwrap_err();
    assert!(matches!(err, SourceError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = source_for(&server).await.fetch_batch().await.unwrap_err();
    assert!(matches!(err, SourceError::Network(_)), "got {err:?}");
}
