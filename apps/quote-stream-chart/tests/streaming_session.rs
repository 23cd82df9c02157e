//! Streaming Session Integration Tests
//!
//! Drives the controller and renderer end to end against a scripted quote
//! source, with the Tokio clock paused.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use quote_stream_chart::domain::chart::CellValue;
use quote_stream_chart::{
    ChartRenderer, PivotTableWidget, PollSettings, PriceLevel, QuoteRecord, QuoteSource,
    SourceError, StopReason, StreamingSession, ViewSnapshot,
};

/// Quote source replaying a fixed script, then returning empty batches.
struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<QuoteRecord>, SourceError>>>,
    calls: Mutex<u32>,
}

impl ScriptedSource {
    fn new(script: Vec<Result<Vec<QuoteRecord>, SourceError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    async fn fetch_batch(&self) -> Result<Vec<QuoteRecord>, SourceError> {
        *self.calls.lock() += 1;
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_549_922_790 + secs, 0).unwrap()
}

fn quote(stock: &str, ask: Decimal, bid: Decimal, secs: i64) -> QuoteRecord {
    QuoteRecord::new(
        stock,
        Some(PriceLevel::new(ask, 100)),
        Some(PriceLevel::new(bid, 100)),
        ts(secs),
    )
}

fn settings(max_attempts: u32) -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(100),
        max_attempts,
        stop_on_empty_batch: false,
    }
}

fn spawn_session(source: Arc<ScriptedSource>, settings: PollSettings) -> StreamingSession {
    StreamingSession::spawn(
        source,
        ChartRenderer::new(PivotTableWidget::new()),
        settings,
        16,
    )
}

async fn wait_for_rows(session: &StreamingSession, rows: usize) -> Arc<ViewSnapshot> {
    let mut chart = session.subscribe_chart();
    let snapshot = (*chart
        .wait_for(|snapshot| snapshot.as_ref().is_some_and(|s| s.row_count == rows))
        .await
        .unwrap())
    .clone();
    snapshot.unwrap()
}

#[tokio::test(start_paused = true)]
async fn overlapping_batches_refresh_points() {
    let source = ScriptedSource::new(vec![
        Ok(vec![
            quote("ABC", dec!(120.48), dec!(120.42), 0),
            quote("DEF", dec!(117.87), dec!(117.81), 0),
        ]),
        Ok(vec![
            quote("ABC", dec!(120.50), dec!(120.44), 0),
            quote("ABC", dec!(120.55), dec!(120.47), 1),
        ]),
        Ok(vec![quote("DEF", dec!(117.90), dec!(117.84), 1)]),
    ]);
    let session = spawn_session(Arc::clone(&source), settings(3));

    session.start().unwrap();
    assert_eq!(
        session.wait().await.unwrap(),
        Some(StopReason::AttemptsExhausted)
    );
    assert_eq!(source.calls(), 3);

    let chart = wait_for_rows(&session, 4).await;

    let abc = chart.series("ABC|top_ask_price").unwrap();
    assert_eq!(abc.points.len(), 2);
    assert_eq!(abc.points[0].x, vec![CellValue::Date(ts(0))]);
    assert_eq!(abc.points[0].y, dec!(120.50));
    assert_eq!(abc.points[1].y, dec!(120.55));

    let def = chart.series("DEF|top_ask_price").unwrap();
    assert_eq!(def.last_point().unwrap().y, dec!(117.90));

    let status = session.status();
    assert!(!status.is_streaming);
    assert!(status.show_chart);
    assert_eq!(status.batches_received, 3);
    assert_eq!(status.latest_batch.len(), 1);
    assert_eq!(status.latest_batch[0].stock, "DEF");

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_fetches_do_not_stop_the_stream() {
    let source = ScriptedSource::new(vec![
        Err(SourceError::Network("connection refused".to_string())),
        Ok(vec![quote("ABC", dec!(10), dec!(9), 0)]),
        Err(SourceError::Status {
            status: 500,
            body: "boom".to_string(),
        }),
    ]);
    let session = spawn_session(Arc::clone(&source), settings(3));

    session.start().unwrap();
    assert_eq!(
        session.wait().await.unwrap(),
        Some(StopReason::AttemptsExhausted)
    );

    let status = session.status();
    assert_eq!(status.attempts, 3);
    assert_eq!(status.fetch_failures, 2);
    assert_eq!(status.batches_received, 1);

    let chart = wait_for_rows(&session, 1).await;
    assert!(chart.series("ABC|top_ask_price").is_some());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn restarting_keeps_feeding_the_same_chart() {
    let source = ScriptedSource::new(vec![
        Ok(vec![quote("ABC", dec!(10), dec!(9), 0)]),
        Ok(vec![quote("ABC", dec!(11), dec!(10), 1)]),
    ]);
    let session = spawn_session(Arc::clone(&source), settings(1));

    let first = session.start().unwrap();
    session.wait().await.unwrap();
    wait_for_rows(&session, 1).await;

    let second = session.start().unwrap();
    assert_ne!(first, second);
    session.wait().await.unwrap();

    let chart = wait_for_rows(&session, 2).await;
    let abc = chart.series("ABC|top_ask_price").unwrap();
    assert_eq!(abc.points.len(), 2);
    assert_eq!(session.status().session_id, Some(second));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_ends_the_session_early() {
    let source = ScriptedSource::new(Vec::new());
    let session = spawn_session(Arc::clone(&source), settings(1000));

    session.start().unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    assert!(session.stop());
    assert_eq!(session.wait().await.unwrap(), Some(StopReason::Cancelled));

    let calls = source.calls();
    assert!((3..=4).contains(&calls), "calls = {calls}");
    assert!(!session.status().is_streaming);
    assert!(!session.stop());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_reaches_a_stream_someone_is_waiting_on() {
    let source = ScriptedSource::new(Vec::new());
    let session = Arc::new(spawn_session(Arc::clone(&source), settings(1000)));

    session.start().unwrap();
    let waiter = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.wait().await })
    };
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(session.stop());
    let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("wait should return after stop")
        .unwrap()
        .unwrap();
    assert_eq!(reason, Some(StopReason::Cancelled));
    assert!(!session.stop());

    Arc::try_unwrap(session).ok().unwrap().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn empty_batch_ends_session_when_configured() {
    let source = ScriptedSource::new(vec![Ok(vec![quote("ABC", dec!(10), dec!(9), 0)])]);
    let session = spawn_session(
        Arc::clone(&source),
        PollSettings {
            stop_on_empty_batch: true,
            ..settings(1000)
        },
    );

    session.start().unwrap();
    assert_eq!(
        session.wait().await.unwrap(),
        Some(StopReason::SourceExhausted)
    );
    assert_eq!(source.calls(), 2);

    session.shutdown().await;
}
