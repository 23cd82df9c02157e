//! Stream Controller
//!
//! Owns the streaming state and the polling loop. On start, a timer fires
//! every `interval` and each tick issues one fetch against the quote source,
//! up to `max_attempts` fetches in total. Fetches run as independent tasks so
//! a slow fetch never delays the next tick. Every successful batch replaces
//! the latest batch and is handed to the renderer through the batch channel.
//! Batches waiting for channel capacity queue inside the loop in arrival
//! order, so a slow renderer never holds back ticks or cancellation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::ports::{QuoteSource, SourceError};
use crate::domain::quote::QuoteRecord;
use crate::infrastructure::metrics;

// =============================================================================
// Settings
// =============================================================================

/// Polling loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Time between ticks.
    pub interval: Duration,
    /// Maximum fetches per streaming session.
    pub max_attempts: u32,
    /// End the session when the source returns an empty batch.
    pub stop_on_empty_batch: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: 1000,
            stop_on_empty_batch: false,
        }
    }
}

// =============================================================================
// Streaming State
// =============================================================================

/// Why a streaming session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// All fetch attempts were issued and completed.
    AttemptsExhausted,
    /// The stop handle was used or the session shut down.
    Cancelled,
    /// The source returned an empty batch.
    SourceExhausted,
    /// The renderer stopped accepting batches.
    RendererClosed,
}

/// Point-in-time view of the streaming state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamingStatus {
    /// Current or most recent session.
    pub session_id: Option<Uuid>,
    /// Whether the polling loop is running.
    pub is_streaming: bool,
    /// Whether at least one batch has arrived, so the chart can be shown.
    pub show_chart: bool,
    /// Fetches issued in the current or most recent session.
    pub attempts: u32,
    /// Configured fetch limit.
    pub max_attempts: u32,
    /// Batches received across all sessions.
    pub batches_received: u64,
    /// Failed fetches across all sessions.
    pub fetch_failures: u64,
    /// When the latest batch arrived.
    pub last_batch_at: Option<DateTime<Utc>>,
    /// Why the most recent session ended.
    pub stop_reason: Option<StopReason>,
    /// The most recent batch.
    pub latest_batch: Vec<QuoteRecord>,
}

/// Streaming state shared between the controller and its observers.
///
/// Only the polling loop mutates it.
#[derive(Debug)]
pub struct StreamingState {
    inner: RwLock<StreamingStatus>,
}

impl StreamingState {
    fn new(max_attempts: u32) -> Self {
        Self {
            inner: RwLock::new(StreamingStatus {
                max_attempts,
                ..StreamingStatus::default()
            }),
        }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn status(&self) -> StreamingStatus {
        self.inner.read().clone()
    }

    /// Whether the polling loop is running.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.inner.read().is_streaming
    }

    /// The most recent batch.
    #[must_use]
    pub fn latest_batch(&self) -> Vec<QuoteRecord> {
        self.inner.read().latest_batch.clone()
    }

    /// Mark a new session as streaming, unless one already is.
    fn begin(&self, session_id: Uuid) -> Result<(), ControllerError> {
        let mut state = self.inner.write();
        if state.is_streaming {
            return Err(ControllerError::AlreadyStreaming(
                state.session_id.unwrap_or(session_id),
            ));
        }

        state.session_id = Some(session_id);
        state.is_streaming = true;
        state.attempts = 0;
        state.stop_reason = None;
        Ok(())
    }

    fn record_attempt(&self, attempt: u32) {
        self.inner.write().attempts = attempt;
    }

    fn record_batch(&self, batch: Vec<QuoteRecord>) {
        let mut state = self.inner.write();
        state.latest_batch = batch;
        state.show_chart = true;
        state.batches_received += 1;
        state.last_batch_at = Some(Utc::now());
    }

    fn record_failure(&self) {
        self.inner.write().fetch_failures += 1;
    }

    fn finish(&self, reason: StopReason) {
        let mut state = self.inner.write();
        state.is_streaming = false;
        state.stop_reason = Some(reason);
    }
}

// =============================================================================
// Errors and Handles
// =============================================================================

/// Controller errors.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// A session is already polling; no second timer is started.
    #[error("already streaming (session {0})")]
    AlreadyStreaming(Uuid),

    /// The polling task panicked or was aborted.
    #[error("polling task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Stop handle for one streaming session.
#[derive(Debug)]
pub struct StreamHandle {
    session_id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<StopReason>,
}

impl StreamHandle {
    /// Session this handle controls.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Cancel the polling loop. In-flight fetches are abandoned.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this session, usable after the handle is joined.
    #[must_use]
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the polling loop has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the polling loop to end.
    ///
    /// # Errors
    ///
    /// Returns an error if the polling task panicked.
    pub async fn join(self) -> Result<StopReason, ControllerError> {
        Ok(self.task.await?)
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Polling controller.
pub struct StreamController {
    source: Arc<dyn QuoteSource>,
    settings: PollSettings,
    state: Arc<StreamingState>,
    batch_tx: mpsc::Sender<Vec<QuoteRecord>>,
    shutdown: CancellationToken,
}

impl StreamController {
    /// Create a controller feeding batches into `batch_tx`.
    #[must_use]
    pub fn new(
        source: Arc<dyn QuoteSource>,
        settings: PollSettings,
        batch_tx: mpsc::Sender<Vec<QuoteRecord>>,
    ) -> Self {
        Self {
            source,
            settings,
            state: Arc::new(StreamingState::new(settings.max_attempts)),
            batch_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Shared streaming state.
    #[must_use]
    pub fn state(&self) -> Arc<StreamingState> {
        Arc::clone(&self.state)
    }

    /// Polling settings.
    #[must_use]
    pub const fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Start a streaming session.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::AlreadyStreaming`] if a session is running.
    pub fn start(&self) -> Result<StreamHandle, ControllerError> {
        let session_id = Uuid::new_v4();
        self.state.begin(session_id)?;

        let cancel = self.shutdown.child_token();
        let poll_loop = PollLoop {
            source: Arc::clone(&self.source),
            settings: self.settings,
            state: Arc::clone(&self.state),
            batch_tx: self.batch_tx.clone(),
            cancel: cancel.clone(),
        };

        tracing::info!(
            session_id = %session_id,
            interval_ms = self.settings.interval.as_millis(),
            max_attempts = self.settings.max_attempts,
            "Streaming started"
        );
        metrics::set_streaming(true);

        let task = tokio::spawn(poll_loop.run(session_id));

        Ok(StreamHandle {
            session_id,
            cancel,
            task,
        })
    }

    /// Cancel every session started by this controller.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

type FetchResult = (u32, Duration, Result<Vec<QuoteRecord>, SourceError>);

struct PollLoop {
    source: Arc<dyn QuoteSource>,
    settings: PollSettings,
    state: Arc<StreamingState>,
    batch_tx: mpsc::Sender<Vec<QuoteRecord>>,
    cancel: CancellationToken,
}

impl PollLoop {
    async fn run(self, session_id: Uuid) -> StopReason {
        let period = self.settings.interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut fetches: JoinSet<FetchResult> = JoinSet::new();
        let mut backlog: VecDeque<Vec<QuoteRecord>> = VecDeque::new();
        let mut attempts: u32 = 0;

        let reason = loop {
            let drained = fetches.is_empty() && backlog.is_empty();
            if attempts >= self.settings.max_attempts && drained {
                break StopReason::AttemptsExhausted;
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break StopReason::Cancelled,
                permit = self.batch_tx.reserve(), if !backlog.is_empty() => {
                    let Ok(permit) = permit else {
                        tracing::warn!("Renderer closed, stopping stream");
                        break StopReason::RendererClosed;
                    };
                    if let Some(batch) = backlog.pop_front() {
                        permit.send(batch);
                    }
                }
                Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                    match joined {
                        Ok(result) => {
                            if let Some(reason) = self.on_fetch_complete(result, &mut backlog) {
                                break reason;
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Fetch task failed");
                            self.state.record_failure();
                        }
                    }
                }
                _ = ticker.tick(), if attempts < self.settings.max_attempts => {
                    attempts += 1;
                    self.state.record_attempt(attempts);
                    metrics::record_fetch_issued();

                    let source = Arc::clone(&self.source);
                    fetches.spawn(async move {
                        let started = Instant::now();
                        let result = source.fetch_batch().await;
                        (attempts, started.elapsed(), result)
                    });
                }
            }
        };

        fetches.abort_all();
        self.state.finish(reason);
        metrics::set_streaming(false);

        tracing::info!(
            session_id = %session_id,
            attempts,
            undelivered = backlog.len(),
            reason = ?reason,
            "Streaming stopped"
        );

        reason
    }

    fn on_fetch_complete(
        &self,
        (attempt, elapsed, result): FetchResult,
        backlog: &mut VecDeque<Vec<QuoteRecord>>,
    ) -> Option<StopReason> {
        metrics::record_fetch_duration(elapsed);

        match result {
            Ok(batch) => {
                tracing::debug!(
                    attempt,
                    records = batch.len(),
                    elapsed_ms = elapsed.as_millis(),
                    "Batch received"
                );
                metrics::record_batch_received(batch.len());

                if batch.is_empty() && self.settings.stop_on_empty_batch {
                    tracing::info!(attempt, "Quote source returned no data");
                    return Some(StopReason::SourceExhausted);
                }

                self.state.record_batch(batch.clone());

                if self.batch_tx.is_closed() {
                    tracing::warn!("Renderer closed, stopping stream");
                    return Some(StopReason::RendererClosed);
                }
                backlog.push_back(batch);
                if backlog.len() > 1 {
                    tracing::debug!(queued = backlog.len(), "Renderer is behind");
                }
                None
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Fetch failed");
                metrics::record_fetch_failed(e.kind());
                self.state.record_failure();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockQuoteSource;
    use crate::domain::quote::PriceLevel;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quote(stock: &str) -> QuoteRecord {
        QuoteRecord::new(
            stock,
            Some(PriceLevel::new(dec!(10), 1)),
            Some(PriceLevel::new(dec!(9), 1)),
            Utc::now(),
        )
    }

    fn settings(max_attempts: u32) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(100),
            max_attempts,
            stop_on_empty_batch: false,
        }
    }

    fn counting_source(calls: Arc<AtomicU32>) -> MockQuoteSource {
        let mut source = MockQuoteSource::new();
        source.expect_fetch_batch().returning(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![quote("ABC")])
        });
        source
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, mut rx) = mpsc::channel(64);
        let controller =
            StreamController::new(Arc::new(counting_source(Arc::clone(&calls))), settings(5), tx);

        let handle = controller.start().unwrap();
        let reason = handle.join().await.unwrap();

        assert_eq!(reason, StopReason::AttemptsExhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let mut batches = 0;
        while rx.try_recv().is_ok() {
            batches += 1;
        }
        assert_eq!(batches, 5);

        let status = controller.state().status();
        assert!(!status.is_streaming);
        assert!(status.show_chart);
        assert_eq!(status.attempts, 5);
        assert_eq!(status.stop_reason, Some(StopReason::AttemptsExhausted));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_are_spaced_by_interval() {
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, _rx) = mpsc::channel(64);
        let controller =
            StreamController::new(Arc::new(counting_source(Arc::clone(&calls))), settings(10), tx);

        let handle = controller.start().unwrap();

        // No fetch before the first period elapses.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        handle.stop();
        assert_eq!(handle.join().await.unwrap(), StopReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected_while_streaming() {
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, _rx) = mpsc::channel(64);
        let controller =
            StreamController::new(Arc::new(counting_source(Arc::clone(&calls))), settings(10), tx);

        let handle = controller.start().unwrap();
        let second = controller.start();

        match second {
            Err(ControllerError::AlreadyStreaming(id)) => assert_eq!(id, handle.session_id()),
            other => panic!("expected AlreadyStreaming, got {other:?}"),
        }

        handle.stop();
        handle.join().await.unwrap();

        // After the loop ends a new session may start.
        let restarted = controller.start().unwrap();
        restarted.stop();
        restarted.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_counted_and_polling_continues() {
        let mut source = MockQuoteSource::new();
        let mut call = 0;
        source.expect_fetch_batch().returning(move || {
            call += 1;
            if call % 2 == 0 {
                Err(SourceError::Network("connection refused".to_string()))
            } else {
                Ok(vec![quote("DEF")])
            }
        });

        let (tx, _rx) = mpsc::channel(64);
        let controller = StreamController::new(Arc::new(source), settings(4), tx);

        let reason = controller.start().unwrap().join().await.unwrap();

        assert_eq!(reason, StopReason::AttemptsExhausted);
        let status = controller.state().status();
        assert_eq!(status.batches_received, 2);
        assert_eq!(status.fetch_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_ends_session_when_configured() {
        let mut source = MockQuoteSource::new();
        let mut call = 0;
        source.expect_fetch_batch().returning(move || {
            call += 1;
            if call < 3 { Ok(vec![quote("ABC")]) } else { Ok(vec![]) }
        });

        let (tx, _rx) = mpsc::channel(64);
        let controller = StreamController::new(
            Arc::new(source),
            PollSettings {
                stop_on_empty_batch: true,
                ..settings(100)
            },
            tx,
        );

        let reason = controller.start().unwrap().join().await.unwrap();

        assert_eq!(reason, StopReason::SourceExhausted);
        assert_eq!(controller.state().status().batches_received, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_renderer_ends_session() {
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, rx) = mpsc::channel(64);
        drop(rx);
        let controller =
            StreamController::new(Arc::new(counting_source(calls)), settings(10), tx);

        let reason = controller.start().unwrap().join().await.unwrap();
        assert_eq!(reason, StopReason::RendererClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn latest_batch_is_replaced_not_accumulated() {
        let mut source = MockQuoteSource::new();
        let mut call = 0;
        source.expect_fetch_batch().returning(move || {
            call += 1;
            Ok(if call == 1 {
                vec![quote("ABC"), quote("DEF")]
            } else {
                vec![quote("GHI")]
            })
        });

        let (tx, _rx) = mpsc::channel(64);
        let controller = StreamController::new(Arc::new(source), settings(2), tx);
        controller.start().unwrap().join().await.unwrap();

        let latest = controller.state().latest_batch();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].stock, "GHI");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_renderer_does_not_hold_back_ticks_or_stop() {
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, mut rx) = mpsc::channel(1);
        let source = Arc::new(counting_source(Arc::clone(&calls)));
        let controller = StreamController::new(source, settings(1000), tx);

        let handle = controller.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1050)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(controller.state().status().batches_received, 10);

        handle.stop();
        let reason = tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .expect("polling loop should end after stop")
            .unwrap();
        assert_eq!(reason, StopReason::Cancelled);

        // Only the first batch fit in the channel.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn backlog_is_delivered_in_order_once_renderer_catches_up() {
        let mut source = MockQuoteSource::new();
        let mut call = 0;
        source.expect_fetch_batch().returning(move || {
            call += 1;
            Ok(vec![quote(&format!("S{call}"))])
        });

        let (tx, mut rx) = mpsc::channel(1);
        let controller = StreamController::new(Arc::new(source), settings(4), tx);
        let handle = controller.start().unwrap();

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert!(!handle.is_finished());

        let mut stocks = Vec::new();
        while stocks.len() < 4 {
            let batch = rx.recv().await.unwrap();
            stocks.push(batch[0].stock.clone());
        }
        assert_eq!(stocks, vec!["S1", "S2", "S3", "S4"]);
        assert_eq!(handle.join().await.unwrap(), StopReason::AttemptsExhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_running_session() {
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, _rx) = mpsc::channel(64);
        let controller =
            StreamController::new(Arc::new(counting_source(calls)), settings(1000), tx);

        let handle = controller.start().unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        controller.shutdown();

        assert_eq!(handle.join().await.unwrap(), StopReason::Cancelled);
        assert!(!controller.state().is_streaming());
    }
}
