//! Streaming Session
//!
//! Composes the controller and the renderer. The only link between them is
//! the batch channel: the controller sends each fetched batch, the renderer
//! task consumes it and publishes the rendered chart. The renderer lives as
//! long as the session, so restarting the stream keeps feeding the same chart.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::controller::{
    ControllerError, PollSettings, StopReason, StreamController, StreamHandle, StreamingStatus,
};
use super::renderer::ChartRenderer;
use crate::application::ports::{ChartWidget, QuoteSource};
use crate::domain::chart::{ViewConfig, ViewSnapshot};

/// A running controller/renderer pair.
pub struct StreamingSession {
    controller: StreamController,
    view: ViewConfig,
    handle: Mutex<Option<StreamHandle>>,
    stopper: Mutex<Option<CancellationToken>>,
    chart_rx: watch::Receiver<Option<Arc<ViewSnapshot>>>,
    renderer_task: JoinHandle<()>,
}

impl StreamingSession {
    /// Spawn the renderer task and build the controller.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<W>(
        source: Arc<dyn QuoteSource>,
        renderer: ChartRenderer<W>,
        settings: PollSettings,
        channel_capacity: usize,
    ) -> Self
    where
        W: ChartWidget + 'static,
    {
        let (batch_tx, batch_rx) = mpsc::channel(channel_capacity.max(1));
        let (chart_tx, chart_rx) = watch::channel(None);
        let view = renderer.view().clone();

        let renderer_task = tokio::spawn(renderer.run(batch_rx, chart_tx));
        let controller = StreamController::new(source, settings, batch_tx);

        Self {
            controller,
            view,
            handle: Mutex::new(None),
            stopper: Mutex::new(None),
            chart_rx,
            renderer_task,
        }
    }

    /// Start streaming ("Start Streaming Data").
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::AlreadyStreaming`] if a session is running.
    pub fn start(&self) -> Result<Uuid, ControllerError> {
        let handle = self.controller.start()?;
        let session_id = handle.session_id();
        *self.stopper.lock() = Some(handle.stop_token());
        *self.handle.lock() = Some(handle);
        Ok(session_id)
    }

    /// Stop the running stream. Returns `false` if nothing was streaming.
    ///
    /// Works while another caller is blocked in [`Self::wait`].
    pub fn stop(&self) -> bool {
        if !self.controller.state().is_streaming() {
            return false;
        }
        match self.stopper.lock().as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Current streaming state.
    #[must_use]
    pub fn status(&self) -> StreamingStatus {
        self.controller.state().status()
    }

    /// Polling settings.
    #[must_use]
    pub const fn settings(&self) -> &PollSettings {
        self.controller.settings()
    }

    /// View configuration of the chart.
    #[must_use]
    pub const fn view(&self) -> &ViewConfig {
        &self.view
    }

    /// Latest rendered chart, if any batch has been rendered.
    #[must_use]
    pub fn chart(&self) -> Option<Arc<ViewSnapshot>> {
        self.chart_rx.borrow().clone()
    }

    /// Subscribe to chart updates.
    #[must_use]
    pub fn subscribe_chart(&self) -> watch::Receiver<Option<Arc<ViewSnapshot>>> {
        self.chart_rx.clone()
    }

    /// Whether the renderer task is still running.
    #[must_use]
    pub fn renderer_alive(&self) -> bool {
        !self.renderer_task.is_finished()
    }

    /// Wait for the current stream to end on its own.
    ///
    /// Returns `None` if no stream was started.
    ///
    /// # Errors
    ///
    /// Returns an error if the polling task panicked.
    pub async fn wait(&self) -> Result<Option<StopReason>, ControllerError> {
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => handle.join().await.map(Some),
            None => Ok(None),
        }
    }

    /// Stop streaming, close the batch channel and wait for the renderer.
    pub async fn shutdown(self) {
        self.controller.shutdown();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.join().await
        {
            tracing::error!(error = %e, "Polling task ended abnormally");
        }

        drop(self.controller);

        if let Err(e) = self.renderer_task.await {
            tracing::error!(error = %e, "Renderer task ended abnormally");
        }

        tracing::info!("Streaming session shut down");
    }
}
