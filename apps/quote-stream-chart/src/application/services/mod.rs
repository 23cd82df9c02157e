//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `StreamController`: polling loop and streaming state
//! - `ChartRenderer`: mounts the chart and upserts batches
//! - `StreamingSession`: wires the two through the batch channel

pub mod controller;
pub mod renderer;
pub mod session;

pub use controller::{
    ControllerError, PollSettings, StopReason, StreamController, StreamHandle, StreamingState,
    StreamingStatus,
};
pub use renderer::{ChartRenderer, RendererError};
pub use session::StreamingSession;
