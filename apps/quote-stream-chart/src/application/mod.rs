//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (quote source, chart widget).
pub mod ports;

/// Polling controller, chart renderer and the session composing them.
pub mod services;
