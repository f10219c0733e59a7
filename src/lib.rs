//! Camera Remote - WebSocket remote-command channel for a camera device.
//!
//! The device keeps one WebSocket client connection to a remote
//! controller, turns each inbound text frame into a local camera action, and
//! measures how long each command takes from receipt to rendered feedback.
//!
//! # Architecture
//!
//! ```text
//! controller ──► ConnectionManager ──► CommandDispatcher ──► ActionExecutor
//!                 (frames)              │  (record + event)      │
//!                                       ▼                        ▼
//!                                  LatencyTracker ◄──── CompletionSignal
//! ```
//!
//! Key design points:
//!
//! - One connection at a time; `connect()` is a no-op while running
//! - Read errors re-arm the receive loop on the same socket
//! - Latency tracking is a single slot, not a queue
//! - Observers register explicitly on an [`EventBus`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use camera_remote::{
//!     ChannelConfig, CommandDispatcher, ConnectionManager, EventBus, Result, SimulatedCamera,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ChannelConfig::builder()
//!         .endpoint("ws://192.168.4.1:9876/")
//!         .build()?;
//!
//!     let camera = Arc::new(SimulatedCamera::new());
//!     let dispatcher = Arc::new(CommandDispatcher::new(
//!         &config,
//!         Arc::new(EventBus::new()),
//!         camera.clone(),
//!     ));
//!     camera.set_completion(dispatcher.completion_signal());
//!
//!     let manager = ConnectionManager::websocket(config, dispatcher);
//!     manager.connect().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Channel configuration and builder |
//! | [`dispatch`] | Dispatcher, latency tracker, executor interface |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Command vocabulary and events |
//! | [`transport`] | WebSocket connection lifecycle |

// ============================================================================
// Modules
// ============================================================================

/// Channel configuration.
///
/// Use [`ChannelConfig::builder()`] to create a validated configuration.
pub mod config;

/// Command dispatch and latency measurement.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for sessions and subscriptions.
pub mod identifiers;

/// Command vocabulary and channel events.
pub mod protocol;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration types
pub use config::{ChannelConfig, ChannelConfigBuilder, ReadoutMode};

// Dispatch types
pub use dispatch::{
    ActionExecutor, CameraState, CommandDispatcher, CompletionSignal, LatencyReading,
    LatencyTracker, SimulatedCamera,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{SessionId, SubscriptionId};

// Protocol types
pub use protocol::{ChannelEvent, Command, CommandKind, EventBus};

// Transport types
pub use transport::{ConnectionManager, ConnectionState, Supervisor};
