//! WebSocket transport layer.
//!
//! This module owns the single client connection from the device to the
//! remote controller.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                         ┌─────────────────┐
//! │  Device (Rust)       │                         │  Controller     │
//! │                      │        WebSocket        │                 │
//! │  ConnectionManager   │────────────────────────►│  WebSocket      │
//! │  → session task      │   text commands ◄───    │  Server         │
//! │  → CommandDispatcher │   ping ───► pong        │                 │
//! └──────────────────────┘                         └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionManager::connect` - Open socket, start receive loop
//! 2. Liveness probe (ping/pong) - State becomes `Running`
//! 3. Receive loop - Dispatch text frames, re-listen on read errors
//! 4. `ConnectionManager::disconnect` - Close socket, back to `Idle`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | State machine and receive loop |
//! | `socket` | Transport traits and tokio-tungstenite client |
//! | `supervisor` | Reconnect loop with backoff |

// ============================================================================
// Submodules
// ============================================================================

/// State machine and receive loop.
pub mod connection;

/// Transport traits and WebSocket client.
pub mod socket;

/// Reconnect loop with backoff.
pub mod supervisor;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ConnectionManager, ConnectionState};
pub use socket::{Connector, Frame, Transport, WsConnector, WsTransport};
pub use supervisor::Supervisor;
