//! Channel protocol types.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | Text frame | Controller → Device | One command word |
//! | Ping frame | Device → Controller | Liveness probe |
//! | [`ChannelEvent`] | Core → Observers | Lifecycle notifications |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command vocabulary |
//! | `event` | Events and the observer bus |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound command vocabulary.
pub mod command;

/// Channel events and observer registration.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, CommandKind};
pub use event::{ChannelEvent, EventBus, EventHandler};
