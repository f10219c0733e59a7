//! Command dispatch and latency measurement.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CommandDispatcher`] | Maps text frames to actions, emits events |
//! | [`LatencyTracker`] | Single-slot receipt-to-feedback timer |
//! | [`CompletionSignal`] | Executor-side "feedback rendered" handle |
//! | [`ActionExecutor`] | Local camera operations |
//! | [`SimulatedCamera`] | In-memory executor |

// ============================================================================
// Submodules
// ============================================================================

/// Text frame to action mapping.
pub mod dispatcher;

/// Local action interface.
pub mod executor;

/// Latency measurement.
pub mod latency;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{CommandDispatcher, CompletionSignal};
pub use executor::{ActionExecutor, CameraState, MAX_ZOOM, MIN_ZOOM, SimulatedCamera};
pub use latency::{LatencyReading, LatencyTracker};
