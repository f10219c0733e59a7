//! Single-slot command latency tracker.
//!
//! Holds at most one in-flight command. A new [`LatencyTracker::record`]
//! overwrites whatever was pending, and a readout consumes the slot.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// LatencyReading
// ============================================================================

/// Result of a successful latency readout.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyReading {
    /// Raw command text that was measured.
    pub command: String,
    /// Milliseconds between `record` and the readout.
    pub elapsed_ms: f64,
}

impl fmt::Display for LatencyReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} — {:.1} ms", self.command, self.elapsed_ms)
    }
}

// ============================================================================
// LatencyTracker
// ============================================================================

/// The pending slot.
#[derive(Debug)]
struct PendingCommand {
    command: String,
    started_at: Instant,
}

/// Measures time from command receipt to completion feedback.
#[derive(Debug, Default)]
pub struct LatencyTracker {
    slot: Mutex<Option<PendingCommand>>,
}

impl LatencyTracker {
    /// Creates an empty tracker.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts measuring `command`, discarding any unfinished measurement.
    pub fn record(&self, command: impl Into<String>) {
        let command = command.into();
        let pending = PendingCommand {
            command: command.clone(),
            started_at: Instant::now(),
        };

        if let Some(dropped) = self.slot.lock().replace(pending) {
            debug!(dropped = %dropped.command, "Unfinished measurement overwritten");
        }

        debug!(%command, "Recorded command");
    }

    /// Consumes the pending command and returns its elapsed time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPendingCommand`] if nothing was recorded since the
    /// last readout.
    pub fn calculate_latency(&self) -> Result<LatencyReading> {
        let Some(pending) = self.slot.lock().take() else {
            debug!("Latency requested with no pending command");
            return Err(Error::NoPendingCommand);
        };

        let elapsed_ms = pending.started_at.elapsed().as_secs_f64() * 1000.0;

        debug!(command = %pending.command, elapsed_ms, "Calculated latency");

        Ok(LatencyReading {
            command: pending.command,
            elapsed_ms,
        })
    }

    /// Returns the pending command name without consuming it.
    #[must_use]
    pub fn pending(&self) -> Option<String> {
        self.slot.lock().as_ref().map(|p| p.command.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
