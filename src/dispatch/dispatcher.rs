//! Command dispatch.
//!
//! For every inbound text frame the dispatcher, in order:
//!
//! 1. records the command in the [`LatencyTracker`]
//! 2. broadcasts [`ChannelEvent::CommandStarting`]
//! 3. takes the latency readout, in [`ReadoutMode::CommandStarting`] only
//! 4. invokes the matching [`ActionExecutor`] method, if any
//!
//! Recording first puts the start time as close to receipt as possible, so
//! the readout covers receipt through rendered feedback.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ChannelConfig, ReadoutMode};
use crate::protocol::{ChannelEvent, Command, CommandKind, EventBus};

use super::executor::ActionExecutor;
use super::latency::{LatencyReading, LatencyTracker};

// ============================================================================
// CompletionSignal
// ============================================================================

/// Handle the executor side fires once an action's feedback is rendered.
///
/// Cheap to clone. Each call takes one readout from the shared tracker and
/// broadcasts it as [`ChannelEvent::LatencyMeasured`].
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tracker: Arc<LatencyTracker>,
    bus: Arc<EventBus>,
}

impl CompletionSignal {
    /// Creates a signal over `tracker` that reports on `bus`.
    #[inline]
    #[must_use]
    pub fn new(tracker: Arc<LatencyTracker>, bus: Arc<EventBus>) -> Self {
        Self { tracker, bus }
    }

    /// Takes a readout.
    ///
    /// Returns `None` when nothing is pending; that case is not an error for
    /// the caller, it simply has nothing to show.
    pub fn complete(&self) -> Option<LatencyReading> {
        match self.tracker.calculate_latency() {
            Ok(reading) => {
                self.bus.emit(&ChannelEvent::LatencyMeasured(reading.clone()));
                Some(reading)
            }
            Err(e) => {
                debug!(error = %e, "No latency readout");
                None
            }
        }
    }
}

// ============================================================================
// CommandDispatcher
// ============================================================================

/// Maps inbound text frames to local actions.
pub struct CommandDispatcher {
    tracker: Arc<LatencyTracker>,
    bus: Arc<EventBus>,
    executor: Arc<dyn ActionExecutor>,
    completion: CompletionSignal,
    readout: ReadoutMode,
    zoom_step: f64,
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("readout", &self.readout)
            .field("zoom_step", &self.zoom_step)
            .field("pending", &self.tracker.pending())
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Creates a dispatcher with its own latency tracker.
    #[must_use]
    pub fn new(
        config: &ChannelConfig,
        bus: Arc<EventBus>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self::with_tracker(config, Arc::new(LatencyTracker::new()), bus, executor)
    }

    /// Creates a dispatcher around an existing tracker.
    #[must_use]
    pub fn with_tracker(
        config: &ChannelConfig,
        tracker: Arc<LatencyTracker>,
        bus: Arc<EventBus>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let completion = CompletionSignal::new(Arc::clone(&tracker), Arc::clone(&bus));
        Self {
            tracker,
            bus,
            executor,
            completion,
            readout: config.readout,
            zoom_step: config.zoom_step,
        }
    }

    /// Returns the tracker this dispatcher records into.
    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &Arc<LatencyTracker> {
        &self.tracker
    }

    /// Returns the event bus this dispatcher broadcasts on.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Returns a completion handle for the executor side.
    #[inline]
    #[must_use]
    pub fn completion_signal(&self) -> CompletionSignal {
        self.completion.clone()
    }

    /// Returns the configured readout mode.
    #[inline]
    #[must_use]
    pub const fn readout(&self) -> ReadoutMode {
        self.readout
    }

    /// Reports that the last action finished rendering.
    ///
    /// Equivalent to firing [`Self::completion_signal`].
    pub fn action_completed(&self) -> Option<LatencyReading> {
        self.completion.complete()
    }

    /// Handles one inbound text frame.
    ///
    /// Returns the recognized kind; callers are free to ignore it.
    pub fn dispatch(&self, raw_text: &str) -> CommandKind {
        self.tracker.record(raw_text);
        self.bus
            .emit(&ChannelEvent::CommandStarting(raw_text.to_owned()));

        if self.readout == ReadoutMode::CommandStarting {
            self.completion.complete();
        }

        let command = Command::parse(raw_text);
        match command.kind() {
            CommandKind::Picture => {
                debug!("Dispatching capture");
                self.executor.capture_photo();
            }
            CommandKind::Video => {
                debug!("Dispatching recording toggle");
                self.executor.toggle_recording();
            }
            CommandKind::ZoomIn => {
                debug!(step = self.zoom_step, "Dispatching zoom in");
                self.executor.zoom_in(self.zoom_step);
            }
            CommandKind::ZoomOut => {
                debug!(step = self.zoom_step, "Dispatching zoom out");
                self.executor.zoom_out(self.zoom_step);
            }
            CommandKind::Unknown => {
                warn!(command = %command, "Unknown command");
            }
        }

        command.kind()
    }
}

// ============================================================================
// Tests
// ============================================================================
