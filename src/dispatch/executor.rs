//! Local action interface and a simulated camera.
//!
//! The dispatcher only knows [`ActionExecutor`]. Real capture hardware sits
//! behind it; [`SimulatedCamera`] stands in for it in the binary and tests.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use tracing::info;

use super::dispatcher::CompletionSignal;

// ============================================================================
// Constants
// ============================================================================

/// Lowest zoom factor.
pub const MIN_ZOOM: f64 = 1.0;

/// Highest zoom factor the simulated hardware accepts.
pub const MAX_ZOOM: f64 = 5.0;

// ============================================================================
// ActionExecutor
// ============================================================================

/// Performs the camera operation for a dispatched command.
///
/// Calls are fire-and-forget; the dispatcher ignores any outcome. Clamping
/// and hardware errors are the implementor's business.
pub trait ActionExecutor: Send + Sync {
    /// Captures a still photo.
    fn capture_photo(&self);

    /// Starts recording if stopped, stops it if recording.
    fn toggle_recording(&self);

    /// Increases zoom by `step`.
    fn zoom_in(&self, step: f64);

    /// Decreases zoom by `step`.
    fn zoom_out(&self, step: f64);
}

// ============================================================================
// SimulatedCamera
// ============================================================================

/// Observable state of a [`SimulatedCamera`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Photos captured so far.
    pub photos_taken: u64,
    /// Whether a recording is running.
    pub recording: bool,
    /// Current zoom factor, within `[MIN_ZOOM, MAX_ZOOM]`.
    pub zoom: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            photos_taken: 0,
            recording: false,
            zoom: MIN_ZOOM,
        }
    }
}

/// In-memory camera that logs each action and reports completion.
#[derive(Debug, Default)]
pub struct SimulatedCamera {
    state: Mutex<CameraState>,
    completion: Mutex<Option<CompletionSignal>>,
}

impl SimulatedCamera {
    /// Creates a camera at minimum zoom, not recording.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires `signal` after every action from now on.
    pub fn set_completion(&self, signal: CompletionSignal) {
        *self.completion.lock() = Some(signal);
    }

    /// Returns a snapshot of the camera state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> CameraState {
        *self.state.lock()
    }

    fn zoom_by(&self, delta: f64) {
        let zoom = {
            let mut state = self.state.lock();
            state.zoom = (state.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
            state.zoom
        };
        info!(zoom, "Zoom set");
        self.finish();
    }

    fn finish(&self) {
        let signal = self.completion.lock().clone();
        if let Some(signal) = signal {
            signal.complete();
        }
    }
}

impl ActionExecutor for SimulatedCamera {
    fn capture_photo(&self) {
        let photos = {
            let mut state = self.state.lock();
            state.photos_taken += 1;
            state.photos_taken
        };
        info!(photos, "Photo captured");
        self.finish();
    }

    fn toggle_recording(&self) {
        let recording = {
            let mut state = self.state.lock();
            state.recording = !state.recording;
            state.recording
        };
        if recording {
            info!("Recording started");
        } else {
            info!("Recording stopped");
        }
        self.finish();
    }

    fn zoom_in(&self, step: f64) {
        self.zoom_by(step);
    }

    fn zoom_out(&self, step: f64) {
        self.zoom_by(-step);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let camera = SimulatedCamera::new();
        assert_eq!(camera.state(), CameraState::default());
        assert_eq!(camera.state().zoom, MIN_ZOOM);
    }

    #[test]
    fn test_capture_counts_photos() {
        let camera = SimulatedCamera::new();
        camera.capture_photo();
        camera.capture_photo();
        assert_eq!(camera.state().photos_taken, 2);
    }

    #[test]
    fn test_toggle_recording() {
        let camera = SimulatedCamera::new();
        camera.toggle_recording();
        assert!(camera.state().recording);
        camera.toggle_recording();
        assert!(!camera.state().recording);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let camera = SimulatedCamera::new();
        camera.zoom_out(0.5);
        assert_eq!(camera.state().zoom, MIN_ZOOM);

        for _ in 0..20 {
            camera.zoom_in(0.5);
        }
        assert_eq!(camera.state().zoom, MAX_ZOOM);

        camera.zoom_out(0.5);
        assert_eq!(camera.state().zoom, 4.5);
    }
}
