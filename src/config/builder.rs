//! Builder pattern for channel configuration.
//!
//! Provides a fluent API for creating validated [`ChannelConfig`] values,
//! optionally seeded from a JSON file.
//!
//! # Example
//!
//! ```no_run
//! use camera_remote::{ChannelConfig, ReadoutMode};
//!
//! # fn example() -> camera_remote::Result<()> {
//! let config = ChannelConfig::builder()
//!     .endpoint("ws://127.0.0.1:9876/")
//!     .readout(ReadoutMode::CommandStarting)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::{
    ChannelConfig, DEFAULT_ENDPOINT, DEFAULT_PROBE_TIMEOUT, DEFAULT_RECONNECT_BASE_DELAY,
    DEFAULT_RECONNECT_MAX_DELAY, DEFAULT_ZOOM_STEP, ReadoutMode, parse_endpoint,
};

// ============================================================================
// ConfigFile
// ============================================================================

/// On-disk configuration format.
///
/// Every field is optional; missing fields keep the builder's value.
///
/// ```json
/// {
///   "endpoint": "ws://192.168.4.1:9876/",
///   "probe_timeout_ms": 5000,
///   "zoom_step": 0.5,
///   "readout": "action-completed"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Controller endpoint.
    pub endpoint: Option<String>,
    /// Liveness probe timeout in milliseconds.
    pub probe_timeout_ms: Option<u64>,
    /// Zoom change per zoom command.
    pub zoom_step: Option<f64>,
    /// Latency readout trigger.
    pub readout: Option<ReadoutMode>,
    /// Pause before re-issuing a failed read, in milliseconds.
    pub receive_retry_delay_ms: Option<u64>,
    /// First supervisor reconnect delay, in milliseconds.
    pub reconnect_base_delay_ms: Option<u64>,
    /// Cap on supervisor reconnect delay, in milliseconds.
    pub reconnect_max_delay_ms: Option<u64>,
}

// ============================================================================
// ChannelConfigBuilder
// ============================================================================

/// Builder for configuring a [`ChannelConfig`].
///
/// Use [`ChannelConfig::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct ChannelConfigBuilder {
    endpoint: String,
    probe_timeout: Duration,
    zoom_step: f64,
    readout: ReadoutMode,
    receive_retry_delay: Duration,
    reconnect_base_delay: Duration,
    reconnect_max_delay: Duration,
}

impl Default for ChannelConfigBuilder {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            zoom_step: DEFAULT_ZOOM_STEP,
            readout: ReadoutMode::default(),
            receive_retry_delay: Duration::ZERO,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            reconnect_max_delay: DEFAULT_RECONNECT_MAX_DELAY,
        }
    }
}

// ============================================================================
// ChannelConfigBuilder Implementation
// ============================================================================

impl ChannelConfigBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder seeded from a JSON config file.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Json`] if the file is not a valid [`ConfigFile`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&contents)?;

        debug!(path = %path.display(), "Loaded config file");

        Ok(Self::new().apply_file(file))
    }

    /// Overlays every field present in `file`.
    #[must_use]
    pub fn apply_file(mut self, file: ConfigFile) -> Self {
        if let Some(endpoint) = file.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(ms) = file.probe_timeout_ms {
            self.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(step) = file.zoom_step {
            self.zoom_step = step;
        }
        if let Some(readout) = file.readout {
            self.readout = readout;
        }
        if let Some(ms) = file.receive_retry_delay_ms {
            self.receive_retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.reconnect_base_delay_ms {
            self.reconnect_base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.reconnect_max_delay_ms {
            self.reconnect_max_delay = Duration::from_millis(ms);
        }
        self
    }

    /// Sets the controller endpoint (e.g. `ws://192.168.4.1:9876/`).
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the liveness probe timeout.
    #[inline]
    #[must_use]
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the zoom change applied per zoom command.
    #[inline]
    #[must_use]
    pub fn zoom_step(mut self, step: f64) -> Self {
        self.zoom_step = step;
        self
    }

    /// Sets the latency readout trigger.
    #[inline]
    #[must_use]
    pub fn readout(mut self, readout: ReadoutMode) -> Self {
        self.readout = readout;
        self
    }

    /// Sets the pause before a failed read is re-issued.
    #[inline]
    #[must_use]
    pub fn receive_retry_delay(mut self, delay: Duration) -> Self {
        self.receive_retry_delay = delay;
        self
    }

    /// Sets the supervisor's reconnect backoff bounds.
    #[inline]
    #[must_use]
    pub fn reconnect_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEndpoint`] if the endpoint is not a `ws://` URL
    /// - [`Error::Config`] if a timing or zoom value is out of range
    pub fn build(self) -> Result<ChannelConfig> {
        let endpoint = parse_endpoint(&self.endpoint)?;
        self.validate()?;

        Ok(ChannelConfig {
            endpoint,
            probe_timeout: self.probe_timeout,
            zoom_step: self.zoom_step,
            readout: self.readout,
            receive_retry_delay: self.receive_retry_delay,
            reconnect_base_delay: self.reconnect_base_delay,
            reconnect_max_delay: self.reconnect_max_delay,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ChannelConfigBuilder {
    fn validate(&self) -> Result<()> {
        if self.probe_timeout.is_zero() {
            return Err(Error::config("Probe timeout must be greater than zero"));
        }

        if !self.zoom_step.is_finite() || self.zoom_step <= 0.0 {
            return Err(Error::config(format!(
                "Zoom step must be a positive number, got {}",
                self.zoom_step
            )));
        }

        if self.reconnect_base_delay.is_zero() {
            return Err(Error::config("Reconnect base delay must be greater than zero"));
        }

        if self.reconnect_base_delay > self.reconnect_max_delay {
            return Err(Error::config(format!(
                "Reconnect base delay ({}ms) exceeds max delay ({}ms)",
                self.reconnect_base_delay.as_millis(),
                self.reconnect_max_delay.as_millis()
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
