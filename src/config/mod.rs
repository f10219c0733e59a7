//! Channel configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChannelConfig`] | Validated, immutable settings |
//! | [`ChannelConfigBuilder`] | Fluent configuration builder |
//! | [`ReadoutMode`] | Which signal triggers the latency readout |
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use camera_remote::ChannelConfig;
//!
//! # fn example() -> camera_remote::Result<()> {
//! let config = ChannelConfig::builder()
//!     .endpoint("ws://192.168.4.1:9876/")
//!     .probe_timeout(Duration::from_secs(5))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for channel configuration.
pub mod builder;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{ChannelConfigBuilder, ConfigFile};

// ============================================================================
// Constants
// ============================================================================

/// Controller endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://100.70.11.11:9876/";

/// Time allowed for the first ping to be answered.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Zoom factor change per `zoom-in` / `zoom-out` command.
pub const DEFAULT_ZOOM_STEP: f64 = 0.5;

/// Delay before the first reconnect attempt of the supervisor.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on the supervisor's reconnect delay.
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

// ============================================================================
// ReadoutMode
// ============================================================================

/// Selects which signal produces the latency readout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadoutMode {
    /// Read latency when the executor reports the action as rendered.
    #[default]
    ActionCompleted,
    /// Read latency right after the `CommandStarting` broadcast.
    CommandStarting,
}

impl ReadoutMode {
    /// Returns the kebab-case name used in config files and on the CLI.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ActionCompleted => "action-completed",
            Self::CommandStarting => "command-starting",
        }
    }
}

impl fmt::Display for ReadoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadoutMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "action-completed" => Ok(Self::ActionCompleted),
            "command-starting" => Ok(Self::CommandStarting),
            other => Err(Error::config(format!(
                "Unknown readout mode '{other}'. Expected 'action-completed' or 'command-starting'"
            ))),
        }
    }
}

// ============================================================================
// ChannelConfig
// ============================================================================

/// Validated settings for the remote-command channel.
///
/// Use [`ChannelConfig::builder()`] to create one.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Controller endpoint (`ws://` only).
    pub endpoint: Url,
    /// Time allowed for the liveness probe.
    pub probe_timeout: Duration,
    /// Zoom change per zoom command.
    pub zoom_step: f64,
    /// Latency readout trigger.
    pub readout: ReadoutMode,
    /// Pause before re-issuing a failed read. Zero re-reads immediately.
    pub receive_retry_delay: Duration,
    /// First supervisor reconnect delay.
    pub reconnect_base_delay: Duration,
    /// Cap on supervisor reconnect delay.
    pub reconnect_max_delay: Duration,
}

impl ChannelConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ChannelConfigBuilder {
        ChannelConfigBuilder::new()
    }
}

/// Parses and checks a controller endpoint.
///
/// # Errors
///
/// Returns [`Error::InvalidEndpoint`] if the string is not a URL, the scheme
/// is not `ws`, or the host is missing.
pub fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::invalid_endpoint(raw, e.to_string()))?;

    if url.scheme() != "ws" {
        return Err(Error::invalid_endpoint(
            raw,
            format!("scheme must be 'ws', got '{}'", url.scheme()),
        ));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::invalid_endpoint(raw, "missing host"));
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChannelConfig::builder().build().expect("defaults are valid");
        assert_eq!(config.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(config.probe_timeout, DEFAULT_PROBE_TIMEOUT);
        assert_eq!(config.zoom_step, 0.5);
        assert_eq!(config.readout, ReadoutMode::ActionCompleted);
        assert_eq!(config.receive_retry_delay, Duration::ZERO);
    }

    #[test]
    fn test_parse_endpoint_accepts_ws() {
        let url = parse_endpoint("ws://127.0.0.1:9876/").expect("valid endpoint");
        assert_eq!(url.port(), Some(9876));
    }

    #[test]
    fn test_parse_endpoint_rejects_other_schemes() {
        let err = parse_endpoint("http://127.0.0.1/").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));

        let err = parse_endpoint("wss://127.0.0.1/").unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_parse_endpoint_rejects_garbage() {
        assert!(parse_endpoint("not a url").is_err());
    }

    #[test]
    fn test_readout_mode_round_trip_names() {
        for mode in [ReadoutMode::ActionCompleted, ReadoutMode::CommandStarting] {
            assert_eq!(mode.as_str().parse::<ReadoutMode>().unwrap(), mode);
        }
        assert!("sometimes".parse::<ReadoutMode>().is_err());
    }

    #[test]
    fn test_readout_mode_serde_name() {
        let json = serde_json::to_string(&ReadoutMode::CommandStarting).unwrap();
        assert_eq!(json, "\"command-starting\"");
    }
}
