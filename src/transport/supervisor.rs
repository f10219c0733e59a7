//! Caller-side reconnect loop.
//!
//! The [`ConnectionManager`] never reconnects on its own. [`Supervisor`]
//! layers a capped exponential backoff on top: it keeps calling
//! `connect()` while the connection is `Failed` or `Idle` and sleeps while it
//! is up. A `Running → Connecting` dip caused by a read error is left to the
//! receive loop, which recovers on the same socket.
//!
//! Every lost connection waits at least the base delay before redialling. A
//! connection counts as stable once it stayed up for the max delay; losing a
//! shorter-lived one keeps escalating the backoff.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::connection::{ConnectionManager, ConnectionState};

// ============================================================================
// Supervisor
// ============================================================================

/// Keeps a [`ConnectionManager`] connected until told to stop.
#[derive(Debug, Clone)]
pub struct Supervisor {
    manager: ConnectionManager,
    base_delay: Duration,
    max_delay: Duration,
}

impl Supervisor {
    /// Creates a supervisor using the manager's configured backoff.
    #[must_use]
    pub fn new(manager: ConnectionManager) -> Self {
        let base_delay = manager.config().reconnect_base_delay;
        let max_delay = manager.config().reconnect_max_delay;
        Self {
            manager,
            base_delay,
            max_delay,
        }
    }

    /// Returns the supervised manager.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// `base × 2^(attempt − 1)`, capped at the max delay. Attempt 0 is zero.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let shift = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << shift)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Runs until `shutdown` resolves, then disconnects.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut state_rx = self.manager.watch_state();
        let mut attempt: u32 = 0;

        info!(endpoint = %self.manager.endpoint(), "Supervisor started");

        loop {
            let result = tokio::select! {
                _ = &mut shutdown => break,
                result = self.manager.connect() => result,
            };

            match result {
                Ok(()) => {
                    let connected_at = Instant::now();

                    // Up: wait for the connection to be lost.
                    tokio::select! {
                        _ = &mut shutdown => break,
                        changed = state_rx.wait_for(|s| {
                            matches!(s, ConnectionState::Failed | ConnectionState::Idle)
                        }) => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }

                    let uptime = connected_at.elapsed();
                    attempt = if uptime >= self.max_delay {
                        1
                    } else {
                        attempt.saturating_add(1)
                    };
                    debug!(uptime_ms = uptime.as_millis() as u64, attempt, "Connection lost");
                }
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    warn!(attempt, error = %e, "Connect attempt failed");
                }
            }

            let delay = self.backoff_delay(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(delay) => {}
            }
        }

        self.manager.disconnect().await;
        info!("Supervisor stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================
