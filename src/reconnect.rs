//! Reconnection controller (§4.4): detects disconnects, schedules attempts
//! with bounded exponential backoff, and resynchronizes the revision on
//! reconnect.

use std::time::{Duration, Instant};

use crate::clock::SharedClock;

#[derive(Debug, Clone, Copy)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectDecision {
    /// Reconnection is disabled; the client stays disconnected.
    Disabled,
    /// Try again in `delay`, at 1-based `attempt`.
    Scheduled { attempt: u32, delay: Duration },
    /// `attempt` exceeded `max_attempts`; give up until the user calls
    /// `reconnect()` manually.
    Failed { attempt: u32, max_attempts: u32 },
}

/// Tracks `{ enabled, attempt, nextDelay, scheduledAt?, lastError? }` from
/// the data model and computes the backoff schedule.
#[derive(Debug, Clone)]
pub struct ReconnectController {
    config: ReconnectConfig,
    clock: SharedClock,
    attempt: u32,
    scheduled_at: Option<Instant>,
    last_error: Option<String>,
}

impl ReconnectController {
    pub fn new(config: ReconnectConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            attempt: 0,
            scheduled_at: None,
            last_error: None,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = (attempt.saturating_sub(1)) as i32;
        let scaled = self.config.initial_delay.as_secs_f64() * self.config.backoff_factor.powi(exponent);
        let capped = scaled.min(self.config.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Called when the transport drops unexpectedly (not a user-initiated
    /// `disconnect()`). Schedules attempt 1.
    pub fn on_disconnect(&mut self) -> ReconnectDecision {
        if !self.config.enabled {
            return ReconnectDecision::Disabled;
        }
        self.attempt = 1;
        let delay = self.delay_for(self.attempt);
        self.scheduled_at = Some(self.clock.now() + delay);
        ReconnectDecision::Scheduled {
            attempt: self.attempt,
            delay,
        }
    }

    /// Called when a reconnect attempt fails.
    pub fn on_attempt_failed(&mut self, error: impl Into<String>) -> ReconnectDecision {
        self.last_error = Some(error.into());
        self.attempt += 1;
        if self.attempt > self.config.max_attempts {
            return ReconnectDecision::Failed {
                attempt: self.attempt,
                max_attempts: self.config.max_attempts,
            };
        }
        let delay = self.delay_for(self.attempt);
        self.scheduled_at = Some(self.clock.now() + delay);
        ReconnectDecision::Scheduled {
            attempt: self.attempt,
            delay,
        }
    }

    /// Called when a reconnect attempt succeeds: resets the attempt
    /// counter to zero per §4.4.
    pub fn on_attempt_succeeded(&mut self) {
        self.attempt = 0;
        self.scheduled_at = None;
        self.last_error = None;
    }

    /// `reconnect()` invoked manually: resets the attempt counter and
    /// forces an immediate try (zero delay).
    pub fn reconnect_now(&mut self) -> ReconnectDecision {
        self.attempt = 0;
        self.scheduled_at = Some(self.clock.now());
        ReconnectDecision::Scheduled {
            attempt: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}
