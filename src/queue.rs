//! Outbound queue and rate limiter (§4.3). Operations land here only when
//! the client cannot send directly: it is rate-limited, disconnected, or
//! already has an operation `AwaitingConfirm`. Draining is cooperative. At
//! most one operation is dispatched per call to [`OutboundQueue::try_dispatch`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::clock::SharedClock;
use crate::ot::TextOperation;

/// `revision` is the base revision the operation was computed against at
/// the moment it was finalized (`LocalOutcome::Send`/`AckOutcome::Send`),
/// captured here so a rate-limit delay between finalizing the send and
/// actually dispatching it over the wire can never let a later, advanced
/// `ot.revision()` get attached to these bytes instead.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub operation: TextOperation,
    pub revision: u64,
    pub enqueued_at: Instant,
    pub attempt: u32,
}

/// Rate limiter configuration: a minimum gap between dispatches plus a
/// token-bucket burst allowance per window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub min_interval: Duration,
    pub max_burst: u32,
    pub burst_window: Duration,
    /// Pure optimization, off by default: when multiple queued operations
    /// exist and the transport is ready, compose the queue head with its
    /// successors provided no acknowledgment boundary has passed.
    pub compose_queue_head: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_interval: Duration::from_millis(0),
            max_burst: u32::MAX,
            burst_window: Duration::from_secs(1),
            compose_queue_head: false,
        }
    }
}

#[derive(Debug)]
struct RateLimiter {
    config: RateLimitConfig,
    clock: SharedClock,
    last_dispatch: Option<Instant>,
    burst_count: u32,
    burst_window_start: Option<Instant>,
}

impl RateLimiter {
    fn new(config: RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            last_dispatch: None,
            burst_count: 0,
            burst_window_start: None,
        }
    }

    /// Returns `true` iff a dispatch is permitted right now, recording the
    /// dispatch against the bucket as a side effect.
    fn try_acquire(&mut self) -> bool {
        if !self.config.enabled {
            return true;
        }
        let now = self.clock.now();

        if let Some(last) = self.last_dispatch {
            if now.duration_since(last) < self.config.min_interval {
                return false;
            }
        }

        match self.burst_window_start {
            Some(start) if now.duration_since(start) >= self.config.burst_window => {
                self.burst_window_start = Some(now);
                self.burst_count = 0;
            }
            None => {
                self.burst_window_start = Some(now);
            }
            _ => {}
        }

        if self.burst_count >= self.config.max_burst {
            return false;
        }

        self.burst_count += 1;
        self.last_dispatch = Some(now);
        true
    }
}

/// The outbound queue of operations waiting to be dispatched.
#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<QueueEntry>,
    limiter: RateLimiter,
    clock: SharedClock,
}

impl OutboundQueue {
    pub fn new(config: RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            entries: VecDeque::new(),
            limiter: RateLimiter::new(config, clock.clone()),
            clock,
        }
    }

    pub fn enqueue(&mut self, operation: TextOperation, revision: u64) {
        self.entries.push_back(QueueEntry {
            operation,
            revision,
            enqueued_at: self.clock.now(),
            attempt: 0,
        });
    }

    /// `getQueuedOperationCount()`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the rate limiter would currently allow an immediate send,
    /// without actually consuming a token.
    pub fn can_send_now(&self) -> bool {
        !self.limiter.config.enabled
            || self.entries.is_empty() && self.would_acquire()
    }

    fn would_acquire(&self) -> bool {
        // Peek without mutating: re-derive the same decision try_acquire
        // would make, since try_acquire's side effects only matter once we
        // actually commit to a dispatch.
        if !self.limiter.config.enabled {
            return true;
        }
        let now = self.clock.now();
        if let Some(last) = self.limiter.last_dispatch {
            if now.duration_since(last) < self.limiter.config.min_interval {
                return false;
            }
        }
        let burst_count = match self.limiter.burst_window_start {
            Some(start) if now.duration_since(start) >= self.limiter.config.burst_window => 0,
            _ => self.limiter.burst_count,
        };
        burst_count < self.limiter.config.max_burst
    }

    /// Attempts to pop the head of the queue, subject to the rate limiter,
    /// returning the operation together with the base revision it was
    /// finalized against. Dispatches at most one operation; call again on
    /// the next scheduler tick to drain further.
    pub fn try_dispatch(&mut self) -> Option<(TextOperation, u64)> {
        if self.entries.is_empty() {
            return None;
        }
        if self.limiter.config.compose_queue_head {
            self.compose_head_with_successors();
        }
        if !self.limiter.try_acquire() {
            return None;
        }
        self.entries.pop_front().map(|e| (e.operation, e.revision))
    }

    /// Folds every currently-queued operation into the head, since none of
    /// them have crossed an acknowledgment boundary yet. Only runs when
    /// `compose_queue_head` is enabled (off by default).
    fn compose_head_with_successors(&mut self) {
        if self.entries.len() < 2 {
            return;
        }
        let mut composed = self.entries.pop_front().expect("checked non-empty above");
        while let Some(next) = self.entries.pop_front() {
            match composed.operation.compose(&next.operation) {
                Ok(op) => composed.operation = op,
                Err(_) => {
                    // Could not compose (base/target length mismatch); put
                    // it back and stop folding.
                    self.entries.push_front(next);
                    break;
                }
            }
        }
        self.entries.push_front(composed);
    }

    /// Flushes pending entries in FIFO order, bypassing the rate limiter.
    /// Used when rate limiting is disabled mid-session.
    pub fn flush_all(&mut self) -> Vec<QueueEntry> {
        self.entries.drain(..).collect()
    }

    /// Drops every pending entry, e.g. on `disconnect()`. Returns what was
    /// dropped so the caller can emit a user-observable event.
    pub fn clear(&mut self) -> Vec<QueueEntry> {
        self.entries.drain(..).collect()
    }
}
