//! The configuration surface recognized by [`crate::Client::connect`], per
//! §6. `serde::Deserialize` so a caller can load it from JSON/TOML the way
//! `edison-note`'s own `AppConfig` is declared.

use std::time::Duration;

use serde::Deserialize;

use crate::queue::RateLimitConfig;
use crate::reconnect::ReconnectConfig;

fn millis_to_duration(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval: u64,
    #[serde(default = "default_max_burst")]
    pub max_burst: u32,
    #[serde(default = "default_burst_window_ms")]
    pub burst_window: u64,
    #[serde(default)]
    pub compose_queue_head: bool,
}

fn default_min_interval_ms() -> u64 {
    0
}
fn default_max_burst() -> u32 {
    u32::MAX
}
fn default_burst_window_ms() -> u64 {
    1000
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            min_interval: default_min_interval_ms(),
            max_burst: default_max_burst(),
            burst_window: default_burst_window_ms(),
            compose_queue_head: false,
        }
    }
}

impl From<RateLimitOptions> for RateLimitConfig {
    fn from(o: RateLimitOptions) -> Self {
        RateLimitConfig {
            enabled: o.enabled,
            min_interval: millis_to_duration(o.min_interval),
            max_burst: o.max_burst,
            burst_window: millis_to_duration(o.burst_window),
            compose_queue_head: o.compose_queue_head,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_true() -> bool {
    true
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay_ms(),
            max_delay: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl From<ReconnectOptions> for ReconnectConfig {
    fn from(o: ReconnectOptions) -> Self {
        ReconnectConfig {
            enabled: o.enabled,
            max_attempts: o.max_attempts,
            initial_delay: millis_to_duration(o.initial_delay),
            max_delay: millis_to_duration(o.max_delay),
            backoff_factor: o.backoff_factor,
        }
    }
}

/// The recognized configuration options of §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub server_url: String,
    pub note_id: String,
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout: u64,
    #[serde(default)]
    pub rate_limit: RateLimitOptions,
    #[serde(default)]
    pub reconnect: ReconnectOptions,
    #[serde(default = "default_true")]
    pub track_undo: bool,
    #[serde(default = "default_undo_max_size")]
    pub undo_max_size: usize,
    #[serde(default = "default_undo_group_interval_ms")]
    pub undo_group_interval: u64,
}

fn default_operation_timeout_ms() -> u64 {
    10_000
}
fn default_undo_max_size() -> usize {
    100
}
fn default_undo_group_interval_ms() -> u64 {
    1000
}

impl Config {
    pub fn new(server_url: impl Into<String>, note_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            note_id: note_id.into(),
            cookie: None,
            operation_timeout: default_operation_timeout_ms(),
            rate_limit: RateLimitOptions::default(),
            reconnect: ReconnectOptions::default(),
            track_undo: true,
            undo_max_size: default_undo_max_size(),
            undo_group_interval: default_undo_group_interval_ms(),
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        millis_to_duration(self.operation_timeout)
    }

    pub fn undo_group_interval(&self) -> Duration {
        millis_to_duration(self.undo_group_interval)
    }
}
