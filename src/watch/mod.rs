//! Watch controller subsystem.
//!
//! # Data Flow
//! ```text
//! Environment snapshot (keys, per-key revisions, baseline)
//!     → watcher.rs: one task per key, long-poll from max(local, baseline) + 1
//!     → first task to see a change wins, siblings are aborted
//!     → Environment::load (full include resolution, fetch, merge)
//!     → caller callback with the refreshed Environment
//! ```
//!
//! # Design Decisions
//! - Watch timeouts retry immediately; they are not failures
//! - Compacted history triggers a resync read, not a backoff
//! - Every other error backs off with the shared `RetryPolicy`
//! - The reload loop never exits on its own; failures are logged and retried

pub mod watcher;

use std::time::Duration;

use thiserror::Error;

use crate::config::WatchConfig;
use crate::resilience::RetryPolicy;

pub use watcher::Watcher;

/// Default long-poll timeout per watch request.
pub const WATCH_TIMEOUT_DEFAULT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    /// Long-poll timeout per watch request.
    pub timeout: Duration,
    /// Backoff for failed watch attempts and failed reload cycles.
    pub retry: RetryPolicy,
}

impl WatchSettings {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            timeout: config.timeout(),
            retry: config.retry_policy(),
        }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            timeout: WATCH_TIMEOUT_DEFAULT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("environment {root} has no keys to watch")]
    NoKeys { root: String },

    #[error("watch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
