//! Key/value store client subsystem.
//!
//! # Data Flow
//! ```text
//! Environment / Watcher
//!     → KvClient::get    (one node, its direct children, store index)
//!     → KvClient::watch  (long-poll until a change at or after a revision)
//!
//! Implementations:
//!     etcd.rs   (etcd v2 HTTP API over reqwest)
//!     memory.rs (in-process store with history, used by tests and demos)
//! ```
//!
//! # Design Decisions
//! - One client is shared by every task behind `Arc<dyn KvClient>`
//! - Watch timeouts are reported as `KvError::Timeout`, never as transport errors
//! - Compacted history is reported as `KvError::RevisionUnavailable` so callers can resync

pub mod etcd;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use etcd::EtcdClient;
pub use memory::MemoryKv;

/// A node as returned by the store: a directory or a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvNode {
    /// Absolute key of the node.
    pub key: String,
    /// Scalar value, present for leaves.
    pub value: Option<String>,
    /// Whether the node is a directory.
    pub is_dir: bool,
    /// Direct children of a directory, in store order.
    pub children: Vec<KvNode>,
    /// Modification index of the node.
    pub revision: u64,
    /// Field-level error flagged by the store on this node.
    pub error: Option<String>,
}

impl KvNode {
    /// Last path segment of the node's key.
    pub fn name(&self) -> &str {
        last_segment(&self.key)
    }
}

/// A node together with the store-wide index observed by the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvResponse {
    pub node: KvNode,
    /// Store-wide revision at the time the response was produced.
    pub index: u64,
}

/// Parameters of a long-poll watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Report changes anywhere below the key, not only on the key itself.
    pub recursive: bool,
    /// First revision of interest (inclusive).
    pub since_revision: u64,
    /// How long to wait before giving up with `KvError::Timeout`.
    pub timeout: Duration,
}

/// Errors reported by a KV client.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// History has been compacted past the requested revision.
    #[error("revision {requested} of {key} is no longer available")]
    RevisionUnavailable { key: String, requested: u64 },

    /// A read or a watch gave up waiting for the store.
    #[error("request timed out")]
    Timeout,

    /// The store rejected a field of the request or node.
    #[error("field error on {key}: {message}")]
    Field { key: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed store response: {0}")]
    Decode(String),
}

/// Operations the resolver and watcher need from a store.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Read a key. Directories include their direct children.
    async fn get(&self, key: &str) -> Result<KvResponse, KvError>;

    /// Block until something at or below `key` changes at or after
    /// `opts.since_revision`, or until `opts.timeout` elapses.
    async fn watch(&self, key: &str, opts: WatchOptions) -> Result<KvResponse, KvError>;
}

/// Last `/`-separated segment of a key.
pub fn last_segment(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
