//! Environment subsystem: one root key resolved into a flat Config Map.
//!
//! # Data Flow
//! ```text
//! root key
//!     → resolver.rs (include order, cycle/depth checks)
//!     → resolver.rs (per-cycle fetch cache, revisions, baseline)
//!     → Environment::load (fold in order, later keys win)
//!     → Snapshot (published atomically)
//! ```
//!
//! # Design Decisions
//! - A load builds a brand new Snapshot; nothing is mutated in place
//! - Loads are serialized per Environment; readers see either the old or
//!   the new Snapshot, never a partial merge
//! - The fetch cache only lives as long as one load

pub mod resolver;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::kv::{KvClient, KvError};

pub use resolver::ResolutionContext;

/// Reserved entry listing keys to merge before a directory's own entries.
pub const INCLUDE_KEY: &str = ".include";

/// Default bound on include chains.
pub const MAX_DEPTH_DEFAULT: usize = 10;

/// Flat name → value mapping.
pub type ConfigMap = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("include loop: {}", .path.join(" -> "))]
    Loop { path: Vec<String> },

    #[error("include depth limit reached: {}", .path.join(" -> "))]
    DepthLimit { path: Vec<String> },

    #[error("{key} is not a directory")]
    NotDirectory { key: String },

    #[error("store reported an error on {key}: {message}")]
    Evaluation { key: String, message: String },

    #[error(transparent)]
    Kv(#[from] KvError),
}

/// Result of one complete reload cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Merged entries, include directive removed.
    pub env: ConfigMap,
    /// Absolute keys in merge order; the root key is last.
    pub keys: Vec<String>,
    /// Revision recorded per fetched key.
    pub revisions: BTreeMap<String, u64>,
    /// Minimum revision observed in the cycle.
    pub baseline: Option<u64>,
}

/// A root key in the store and its most recently loaded Config Map.
pub struct Environment {
    client: Arc<dyn KvClient>,
    root_key: String,
    max_depth: usize,
    current: ArcSwap<Snapshot>,
    reload_lock: Mutex<()>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.current.load();
        f.debug_struct("Environment")
            .field("root_key", &self.root_key)
            .field("max_depth", &self.max_depth)
            .field("keys", &snapshot.keys)
            .field("baseline", &snapshot.baseline)
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// Create an Environment without loading it.
    pub fn new(client: Arc<dyn KvClient>, root_key: &str, max_depth: usize) -> Self {
        let root_key = if root_key.starts_with('/') {
            root_key.trim_end_matches('/').to_string()
        } else {
            format!("/{}", root_key.trim_end_matches('/'))
        };
        Self {
            client,
            root_key,
            max_depth,
            current: ArcSwap::from_pointee(Snapshot::default()),
            reload_lock: Mutex::new(()),
        }
    }

    /// Create an Environment and perform the initial load.
    pub async fn open(
        client: Arc<dyn KvClient>,
        root_key: &str,
        max_depth: usize,
    ) -> Result<Arc<Self>, EnvironmentError> {
        let env = Arc::new(Self::new(client, root_key, max_depth));
        env.load().await?;
        Ok(env)
    }

    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    pub fn client(&self) -> &Arc<dyn KvClient> {
        &self.client
    }

    /// The latest successfully loaded snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// The latest Config Map.
    pub fn env(&self) -> ConfigMap {
        self.snapshot().env.clone()
    }

    /// Resolve includes, fetch every key once and merge them into a fresh
    /// snapshot. The previous snapshot stays visible until this succeeds.
    pub async fn load(&self) -> Result<Arc<Snapshot>, EnvironmentError> {
        let _guard = self.reload_lock.lock().await;

        let mut ctx = ResolutionContext::new(self.client.clone(), &self.root_key, self.max_depth);
        let keys = ctx.resolve(&self.root_key).await?;

        let mut env = ConfigMap::new();
        for key in &keys {
            let entries = ctx.fetch(key).await?;
            env.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        env.remove(INCLUDE_KEY);

        let (revisions, baseline) = ctx.into_parts();
        let snapshot = Arc::new(Snapshot {
            env,
            keys,
            revisions,
            baseline,
        });
        self.current.store(snapshot.clone());

        tracing::debug!(
            root = %self.root_key,
            keys = snapshot.keys.len(),
            entries = snapshot.env.len(),
            baseline = ?snapshot.baseline,
            "Environment loaded"
        );
        Ok(snapshot)
    }
}
