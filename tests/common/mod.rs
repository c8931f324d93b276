//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kvenv::kv::{KvClient, KvError, KvResponse, MemoryKv, WatchOptions};
use kvenv::resilience::RetryPolicy;
use kvenv::watch::WatchSettings;

/// A `MemoryKv` whose watches can be made to fail on demand.
///
/// Every watch request is logged as `(key, since_revision)`. Queued errors
/// for a key are returned, in order, before the request reaches the store.
pub struct ScriptedKv {
    pub store: Arc<MemoryKv>,
    failures: Mutex<HashMap<String, VecDeque<KvError>>>,
    requests: Mutex<Vec<(String, u64)>>,
    active: Arc<AtomicUsize>,
}

struct ActiveWatch(Arc<AtomicUsize>);

impl Drop for ActiveWatch {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedKv {
    pub fn new(store: Arc<MemoryKv>) -> Arc<Self> {
        Arc::new(Self {
            store,
            failures: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Make the next watch on `key` fail with `error`.
    pub fn fail_next_watch(&self, key: &str, error: KvError) {
        self.failures
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn requests(&self) -> Vec<(String, u64)> {
        self.requests.lock().unwrap().clone()
    }

    /// `since_revision` of every watch request made on `key`.
    pub fn requested_revisions(&self, key: &str) -> Vec<u64> {
        self.requests()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, since)| since)
            .collect()
    }

    /// Watches currently blocked in the store.
    pub fn active_watches(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvClient for ScriptedKv {
    async fn get(&self, key: &str) -> Result<KvResponse, KvError> {
        self.store.get(key).await
    }

    async fn watch(&self, key: &str, opts: WatchOptions) -> Result<KvResponse, KvError> {
        self.requests
            .lock()
            .unwrap()
            .push((key.to_string(), opts.since_revision));

        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        let _guard = ActiveWatch(self.active.clone());
        self.store.watch(key, opts).await
    }
}

/// Watch settings with short timeouts and backoff.
pub fn fast_watch_settings() -> WatchSettings {
    WatchSettings {
        timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(Duration::from_millis(10), Duration::from_millis(50)),
    }
}

/// Poll `condition` until it holds, panicking after five seconds.
pub async fn eventually<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Run `fut` with a five second ceiling.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}
