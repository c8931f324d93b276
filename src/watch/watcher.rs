//! Per-Environment change detection and reload loop.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::environment::Environment;
use crate::kv::{KvClient, KvError, WatchOptions};
use crate::watch::{WatchError, WatchSettings};

/// Watches every key of one Environment and reloads it on change.
pub struct Watcher {
    env: Arc<Environment>,
    settings: WatchSettings,
    /// Revision last seen by a watch (or a resync) per key. Outlives reloads.
    indices: Arc<DashMap<String, u64>>,
}

/// Everything one per-key watch task needs.
struct KeyWatch {
    client: Arc<dyn KvClient>,
    key: String,
    /// Revision of the key as of the last load.
    loaded: u64,
    baseline: u64,
    indices: Arc<DashMap<String, u64>>,
    settings: WatchSettings,
}

impl KeyWatch {
    fn since(&self) -> u64 {
        let local = self
            .indices
            .get(&self.key)
            .map(|recorded| *recorded)
            .unwrap_or(0)
            .max(self.loaded);
        local.max(self.baseline) + 1
    }

    /// Retry until the key changes. Returns the key.
    async fn run(self) -> String {
        let mut failures = 0u32;
        loop {
            let since = self.since();
            tracing::debug!(key = %self.key, since, "Waiting for change");

            let opts = WatchOptions {
                recursive: true,
                since_revision: since,
                timeout: self.settings.timeout,
            };
            match self.client.watch(&self.key, opts).await {
                Ok(response) => {
                    self.indices.insert(self.key.clone(), response.node.revision);
                    tracing::info!(
                        key = %self.key,
                        changed = %response.node.key,
                        revision = response.node.revision,
                        "Change detected"
                    );
                    return self.key;
                }
                Err(KvError::Timeout) => {
                    tracing::debug!(key = %self.key, "Watch timed out without change");
                }
                Err(KvError::RevisionUnavailable { requested, .. }) => {
                    metrics::counter!("kvenv_watch_resyncs_total").increment(1);
                    tracing::warn!(
                        key = %self.key,
                        requested,
                        "Watch history cleared; resynchronizing revision"
                    );
                    match self.client.get(&self.key).await {
                        Ok(response) => {
                            self.indices.insert(self.key.clone(), response.index);
                            tracing::debug!(key = %self.key, revision = response.index, "Revision resynchronized");
                        }
                        Err(e) => {
                            failures += 1;
                            self.back_off(failures, &e).await;
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    self.back_off(failures, &e).await;
                }
            }
        }
    }

    async fn back_off(&self, attempt: u32, error: &KvError) {
        let delay = self.settings.retry.delay(attempt);
        metrics::counter!("kvenv_watch_retries_total").increment(1);
        tracing::warn!(
            key = %self.key,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Watch failed; retrying"
        );
        sleep(delay).await;
    }
}

impl Watcher {
    pub fn new(env: Arc<Environment>, settings: WatchSettings) -> Self {
        Self {
            env,
            settings,
            indices: Arc::new(DashMap::new()),
        }
    }

    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Revision recorded for `key` by a watch or a resync.
    pub fn recorded_revision(&self, key: &str) -> Option<u64> {
        self.indices.get(key).map(|recorded| *recorded)
    }

    /// Block until any key of the current snapshot changes. Returns that key;
    /// watches on the other keys are cancelled before returning.
    pub async fn watch(&self) -> Result<String, WatchError> {
        let snapshot = self.env.snapshot();
        if snapshot.keys.is_empty() {
            return Err(WatchError::NoKeys {
                root: self.env.root_key().to_string(),
            });
        }

        let baseline = snapshot.baseline.unwrap_or(0);
        let mut tasks = JoinSet::new();
        for key in &snapshot.keys {
            let task = KeyWatch {
                client: self.env.client().clone(),
                key: key.clone(),
                loaded: snapshot.revisions.get(key).copied().unwrap_or(0),
                baseline,
                indices: self.indices.clone(),
                settings: self.settings,
            };
            tasks.spawn(task.run());
        }

        let first = tasks.join_next().await;
        tasks.shutdown().await;

        match first {
            Some(Ok(key)) => Ok(key),
            Some(Err(e)) => Err(WatchError::Task(e)),
            None => Err(WatchError::NoKeys {
                root: self.env.root_key().to_string(),
            }),
        }
    }

    async fn reload_once(&self) -> crate::Result<()> {
        let key = self.watch().await?;
        tracing::info!(root = %self.env.root_key(), key = %key, "Reloading environment");
        self.env.load().await?;
        metrics::counter!("kvenv_reloads_total").increment(1);
        Ok(())
    }

    /// Reload the Environment every time one of its keys changes, calling
    /// `on_reload` after each successful reload. Never returns.
    pub async fn auto_reload<F>(&self, mut on_reload: F)
    where
        F: FnMut(&Arc<Environment>) + Send,
    {
        let mut failures = 0u32;
        loop {
            match self.reload_once().await {
                Ok(()) => {
                    failures = 0;
                    on_reload(&self.env);
                }
                Err(e) => {
                    failures += 1;
                    let delay = self.settings.retry.delay(failures);
                    metrics::counter!("kvenv_reload_failures_total").increment(1);
                    tracing::error!(
                        root = %self.env.root_key(),
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Failed to reload environment; retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
