//! In-process key/value store.
//!
//! Keeps a flat map of leaves plus the set of known directories, a global
//! revision counter and the most recent `HISTORY_LIMIT` events. Watches are
//! served from that history and block on a `tokio::sync::watch` channel that
//! is bumped on every write. Watching from before the retained window fails
//! with `RevisionUnavailable`, the same way etcd behaves once its event
//! history has rolled over.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::kv::{KvClient, KvError, KvNode, KvResponse, WatchOptions};

struct Leaf {
    value: String,
    revision: u64,
}

/// Events retained for watches; etcd v2 keeps the same number.
pub const HISTORY_LIMIT: usize = 1000;

struct Event {
    key: String,
    revision: u64,
}

#[derive(Default)]
struct MemoryState {
    index: u64,
    leaves: BTreeMap<String, Leaf>,
    dirs: BTreeMap<String, u64>,
    errors: BTreeMap<String, String>,
    events: VecDeque<Event>,
    /// Events at or below this revision are no longer watchable.
    compacted: u64,
}

impl MemoryState {
    fn bump(&mut self, key: &str) -> u64 {
        self.index += 1;
        self.events.push_back(Event {
            key: key.to_string(),
            revision: self.index,
        });
        if self.events.len() > HISTORY_LIMIT {
            if let Some(dropped) = self.events.pop_front() {
                self.compacted = dropped.revision;
            }
        }
        self.index
    }

    fn ensure_parents(&mut self, key: &str, revision: u64) {
        let mut end = 0;
        while let Some(pos) = key[end + 1..].find('/') {
            end += pos + 1;
            self.dirs.entry(key[..end].to_string()).or_insert(revision);
        }
    }

    fn node(&self, key: &str) -> Option<KvNode> {
        if let Some(leaf) = self.leaves.get(key) {
            return Some(KvNode {
                key: key.to_string(),
                value: Some(leaf.value.clone()),
                is_dir: false,
                children: Vec::new(),
                revision: leaf.revision,
                error: self.errors.get(key).cloned(),
            });
        }

        let revision = *self.dirs.get(key)?;
        let prefix = format!("{key}/");
        let direct = |k: &String| k.starts_with(&prefix) && !k[prefix.len()..].contains('/');

        let mut children: Vec<KvNode> = self
            .leaves
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| direct(k))
            .map(|(k, leaf)| KvNode {
                key: k.clone(),
                value: Some(leaf.value.clone()),
                is_dir: false,
                children: Vec::new(),
                revision: leaf.revision,
                error: self.errors.get(k).cloned(),
            })
            .collect();
        children.extend(
            self.dirs
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .filter(|(k, _)| direct(k))
                .map(|(k, rev)| KvNode {
                    key: k.clone(),
                    value: None,
                    is_dir: true,
                    children: Vec::new(),
                    revision: *rev,
                    error: self.errors.get(k).cloned(),
                }),
        );
        children.sort_by(|a, b| a.key.cmp(&b.key));

        Some(KvNode {
            key: key.to_string(),
            value: None,
            is_dir: true,
            children,
            revision,
            error: self.errors.get(key).cloned(),
        })
    }
}

/// A `KvClient` backed by process memory.
pub struct MemoryKv {
    state: Mutex<MemoryState>,
    changes: watch::Sender<u64>,
    reads: AtomicUsize,
}

impl MemoryKv {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Mutex::new(MemoryState::default()),
            changes,
            reads: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, revision: u64) -> u64 {
        self.changes.send_replace(revision);
        revision
    }

    /// Write a leaf, creating missing parent directories. Returns the new revision.
    pub fn set(&self, key: &str, value: impl Into<String>) -> u64 {
        let key = normalize(key);
        let revision = {
            let mut state = self.lock();
            let revision = state.bump(&key);
            state.ensure_parents(&key, revision);
            state.dirs.remove(&key);
            state.leaves.insert(
                key,
                Leaf {
                    value: value.into(),
                    revision,
                },
            );
            revision
        };
        self.publish(revision)
    }

    /// Create an empty directory.
    pub fn mkdir(&self, key: &str) -> u64 {
        let key = normalize(key);
        let revision = {
            let mut state = self.lock();
            let revision = state.bump(&key);
            state.ensure_parents(&key, revision);
            state.dirs.insert(key, revision);
            revision
        };
        self.publish(revision)
    }

    /// Remove a leaf or a whole directory subtree.
    pub fn delete(&self, key: &str) -> u64 {
        let key = normalize(key);
        let prefix = format!("{key}/");
        let revision = {
            let mut state = self.lock();
            state.leaves.retain(|k, _| k != &key && !k.starts_with(&prefix));
            state.dirs.retain(|k, _| k != &key && !k.starts_with(&prefix));
            state.bump(&key)
        };
        self.publish(revision)
    }

    /// Flag a field-level error on a node; reads of it will carry the message.
    pub fn flag_error(&self, key: &str, message: impl Into<String>) {
        self.lock().errors.insert(normalize(key), message.into());
    }

    /// Drop the event history up to the current revision.
    pub fn compact(&self) {
        let mut state = self.lock();
        state.compacted = state.index;
        state.events.clear();
    }

    /// Current store-wide revision.
    pub fn index(&self) -> u64 {
        self.lock().index
    }

    /// Number of `get` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvClient for MemoryKv {
    async fn get(&self, key: &str) -> Result<KvResponse, KvError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let key = normalize(key);
        let state = self.lock();
        let node = state.node(&key).ok_or(KvError::KeyNotFound(key))?;
        Ok(KvResponse {
            node,
            index: state.index,
        })
    }

    async fn watch(&self, key: &str, opts: WatchOptions) -> Result<KvResponse, KvError> {
        let key = normalize(key);
        let prefix = format!("{key}/");
        let deadline = Instant::now() + opts.timeout;
        let mut changes = self.changes.subscribe();

        loop {
            {
                let state = self.lock();
                if opts.since_revision <= state.compacted {
                    return Err(KvError::RevisionUnavailable {
                        key,
                        requested: opts.since_revision,
                    });
                }
                let hit = state.events.iter().find(|event| {
                    event.revision >= opts.since_revision
                        && (event.key == key || (opts.recursive && event.key.starts_with(&prefix)))
                });
                if let Some(event) = hit {
                    let node = KvNode {
                        key: event.key.clone(),
                        value: state.leaves.get(&event.key).map(|leaf| leaf.value.clone()),
                        is_dir: state.dirs.contains_key(&event.key),
                        children: Vec::new(),
                        revision: event.revision,
                        error: None,
                    };
                    return Ok(KvResponse {
                        node,
                        index: state.index,
                    });
                }
            }

            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return Err(KvError::Transport("memory store closed".into())),
                Err(_) => return Err(KvError::Timeout),
            }
        }
    }
}

fn normalize(key: &str) -> String {
    let trimmed = key.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
