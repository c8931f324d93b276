//! Include resolution and per-cycle fetching.
//!
//! A `ResolutionContext` lives for exactly one reload cycle. It owns the
//! fetch cache, the per-key revisions and the running cluster baseline, and
//! is discarded once the cycle's Config Map has been built.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::environment::{ConfigMap, EnvironmentError, INCLUDE_KEY};
use crate::kv::{last_segment, KvClient, KvError};

type Solve<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>, EnvironmentError>> + Send + 'a>>;

pub struct ResolutionContext {
    client: Arc<dyn KvClient>,
    prefix: String,
    max_depth: usize,
    cache: HashMap<String, ConfigMap>,
    revisions: BTreeMap<String, u64>,
    baseline: Option<u64>,
}

impl ResolutionContext {
    /// Start a cycle. Relative keys resolve against the parent of `root_key`.
    pub fn new(client: Arc<dyn KvClient>, root_key: &str, max_depth: usize) -> Self {
        let prefix = match root_key.rfind('/') {
            Some(pos) => root_key[..pos].to_string(),
            None => String::new(),
        };
        Self {
            client,
            prefix,
            max_depth,
            cache: HashMap::new(),
            revisions: BTreeMap::new(),
            baseline: None,
        }
    }

    pub fn resolve_key(&self, name: &str) -> String {
        if name.starts_with('/') {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    /// Revision recorded for every key fetched so far.
    pub fn revisions(&self) -> &BTreeMap<String, u64> {
        &self.revisions
    }

    /// Minimum revision seen in this cycle.
    pub fn baseline(&self) -> Option<u64> {
        self.baseline
    }

    pub fn into_parts(self) -> (BTreeMap<String, u64>, Option<u64>) {
        (self.revisions, self.baseline)
    }

    /// Fetch a key's entries, reading the store at most once per cycle.
    pub async fn fetch(&mut self, name: &str) -> Result<&ConfigMap, EnvironmentError> {
        let key = self.resolve_key(name);
        if !self.cache.contains_key(&key) {
            let (entries, revision) = self.read(&key).await?;
            self.revisions.insert(key.clone(), revision);
            self.baseline = Some(self.baseline.map_or(revision, |b| b.min(revision)));
            tracing::trace!(key = %key, revision, entries = entries.len(), "Fetched key");
            self.cache.insert(key.clone(), entries);
        }
        Ok(&self.cache[&key])
    }

    async fn read(&self, key: &str) -> Result<(ConfigMap, u64), EnvironmentError> {
        let response = self.client.get(key).await.map_err(|e| match e {
            KvError::Field { key, message } => EnvironmentError::Evaluation { key, message },
            other => EnvironmentError::Kv(other),
        })?;
        let node = response.node;

        if let Some(message) = node.error {
            return Err(EnvironmentError::Evaluation {
                key: key.to_string(),
                message,
            });
        }

        if !node.is_dir {
            return match node.value {
                Some(value) => {
                    let mut entries = ConfigMap::new();
                    entries.insert(last_segment(key).to_string(), value);
                    Ok((entries, node.revision))
                }
                None => Err(EnvironmentError::NotDirectory {
                    key: key.to_string(),
                }),
            };
        }

        let mut entries = ConfigMap::new();
        let mut revision = None;
        for child in node.children {
            if let Some(message) = child.error {
                return Err(EnvironmentError::Evaluation {
                    key: child.key,
                    message,
                });
            }
            // Nested directories only merge through an explicit include
            if child.is_dir {
                continue;
            }
            revision = Some(revision.map_or(child.revision, |r: u64| r.max(child.revision)));
            entries.insert(
                last_segment(&child.key).to_string(),
                child.value.unwrap_or_default(),
            );
        }

        Ok((entries, revision.unwrap_or(node.revision)))
    }

    /// Merge order for `root`: includes first, `root` last, duplicates dropped.
    pub async fn resolve(&mut self, root: &str) -> Result<Vec<String>, EnvironmentError> {
        let root = self.resolve_key(root);
        let order = self.solve(root, Vec::new()).await?;

        let mut seen = HashSet::new();
        Ok(order.into_iter().filter(|key| seen.insert(key.clone())).collect())
    }

    fn solve(&mut self, key: String, path: Vec<String>) -> Solve<'_> {
        Box::pin(async move {
            if path.contains(&key) {
                let mut cycle = path;
                cycle.push(key);
                return Err(EnvironmentError::Loop { path: cycle });
            }

            let mut path = path;
            path.push(key.clone());
            if path.len() > self.max_depth {
                return Err(EnvironmentError::DepthLimit { path });
            }

            let includes = self.fetch(&key).await?.get(INCLUDE_KEY).cloned();
            let Some(includes) = includes else {
                return Ok(vec![key]);
            };

            let mut order = Vec::new();
            for name in split_includes(&includes) {
                let included = self.resolve_key(name);
                order.extend(self.solve(included, path.clone()).await?);
            }
            order.push(key);
            Ok(order)
        })
    }
}

/// Split an include directive on commas, trimming surrounding whitespace.
pub fn split_includes(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|name| !name.is_empty())
}
