//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared KV client from settings
//! - Open (initially load) one Environment per root key, in order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Environments load one after another so errors name the first bad root

use std::sync::Arc;

use crate::config::Settings;
use crate::environment::Environment;
use crate::error::Result;
use crate::kv::{EtcdClient, KvClient};

pub fn connect(settings: &Settings) -> Result<Arc<dyn KvClient>> {
    let client = EtcdClient::new(&settings.store)?;
    tracing::info!(endpoint = %settings.store.endpoint, "Store client ready");
    Ok(Arc::new(client))
}

pub async fn open_environments(
    client: Arc<dyn KvClient>,
    root_keys: &[String],
    settings: &Settings,
) -> Result<Vec<Arc<Environment>>> {
    let mut envs = Vec::with_capacity(root_keys.len());
    for key in root_keys {
        let env = Environment::open(client.clone(), key, settings.resolve.include_max_depth).await?;
        tracing::info!(
            root = %env.root_key(),
            keys = env.snapshot().keys.len(),
            "Environment loaded"
        );
        envs.push(env);
    }
    Ok(envs)
}
