//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → KV client → open one Environment per root key
//!
//! One-shot (oneshot.rs):
//!     merge raw Config Maps → expand once → render → write → exit
//!
//! Watch (daemon.rs):
//!     compose → render → write
//!     one auto_reload task per Environment
//!         → "environment i reloaded" → render task → compose → render → write
//! ```
//!
//! # Design Decisions
//! - One-shot merges first and expands once, so references may reach into
//!   other roots and later roots override values used by earlier ones
//! - Watch mode expands each Environment on its own, then merges in caller
//!   order; later roots still win on name collision
//! - Startup fails fast; once watching, nothing is fatal

pub mod daemon;
pub mod oneshot;
pub mod startup;

use std::sync::Arc;

use crate::environment::{ConfigMap, Environment};
use crate::expand::{expand, ExpandError, ExpandedMap};

/// Expand each Environment's current Config Map and merge the results in
/// order. Later Environments overwrite earlier ones on name collision.
pub fn compose(envs: &[Arc<Environment>], max_depth: usize) -> Result<ExpandedMap, ExpandError> {
    let mut merged = ExpandedMap::new();
    for env in envs {
        merged.extend(expand(&env.snapshot().env, max_depth)?);
    }
    Ok(merged)
}

/// Merge the Environments' unexpanded Config Maps in order, later ones
/// overwriting earlier ones, and expand the result once.
pub fn merge_and_expand(envs: &[Arc<Environment>], max_depth: usize) -> Result<ExpandedMap, ExpandError> {
    let mut merged = ConfigMap::new();
    for env in envs {
        merged.extend(env.snapshot().env.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    expand(&merged, max_depth)
}
