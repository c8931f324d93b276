//! Watch mode: keep the rendered output current.
//!
//! # Responsibilities
//! - Run one reload loop per Environment, independently
//! - Re-compose and publish whenever any Environment finishes a reload
//! - Keep the last good output when composing or publishing fails

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::environment::Environment;
use crate::error::Result;
use crate::expand::ExpandedMap;
use crate::lifecycle::compose;
use crate::watch::{WatchSettings, Watcher};

/// Publish the composed Environments now and after every reload. Runs
/// until the process exits.
pub async fn run<F>(
    envs: Vec<Arc<Environment>>,
    settings: WatchSettings,
    expand_max_depth: usize,
    mut publish: F,
) -> Result<()>
where
    F: FnMut(&ExpandedMap) -> Result<()> + Send,
{
    let (reloaded_tx, mut reloaded_rx) = mpsc::unbounded_channel::<usize>();

    let mut reloaders = JoinSet::new();
    for (index, env) in envs.iter().enumerate() {
        let watcher = Watcher::new(env.clone(), settings);
        let reloaded_tx = reloaded_tx.clone();
        reloaders.spawn(async move {
            watcher
                .auto_reload(move |_| {
                    let _ = reloaded_tx.send(index);
                })
                .await;
        });
    }
    drop(reloaded_tx);

    tracing::info!(environments = envs.len(), "Watching for changes");
    render(&envs, expand_max_depth, &mut publish);

    while let Some(index) = reloaded_rx.recv().await {
        // Several reloads may have finished while the last render ran
        let mut pending = 1;
        while reloaded_rx.try_recv().is_ok() {
            pending += 1;
        }
        tracing::debug!(root = %envs[index].root_key(), pending, "Re-rendering after reload");
        render(&envs, expand_max_depth, &mut publish);
    }

    reloaders.shutdown().await;
    Ok(())
}

fn render<F>(envs: &[Arc<Environment>], expand_max_depth: usize, publish: &mut F)
where
    F: FnMut(&ExpandedMap) -> Result<()>,
{
    let merged = match compose(envs, expand_max_depth) {
        Ok(merged) => merged,
        Err(e) => {
            tracing::error!(error = %e, "Failed to expand environment; keeping previous output");
            return;
        }
    };

    match publish(&merged) {
        Ok(()) => {
            metrics::counter!("kvenv_renders_total").increment(1);
            tracing::info!(entries = merged.len(), "Output updated");
        }
        Err(e) => tracing::error!(error = %e, "Failed to write output; keeping previous output"),
    }
}
