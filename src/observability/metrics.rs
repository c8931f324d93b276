//! Metrics exposition.
//!
//! # Metrics
//! - `kvenv_reloads_total` (counter): successful reload cycles
//! - `kvenv_reload_failures_total` (counter): failed reload cycles
//! - `kvenv_watch_retries_total` (counter): watch attempts that backed off
//! - `kvenv_watch_resyncs_total` (counter): resyncs after cleared history
//! - `kvenv_renders_total` (counter): outputs written in watch mode

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{Error, Result};

/// Serve Prometheus metrics on `address`. Must run inside a Tokio runtime.
pub fn init_metrics(address: &str) -> Result<()> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|e| Error::Metrics(format!("invalid address '{}': {}", address, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| Error::Metrics(e.to_string()))?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}
