//! Structured logging.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_filter`; `verbose` raises the crate's own
/// level to debug when `RUST_LOG` is unset.
pub fn init_logging(default_filter: &str, verbose: bool) {
    let fallback = if verbose {
        "kvenv=debug".to_string()
    } else {
        default_filter.to_string()
    };

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
