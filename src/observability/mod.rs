//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resolver, watcher and daemon produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (reload/watch counters)
//!
//! Consumers:
//!     → Operator terminal or log collector
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - stdout is reserved for rendered output, so logs go to stderr
//! - Metrics are recorded through the `metrics` facade and cost nothing
//!   when no exporter is installed

pub mod logging;
pub mod metrics;
