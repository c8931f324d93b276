//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failure inside a watch attempt or a reload cycle:
//!     → caller bumps its consecutive-failure counter
//!     → backoff.rs (RetryPolicy::delay(attempt))
//!     → sleep, then retry the same step
//! ```
//!
//! # Design Decisions
//! - One policy type for every retry site, so watch and reload back off alike
//! - Benign watch timeouts never reach the policy; they retry immediately
//! - Delays are capped and jittered

pub mod backoff;

pub use backoff::RetryPolicy;
