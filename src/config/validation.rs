//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the store endpoint is an http(s) URL
//! - Validate value ranges (depths > 0, timeouts > 0, backoff base <= cap)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Settings → Result<(), Vec<ValidationError>>

use std::fmt;

use url::Url;

use crate::config::schema::Settings;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field, message: String| errors.push(ValidationError { field, message });

    match Url::parse(&settings.store.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => fail("store.endpoint", format!("unsupported scheme '{}'", url.scheme())),
        Err(e) => fail("store.endpoint", format!("invalid URL: {}", e)),
    }

    if settings.store.cert_file.is_some() != settings.store.key_file.is_some() {
        fail(
            "store.cert_file",
            "client certificate and key must be given together".to_string(),
        );
    }
    if settings.resolve.include_max_depth == 0 {
        fail("resolve.include_max_depth", "must be at least 1".to_string());
    }
    if settings.resolve.expand_max_depth == 0 {
        fail("resolve.expand_max_depth", "must be at least 1".to_string());
    }
    if settings.watch.timeout_secs == 0 {
        fail("watch.timeout_secs", "must be greater than 0".to_string());
    }
    if settings.watch.backoff_base_ms == 0 {
        fail("watch.backoff_base_ms", "must be greater than 0".to_string());
    }
    if settings.watch.backoff_base_ms > settings.watch.backoff_max_ms {
        fail(
            "watch.backoff_max_ms",
            format!(
                "cap {}ms is below base delay {}ms",
                settings.watch.backoff_max_ms, settings.watch.backoff_base_ms
            ),
        );
    }
    if settings.output.mode > 0o7777 {
        fail("output.mode", format!("{:o} is not a permission mode", settings.output.mode));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
