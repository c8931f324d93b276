//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::environment::EnvironmentError;
use crate::expand::ExpandError;
use crate::kv::KvError;
use crate::watch::WatchError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Kv(#[from] KvError),

    #[error("{0}")]
    Environment(#[from] EnvironmentError),

    #[error("expansion: {0}")]
    Expand(#[from] ExpandError),

    #[error("watch: {0}")]
    Watch(#[from] WatchError),

    #[error("output: {0}")]
    Io(#[from] std::io::Error),

    #[error("metrics exporter: {0}")]
    Metrics(String),
}

pub type Result<T> = std::result::Result<T, Error>;
