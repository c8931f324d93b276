//! kvenv: environment files rendered from a key/value store tree.

pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod expand;
pub mod kv;
pub mod lifecycle;
pub mod observability;
pub mod render;
pub mod resilience;
pub mod watch;

pub use config::Settings;
pub use environment::{ConfigMap, Environment};
pub use error::{Error, Result};
pub use expand::ExpandedMap;
pub use kv::{KvClient, MemoryKv};
pub use render::Format;
pub use watch::Watcher;
