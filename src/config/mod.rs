//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CLI flags override individual fields
//!     → Settings (immutable for the life of the process)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so the tool runs without a config file
//! - Validation separates syntactic (serde) from semantic checks
//! - This is the tool's own configuration; the configuration it resolves
//!   from the store lives in `environment`

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ObservabilityConfig;
pub use schema::OutputConfig;
pub use schema::ResolveConfig;
pub use schema::Settings;
pub use schema::StoreConfig;
pub use schema::WatchConfig;
pub use validation::{validate_config, ValidationError};
