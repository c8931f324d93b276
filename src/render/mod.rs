//! Rendering of Expanded Maps as environment files.
//!
//! # Data Flow
//! ```text
//! Expanded Map
//!     → Format::render (dotenv.rs or docker.rs, one NAME=VALUE line per entry)
//!     → output.rs (stdout or a file with fixed permission bits)
//! ```
//!
//! # Design Decisions
//! - Renderers never expand; they receive an already Expanded Map
//! - Lines are emitted in key order so output is stable between renders

pub mod docker;
pub mod dotenv;
pub mod output;

use serde::{Deserialize, Serialize};

use crate::expand::ExpandedMap;

pub use output::Output;

/// Line format of the rendered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `.env` files as read by dotenv libraries; values are quoted when needed.
    #[default]
    Dotenv,
    /// `docker run --env-file` format; values are written verbatim.
    Docker,
}

impl Format {
    pub fn render(self, env: &ExpandedMap) -> String {
        let line = match self {
            Format::Dotenv => dotenv::line,
            Format::Docker => docker::line,
        };
        env.iter().map(|(name, value)| line(name, value) + "\n").collect()
    }
}
