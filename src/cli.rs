//! Command-line interface.
//!
//! Flags override the matching fields of the configuration file, which in
//! turn overrides the built-in defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{load_config, validate_config, ConfigError, Settings};
use crate::render::Format;

#[derive(Debug, Parser)]
#[command(name = "kvenv", version)]
#[command(about = "Render environment files from a key/value store tree", long_about = None)]
pub struct Cli {
    /// Root keys to resolve; later keys override earlier ones
    #[arg(value_name = "KEY")]
    pub keys: Vec<String>,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write to PATH instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Permission bits of the output file, in octal
    #[arg(short, long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<u32>,

    /// Emit `docker run --env-file` format instead of dotenv
    #[arg(long)]
    pub docker: bool,

    /// Store URL; any path is ignored
    #[arg(long, value_name = "URL")]
    pub etcd: Option<String>,

    /// CA certificate used to verify the store
    #[arg(long, value_name = "PATH")]
    pub etcd_ca_file: Option<PathBuf>,

    /// Client certificate for the store
    #[arg(long, value_name = "PATH")]
    pub etcd_cert_file: Option<PathBuf>,

    /// Private key of the client certificate
    #[arg(long, value_name = "PATH")]
    pub etcd_key_file: Option<PathBuf>,

    /// Keep running and rewrite the output whenever a key changes
    #[arg(short, long)]
    pub watch: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build the effective settings: file (or defaults), then flags, then validation.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let mut settings = match &self.config {
            Some(path) => load_config(path)?,
            None => Settings::default(),
        };
        self.apply(&mut settings);
        validate_config(&settings).map_err(ConfigError::Validation)?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut Settings) {
        if let Some(endpoint) = &self.etcd {
            settings.store.endpoint = endpoint.clone();
        }
        if let Some(path) = &self.etcd_ca_file {
            settings.store.ca_file = Some(path.clone());
        }
        if let Some(path) = &self.etcd_cert_file {
            settings.store.cert_file = Some(path.clone());
        }
        if let Some(path) = &self.etcd_key_file {
            settings.store.key_file = Some(path.clone());
        }
        if let Some(path) = &self.output {
            settings.output.path = Some(path.clone());
        }
        if let Some(mode) = self.mode {
            settings.output.mode = mode;
        }
        if self.docker {
            settings.output.format = Format::Docker;
        }
    }
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8).map_err(|e| format!("'{}' is not an octal mode: {}", s, e))
}
