//! kvenv
//!
//! Resolves one or more root keys of an etcd tree into environment
//! variables and writes them as a dotenv or docker env file.
//!
//! # Architecture Overview
//!
//! ```text
//!   KEY...  ──▶ environment ──▶ expand ──▶ compose ──▶ render ──▶ stdout / file
//!                 │    ▲
//!                 ▼    │ reload
//!                 kv ◀─┴── watch (one task per key, --watch only)
//!
//!   Cross-cutting: config, observability, resilience, lifecycle
//! ```

use std::process::ExitCode;

use clap::Parser;

use kvenv::cli::Cli;
use kvenv::config::Settings;
use kvenv::expand::ExpandedMap;
use kvenv::lifecycle::{daemon, oneshot, startup};
use kvenv::observability::{logging::init_logging, metrics::init_metrics};
use kvenv::render::Output;
use kvenv::watch::WatchSettings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.keys.is_empty() {
        eprintln!("kvenv: no KEY specified; see --help");
        return ExitCode::from(1);
    }

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("kvenv: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings.observability.log_filter, cli.verbose);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %settings.store.endpoint,
        keys = ?cli.keys,
        watch = cli.watch,
        "kvenv starting"
    );

    match run(&cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("kvenv: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, settings: Settings) -> kvenv::Result<()> {
    if let Some(address) = &settings.observability.metrics_address {
        init_metrics(address)?;
    }

    let client = startup::connect(&settings)?;
    if !cli.watch {
        oneshot::run(client, &cli.keys, &settings).await?;
        return Ok(());
    }

    let envs = startup::open_environments(client, &cli.keys, &settings).await?;
    let output = Output::from_config(&settings.output);
    let format = settings.output.format;
    let publish = move |env: &ExpandedMap| -> kvenv::Result<()> {
        output.write(&format.render(env))?;
        Ok(())
    };

    tokio::select! {
        result = daemon::run(
            envs,
            WatchSettings::from_config(&settings.watch),
            settings.resolve.expand_max_depth,
            publish,
        ) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
