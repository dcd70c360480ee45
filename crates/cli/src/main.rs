mod cli;
mod commands;

use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use clap::Parser;
use gamevault_core::{
    config::{self, AppConfig},
    Collection, FileStore, StoreAdapter, TokioScheduler,
};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(Some(path))?,
        None => {
            config::ensure_default_config()?;
            AppConfig::load()?
        }
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    init_logging(&config.data_dir)?;
    info!(data_dir = %config.data_dir.display(), "opening collection");

    let scheduler = Arc::new(TokioScheduler::current()?);
    let store = StoreAdapter::new(
        Arc::new(FileStore::new(config.data_dir.clone())),
        config.storage.clone(),
    );
    let mut collection = Collection::open(store, scheduler, &config.engine())
        .context("failed to open collection")?;

    let outcome = commands::run(&mut collection, cli.command);

    if !collection.flush() {
        let cause = collection
            .autosave()
            .last_error()
            .unwrap_or_else(|| "unknown error".to_string());
        warn!("collection not saved: {cause}");
        anyhow::bail!("collection not saved: {cause}");
    }
    outcome
}

fn init_logging(data_dir: &Path) -> Result<()> {
    let log_dir = data_dir.join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("gamevault.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
