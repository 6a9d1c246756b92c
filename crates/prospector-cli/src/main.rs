//! Prospector command-line entry point.

mod cli;
mod tasks;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use prospector_contract::{AuthTokenProvider, ContractFetcher};
use prospector_core::{AppConfig, RunSummary};
use prospector_db::Database;
use prospector_directory::{load_sources, DirectorySource, ScrapeProgress, ScrapeSession};
use prospector_scheduler::{ScheduledTask, Scheduler};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::tasks::{ContractTask, DirectoryTask};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let mut config =
                AppConfig::load_from(path).context("failed to load configuration")?;
            config.apply_env();
            config
        }
        None => AppConfig::load_with_env().context("failed to load configuration")?,
    };

    let db = open_database(cli.database.as_deref()).await?;

    // Ctrl-C requests a graceful stop; work in flight winds down at its
    // next clean boundary
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            signal_token.cancel();
        }
    });

    let result = match cli.command {
        Command::Directory { sources } => {
            run_directory_once(&config, &db, &sources, &shutdown).await
        }
        Command::Contract { contract } => {
            run_contract_once(&config, &db, &contract, &shutdown).await
        }
        Command::Both { sources, contract } => {
            let directory = run_directory_once(&config, &db, &sources, &shutdown).await;
            let contract = run_contract_once(&config, &db, &contract, &shutdown).await;
            directory.and(contract)
        }
        Command::Schedule { sources, contract } => {
            run_schedule(&config, &db, &sources, &contract, shutdown.clone()).await
        }
    };

    db.close().await;
    result
}

async fn open_database(override_path: Option<&Path>) -> anyhow::Result<Database> {
    let path: PathBuf = match override_path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::data_dir()
            .context("no platform data directory")?
            .join("prospector.db"),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let db = Database::open(&path)
        .await
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    db.run_migrations().await.context("migrations failed")?;
    tracing::info!(path = %path.display(), "Database ready");
    Ok(db)
}

fn load_directory_sources(dir: &Path) -> anyhow::Result<Vec<DirectorySource>> {
    let sources = load_sources(dir)
        .with_context(|| format!("failed to read source definitions from {}", dir.display()))?;
    anyhow::ensure!(
        !sources.is_empty(),
        "no usable source definitions in {}",
        dir.display()
    );
    Ok(sources)
}

fn build_contract_fetcher(
    config: &AppConfig,
    contract_path: &Path,
) -> anyhow::Result<ContractFetcher> {
    let contract = prospector_contract::load_contract(contract_path)
        .with_context(|| format!("failed to load contract {}", contract_path.display()))?;
    let auth = AuthTokenProvider::from_env().context("missing API credential")?;
    ContractFetcher::new(contract, auth, config).context("failed to build contract fetcher")
}

async fn run_directory_once(
    config: &AppConfig,
    db: &Database,
    sources_dir: &Path,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    let sources = load_directory_sources(sources_dir)?;
    let session = ScrapeSession::spawn(config.clone(), db.pool().clone(), sources, shutdown);

    let mut progress = session.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot: ScrapeProgress = progress.borrow().clone();
            if let Some(source) = &snapshot.source {
                tracing::info!(
                    source,
                    page = snapshot.page,
                    entities = snapshot.entities,
                    emails_found = snapshot.emails_found,
                    "Scrape progress"
                );
            }
        }
    });

    let result = session.join().await;
    reporter.abort();
    let summary = result.context("directory run failed")?;

    report("directory", &summary);
    anyhow::ensure!(summary.is_success(), "directory run did not complete");
    Ok(())
}

async fn run_contract_once(
    config: &AppConfig,
    db: &Database,
    contract_path: &Path,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    let fetcher = build_contract_fetcher(config, contract_path)?;

    let summary = fetcher
        .run(db.pool(), shutdown)
        .await
        .context("contract run failed")?;

    report("contract", &summary);
    anyhow::ensure!(summary.is_success(), "contract run did not complete");
    Ok(())
}

async fn run_schedule(
    config: &AppConfig,
    db: &Database,
    sources_dir: &Path,
    contract_path: &Path,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mut scheduler = Scheduler::new(shutdown);
    let mut attached = 0;

    if config.endpoints.directory_enabled {
        let sources = load_directory_sources(sources_dir)?;
        let task = DirectoryTask::new(config.clone(), db.pool().clone(), sources);
        scheduler = scheduler.with_task(
            Arc::new(task) as Arc<dyn ScheduledTask>,
            Duration::from_secs(config.intervals.directory_hours * 3600),
        );
        attached += 1;
    } else {
        tracing::info!("Directory layer disabled by configuration");
    }

    if config.endpoints.contract_enabled {
        let fetcher = build_contract_fetcher(config, contract_path)?;
        let task = ContractTask::new(fetcher, db.pool().clone());
        scheduler = scheduler.with_task(
            Arc::new(task) as Arc<dyn ScheduledTask>,
            Duration::from_secs(config.intervals.contract_hours * 3600),
        );
        attached += 1;
    } else {
        tracing::info!("Contract layer disabled by configuration");
    }

    anyhow::ensure!(attached > 0, "both layers are disabled, nothing to schedule");

    scheduler.run().await;
    Ok(())
}

fn report(layer: &str, summary: &RunSummary) {
    println!(
        "{layer} run: {} items, {} errors, {}",
        summary.items, summary.errors, summary.status
    );
}
