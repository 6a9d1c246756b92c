//! Scheduler adapters wrapping the two layers.
//!
//! Scheduled runs fold their failures into the returned summary so a bad
//! run never takes the scheduler down; the failure is already in the run
//! audit log.

use async_trait::async_trait;
use prospector_contract::ContractFetcher;
use prospector_core::{AppConfig, RunLayer, RunStatus, RunSummary};
use prospector_directory::{run_directory_layer, DirectorySource, ScrapeProgress};
use prospector_scheduler::ScheduledTask;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

fn failed_summary() -> RunSummary {
    RunSummary {
        items: 0,
        errors: 1,
        status: RunStatus::Failed,
    }
}

/// Runs the directory layer as a scheduled task.
pub struct DirectoryTask {
    config: AppConfig,
    pool: SqlitePool,
    sources: Vec<DirectorySource>,
}

impl DirectoryTask {
    pub fn new(config: AppConfig, pool: SqlitePool, sources: Vec<DirectorySource>) -> Self {
        Self {
            config,
            pool,
            sources,
        }
    }
}

#[async_trait]
impl ScheduledTask for DirectoryTask {
    fn layer(&self) -> RunLayer {
        RunLayer::Directory
    }

    async fn run(&self, shutdown: CancellationToken) -> RunSummary {
        let (tx, _rx) = watch::channel(ScrapeProgress::default());
        match run_directory_layer(&self.config, &self.pool, &self.sources, &shutdown, &tx).await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Directory run failed");
                failed_summary()
            }
        }
    }
}

/// Replays the API contract as a scheduled task.
pub struct ContractTask {
    fetcher: ContractFetcher,
    pool: SqlitePool,
}

impl ContractTask {
    pub fn new(fetcher: ContractFetcher, pool: SqlitePool) -> Self {
        Self { fetcher, pool }
    }
}

#[async_trait]
impl ScheduledTask for ContractTask {
    fn layer(&self) -> RunLayer {
        RunLayer::Contract
    }

    async fn run(&self, shutdown: CancellationToken) -> RunSummary {
        match self.fetcher.run(&self.pool, &shutdown).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Contract run failed");
                failed_summary()
            }
        }
    }
}
