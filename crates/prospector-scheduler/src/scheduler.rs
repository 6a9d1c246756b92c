//! Interval scheduler for the two acquisition layers.
//!
//! Each attached task ticks on its own independent interval. A tick that
//! arrives while the previous run of the same task is still in flight is
//! skipped and logged, never queued. Shutdown is graceful: ticking stops
//! immediately, the in-flight run is handed the cancellation token so it
//! can wind down at its next boundary, and the scheduler waits for it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prospector_core::{RunLayer, RunSummary};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A job the scheduler can drive.
///
/// Implementations fold their own failures into the returned summary; the
/// scheduler logs outcomes but never aborts on a failed run.
#[async_trait]
pub trait ScheduledTask: Send + Sync + 'static {
    /// Which layer this task executes.
    fn layer(&self) -> RunLayer;

    /// Execute one run. The token signals shutdown; the task should stop
    /// at its next clean boundary when it fires.
    async fn run(&self, shutdown: CancellationToken) -> RunSummary;
}

/// One task with its own interval.
struct Entry {
    task: Arc<dyn ScheduledTask>,
    period: Duration,
}

/// Drives attached tasks on independent intervals.
pub struct Scheduler {
    entries: Vec<Entry>,
    run_on_start: bool,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler tied to a shutdown token.
    #[must_use]
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            entries: Vec::new(),
            run_on_start: true,
            shutdown,
        }
    }

    /// Attach a task with its interval.
    #[must_use]
    pub fn with_task(mut self, task: Arc<dyn ScheduledTask>, period: Duration) -> Self {
        self.entries.push(Entry { task, period });
        self
    }

    /// Whether each task also runs immediately at startup (default true).
    #[must_use]
    pub fn run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    /// Run until the shutdown token fires, then wait for in-flight runs.
    pub async fn run(self) {
        tracing::info!(tasks = self.entries.len(), "Scheduler started");

        let mut drivers = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            let shutdown = self.shutdown.clone();
            let run_on_start = self.run_on_start;
            drivers.push(tokio::spawn(async move {
                drive(entry, shutdown, run_on_start).await;
            }));
        }

        for driver in drivers {
            if let Err(e) = driver.await {
                tracing::error!(error = %e, "Scheduler driver failed");
            }
        }

        tracing::info!("Scheduler stopped");
    }
}

/// Tick one task until shutdown.
async fn drive(entry: Entry, shutdown: CancellationToken, run_on_start: bool) {
    let layer = entry.task.layer();
    let mut interval = tokio::time::interval(entry.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if !run_on_start {
        // The first tick completes immediately; swallow it
        interval.tick().await;
    }

    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if in_flight.as_ref().is_some_and(|h| !h.is_finished()) {
                    tracing::warn!(layer = %layer, "Previous run still in progress, skipping this tick");
                    continue;
                }

                let task = Arc::clone(&entry.task);
                let token = shutdown.clone();
                in_flight = Some(tokio::spawn(async move {
                    tracing::info!(layer = %task.layer(), "Scheduled run starting");
                    let summary = task.run(token).await;
                    tracing::info!(
                        layer = %task.layer(),
                        items = summary.items,
                        errors = summary.errors,
                        status = %summary.status,
                        "Scheduled run finished"
                    );
                }));
            }
            () = shutdown.cancelled() => {
                break;
            }
        }
    }

    if let Some(handle) = in_flight {
        if !handle.is_finished() {
            tracing::info!(layer = %layer, "Waiting for in-flight run to finish");
        }
        if let Err(e) = handle.await {
            tracing::error!(layer = %layer, error = %e, "In-flight run failed to join");
        }
    }

    tracing::info!(layer = %layer, "Scheduler loop stopped");
}
