//! Bounded worker pool over conversations.
//!
//! Each task's conversation runs as one spawned unit of work, strictly
//! sequential internally. The counting semaphore is the only resource
//! shared across conversations; admission control is the whole locking
//! discipline. A watch channel carries external shutdown to every driver.

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};

use crate::artifact::ArtifactStore;
use crate::domain::report::TaskReport;
use crate::domain::task::Task;
use crate::error::Result;
use crate::oracle::Oracle;
use crate::recorder::ResultRecorder;
use crate::runner::TaskDriver;
use crate::sandbox::SandboxBackend;

/// Resolve once the shutdown flag flips to true. Pends forever if the
/// sender goes away without signalling, so a dropped channel never reads as
/// a cancellation.
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if *rx.borrow() {
        return;
    }
    while rx.changed().await.is_ok() {
        if *rx.borrow() {
            return;
        }
    }
    std::future::pending::<()>().await
}

/// Aggregate counters over one batch run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub solved: usize,
    pub total_revisions: u64,
}

impl RunSummary {
    pub fn from_reports(reports: &[TaskReport]) -> Self {
        Self {
            total: reports.len(),
            solved: reports.iter().filter(|r| r.success).count(),
            total_revisions: reports.iter().map(|r| r.revisions as u64).sum(),
        }
    }

    pub fn mean_revisions(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.total_revisions as f64 / self.total as f64
        }
    }
}

pub struct WorkerPool<O, B>
where
    O: Oracle + 'static,
    B: SandboxBackend + 'static,
{
    driver: Arc<TaskDriver<O, B>>,
    recorder: Arc<ResultRecorder>,
    semaphore: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
}

impl<O, B> WorkerPool<O, B>
where
    O: Oracle + 'static,
    B: SandboxBackend + 'static,
{
    pub fn new(
        driver: Arc<TaskDriver<O, B>>,
        recorder: Arc<ResultRecorder>,
        max_concurrent: usize,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            driver,
            recorder,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            shutdown_tx,
        }
    }

    /// Signal every in-flight conversation to abort. Drivers still close
    /// their sandbox sessions and record a cancelled report.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Process all tasks, bounded by the pool's concurrency limit, and
    /// record every report as it terminates.
    pub async fn run(&self, tasks: Vec<Task>) -> Result<RunSummary> {
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let driver = self.driver.clone();
            let recorder = self.recorder.clone();
            let semaphore = self.semaphore.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                // The semaphore is never closed, so acquisition only waits
                let _permit = semaphore.acquire_owned().await.ok();
                let report = driver.solve(&task, shutdown_rx).await;
                if let Err(e) = recorder.record(&report) {
                    tracing::error!(task_id = %report.task_id, error = %e, "Failed to record report");
                }
                report
            }));
        }

        let reports: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::error!(error = %e, "Conversation worker panicked");
                    None
                }
            })
            .collect();

        let summary = RunSummary::from_reports(&reports);
        tracing::info!(
            total = summary.total,
            solved = summary.solved,
            mean_revisions = summary.mean_revisions(),
            "Batch complete"
        );
        Ok(summary)
    }
}

/// Convenience constructor wiring driver, recorder and pool from config.
pub fn build_pool<O, B>(
    oracle: Arc<O>,
    backend: Arc<B>,
    store: Arc<dyn ArtifactStore>,
    config: &crate::config::Config,
) -> Result<WorkerPool<O, B>>
where
    O: Oracle + 'static,
    B: SandboxBackend + 'static,
{
    let driver = Arc::new(TaskDriver::new(oracle, backend, store, config));
    let recorder = Arc::new(ResultRecorder::new(&config.storage.report_dir)?);
    Ok(WorkerPool::new(driver, recorder, config.pool.max_concurrent))
}
