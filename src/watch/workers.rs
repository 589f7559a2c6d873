// src/watch/workers.rs — Fixed pool of drop-folder workers

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::queue::{DedupQueue, WatchJob};
use super::stability::StabilityDetector;
use crate::infra::config::WatchConfig;
use crate::infra::stats::{Counter, ServiceStats};
use crate::repair::single::process_one_file;
use crate::tools::MeshTool;

/// Everything a worker needs, shared by all workers.
pub struct WorkerContext {
    pub queue: Arc<DedupQueue>,
    pub tool: Arc<dyn MeshTool>,
    pub stats: Arc<ServiceStats>,
    pub detector: StabilityDetector,
    pub output_dir: PathBuf,
    pub stable_for: Duration,
    pub max_wait: Duration,
}

impl WorkerContext {
    pub fn from_config(
        config: &WatchConfig,
        queue: Arc<DedupQueue>,
        tool: Arc<dyn MeshTool>,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self {
            queue,
            tool,
            stats,
            detector: StabilityDetector::default(),
            output_dir: config.output_dir.clone(),
            stable_for: Duration::from_secs(config.stability_check_seconds),
            max_wait: Duration::from_secs(config.stability_max_wait_seconds),
        }
    }
}

/// What happened to one dequeued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Superseded,
    Missing,
    Unstable,
    Repaired { output: PathBuf },
    RepairFailed { output: PathBuf },
    Error(String),
}

/// Claim, check, wait for stability, then repair. Tool errors come back as
/// `JobOutcome::Error`, never as a panic or early return.
pub async fn process_job(ctx: &WorkerContext, worker: usize, job: &WatchJob) -> JobOutcome {
    let name = job
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !ctx.queue.claim(job) {
        tracing::debug!("[worker #{}] {} superseded by a newer version", worker, name);
        return JobOutcome::Superseded;
    }
    if !tokio::fs::try_exists(&job.path).await.unwrap_or(false) {
        return JobOutcome::Missing;
    }
    if !ctx
        .detector
        .is_stable(&job.path, ctx.stable_for, ctx.max_wait)
        .await
    {
        tracing::info!("[worker #{}] SKIP (unstable): {}", worker, name);
        return JobOutcome::Unstable;
    }

    match process_one_file(ctx.tool.as_ref(), &job.path, &ctx.output_dir).await {
        Ok(outcome) => {
            let output_name = outcome
                .output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracing::debug!("[worker #{}] {} diagnostics:\n{}", worker, name, outcome.diagnostics);
            if outcome.success {
                ctx.stats.incr(Counter::WatchProcessed);
                tracing::info!(
                    "[worker #{}] [OK] {} -> {} ({} -> {} errors, {})",
                    worker,
                    name,
                    output_name,
                    outcome.report.errors.before,
                    outcome.report.errors.after,
                    outcome.report.confidence
                );
                JobOutcome::Repaired {
                    output: outcome.output,
                }
            } else {
                ctx.stats.incr(Counter::WatchFailed);
                tracing::warn!("[worker #{}] [FAIL] {} -> {}", worker, name, output_name);
                JobOutcome::RepairFailed {
                    output: outcome.output,
                }
            }
        }
        Err(e) => {
            ctx.stats.incr(Counter::WatchFailed);
            tracing::error!("[worker #{}] {}: {}", worker, name, e);
            JobOutcome::Error(e.to_string())
        }
    }
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` long-lived workers draining the queue until shutdown.
    pub fn spawn(
        workers: usize,
        ctx: Arc<WorkerContext>,
        shutdown: &broadcast::Sender<()>,
    ) -> Self {
        let handles = (1..=workers.max(1))
            .map(|worker| {
                let ctx = Arc::clone(&ctx);
                let mut shutdown_rx = shutdown.subscribe();
                tokio::spawn(async move {
                    tracing::info!("Watch worker #{} started ({})", worker, ctx.tool.name());
                    loop {
                        let job = tokio::select! {
                            job = ctx.queue.dequeue() => job,
                            _ = shutdown_rx.recv() => break,
                        };
                        let Some(job) = job else { break };

                        // Run the item on its own task so a panic stays contained.
                        let item_ctx = Arc::clone(&ctx);
                        let item = tokio::spawn(async move {
                            process_job(&item_ctx, worker, &job).await;
                        });
                        if let Err(e) = item.await {
                            tracing::error!("[worker #{}] item aborted: {}", worker, e);
                        }
                    }
                    tracing::info!("Watch worker #{} stopping", worker);
                })
            })
            .collect();
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
