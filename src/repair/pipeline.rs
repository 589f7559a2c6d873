// src/repair/pipeline.rs — Staged repair runs against a stored session

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::parser::{self, IssueCategory, IssueSnapshot, MeshMetrics};
use super::report::QualityReport;
use super::stages::{Stage, DEFAULT_STAGES};
use crate::infra::errors::ManifixError;
use crate::infra::paths;
use crate::infra::stats::{Counter, ServiceStats};
use crate::session::{Completion, RepairStart, RunSeed, SessionId, SessionStore, StageUpdate};
use crate::tools::{MeshTool, RepairRun};

const FINALIZE_STAGE: &str = "Finalize";

/// Progress events emitted during a run, for terminal rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RunStarted {
        session_id: SessionId,
        stages: usize,
    },
    StageStarted {
        index: usize,
        total: usize,
        name: &'static str,
    },
    StageCompleted {
        index: usize,
        name: &'static str,
        issues: IssueSnapshot,
    },
    StageFailed {
        name: String,
        diagnostics: String,
    },
    Completed {
        report: QualityReport,
        output: PathBuf,
    },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed { report: QualityReport, output: PathBuf },
    Failed { stage: String },
}

/// New current value per category: `min(previous, parsed)`, then every
/// category in `resolves` forced to 0.
pub fn merge_stage(
    previous: &IssueSnapshot,
    parsed: &IssueSnapshot,
    resolves: &[IssueCategory],
) -> IssueSnapshot {
    let mut merged = IssueSnapshot::default();
    for category in IssueCategory::ALL {
        let value = if resolves.contains(&category) {
            0
        } else {
            previous.get(category).min(parsed.get(category))
        };
        merged.set(category, value);
    }
    merged
}

/// Fresh figures where the inspection had them, otherwise the last known.
fn merge_metrics(previous: &MeshMetrics, fresh: &MeshMetrics) -> MeshMetrics {
    MeshMetrics {
        triangle_count: fresh.triangle_count.or(previous.triangle_count),
        part_count: fresh.part_count.or(previous.part_count),
    }
}

pub struct RepairPipeline {
    store: Arc<SessionStore>,
    tool: Arc<dyn MeshTool>,
    stages: &'static [Stage],
    stats: Arc<ServiceStats>,
    on_progress: Option<Box<dyn Fn(PipelineEvent) + Send + Sync>>,
}

impl RepairPipeline {
    pub fn new(
        store: Arc<SessionStore>,
        tool: Arc<dyn MeshTool>,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self {
            store,
            tool,
            stages: DEFAULT_STAGES,
            stats,
            on_progress: None,
        }
    }

    /// Set a progress callback for real-time feedback.
    pub fn with_progress(mut self, cb: impl Fn(PipelineEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Start a background run unless one is already running or finished.
    ///
    /// The status check and the transition to `repairing` happen under the
    /// store lock, so concurrent callers start at most one run.
    pub fn start(self: &Arc<Self>, id: &str) -> Result<RepairStart, ManifixError> {
        let start = self.store.begin_repair(id)?;
        if let RepairStart::Started(ref seed) = start {
            let this = Arc::clone(self);
            let id = id.to_string();
            let seed = seed.clone();
            tokio::spawn(async move {
                this.run(&id, seed).await;
            });
        }
        Ok(start)
    }

    /// Run to the end on the current task. `None` when the session was
    /// already repairing or completed.
    pub async fn run_now(&self, id: &str) -> Result<Option<RunOutcome>, ManifixError> {
        match self.store.begin_repair(id)? {
            RepairStart::Started(seed) => Ok(Some(self.run(id, seed).await)),
            _ => Ok(None),
        }
    }

    async fn run(&self, id: &str, seed: RunSeed) -> RunOutcome {
        tracing::info!(
            "Repair run {} started ({} stages via {})",
            id,
            self.stages.len(),
            self.tool.name()
        );
        self.emit(PipelineEvent::RunStarted {
            session_id: id.to_string(),
            stages: self.stages.len(),
        });

        let mut issues = seed.issues;
        let mut metrics = seed.metrics;
        let mut current = seed.input_path.clone();
        let total = self.stages.len();

        for (index, stage) in self.stages.iter().enumerate() {
            self.store.set_stage(id, stage.name);
            self.emit(PipelineEvent::StageStarted {
                index,
                total,
                name: stage.name,
            });
            tracing::info!("[{}] stage {}/{}: {}", id, index + 1, total, stage.name);

            let staged = seed.session_dir.join(format!("stage_{}.stl", index + 1));
            let run = self.repair_step(&current, &staged, stage.flags).await;
            tracing::debug!("[{}] {} output:\n{}", id, stage.name, run.diagnostics);

            if !run.success || !staged.exists() {
                return self.fail(id, stage.name, &run.diagnostics);
            }
            current = staged;

            let inspection = match self.tool.inspect(&current).await {
                Ok(text) => text,
                Err(e) => return self.fail(id, stage.name, &e.to_string()),
            };
            issues = merge_stage(&issues, &parser::parse(&inspection), stage.resolves);
            metrics = merge_metrics(&metrics, &parser::parse_metrics(&inspection));

            self.store.record_stage(
                id,
                StageUpdate {
                    issues,
                    metrics,
                    report: QualityReport::build(
                        &seed.issues_initial,
                        &issues,
                        &seed.metrics_initial,
                        &metrics,
                    ),
                    log_title: stage.name.to_string(),
                    diagnostics: run.diagnostics,
                },
            );
            self.emit(PipelineEvent::StageCompleted {
                index,
                name: stage.name,
                issues,
            });
        }

        self.store.set_stage(id, FINALIZE_STAGE);
        let output = paths::unique_output_path(
            &seed.session_dir,
            &paths::safe_stem(&seed.input_path),
            ".fixed.stl",
        );
        if let Err(e) = tokio::fs::copy(&current, &output).await {
            return self.fail(id, FINALIZE_STAGE, &format!("Could not write output: {e}"));
        }

        let inspection = match self.tool.inspect(&output).await {
            Ok(text) => text,
            Err(e) => return self.fail(id, FINALIZE_STAGE, &e.to_string()),
        };
        issues = merge_stage(&issues, &parser::parse(&inspection), &[]);
        metrics = merge_metrics(&metrics, &parser::parse_metrics(&inspection));
        let report = QualityReport::build(
            &seed.issues_initial,
            &issues,
            &seed.metrics_initial,
            &metrics,
        );

        let recorded = self.store.complete_run(
            id,
            Completion {
                issues,
                metrics,
                report,
                output_path: output.clone(),
                diagnostics: inspection,
            },
        );
        if !recorded {
            tracing::debug!("Session {} went away before its run completed", id);
        }
        self.stats.incr(Counter::RepairSuccess);
        tracing::info!(
            "Repair run {} completed: {} -> {} errors ({})",
            id,
            report.errors.before,
            report.errors.after,
            report.confidence
        );
        self.emit(PipelineEvent::Completed {
            report,
            output: output.clone(),
        });
        RunOutcome::Completed { report, output }
    }

    /// A tool that can't be started counts as an unsuccessful stage.
    async fn repair_step(&self, input: &Path, output: &Path, flags: &[&str]) -> RepairRun {
        match self.tool.repair(input, output, flags).await {
            Ok(run) => run,
            Err(e) => RepairRun {
                success: false,
                diagnostics: e.to_string(),
            },
        }
    }

    fn fail(&self, id: &str, stage: &str, diagnostics: &str) -> RunOutcome {
        tracing::warn!("Repair run {} failed at '{}'", id, stage);
        self.store.fail_run(id, stage, diagnostics);
        self.stats.incr(Counter::RepairFailed);
        self.emit(PipelineEvent::StageFailed {
            name: stage.to_string(),
            diagnostics: diagnostics.to_string(),
        });
        RunOutcome::Failed {
            stage: stage.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(values: [u32; 4]) -> IssueSnapshot {
        IssueSnapshot {
            non_manifold_edges: values[0],
            holes_open_boundaries: values[1],
            flipped_normals: values[2],
            disconnected_shells: values[3],
        }
    }

    #[test]
    fn test_merge_never_increases() {
        let merged = merge_stage(&snap([3, 2, 0, 1]), &snap([9, 1, 4, 1]), &[]);
        assert_eq!(merged, snap([3, 1, 0, 1]));
    }

    #[test]
    fn test_merge_forces_resolved_to_zero() {
        let merged = merge_stage(
            &snap([3, 2, 0, 1]),
            &snap([3, 2, 0, 5]),
            &[IssueCategory::DisconnectedShells],
        );
        assert_eq!(merged, snap([3, 2, 0, 0]));
    }

    #[test]
    fn test_merge_metrics_keeps_last_known() {
        let prev = MeshMetrics {
            triangle_count: Some(100),
            part_count: Some(2),
        };
        let fresh = MeshMetrics {
            triangle_count: Some(96),
            part_count: None,
        };
        let merged = merge_metrics(&prev, &fresh);
        assert_eq!(merged.triangle_count, Some(96));
        assert_eq!(merged.part_count, Some(2));
    }
}
