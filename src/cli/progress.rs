// src/cli/progress.rs — Terminal progress renderer for staged repair runs

use crate::repair::PipelineEvent;

/// One line of progress for an event.
pub fn render(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::RunStarted { session_id, stages } => {
            format!("[repair] session {session_id}, {stages} stage(s)")
        }
        PipelineEvent::StageStarted { index, total, name } => {
            format!("[{}/{}] {}...", index + 1, total, name)
        }
        PipelineEvent::StageCompleted {
            index,
            name: _,
            issues,
        } => format!(
            "[{}]   ok, {} issue(s) left (edges={} holes={} normals={} shells={})",
            index + 1,
            issues.total(),
            issues.non_manifold_edges,
            issues.holes_open_boundaries,
            issues.flipped_normals,
            issues.disconnected_shells,
        ),
        PipelineEvent::StageFailed { name, .. } => format!("[failed] {name}"),
        PipelineEvent::Completed { report, output } => format!(
            "[done] {} -> {} errors, confidence {} ({})",
            report.errors.before,
            report.errors.after,
            report.confidence,
            output.display(),
        ),
    }
}

/// Build a progress callback that writes to stderr.
///
/// Progress goes to stderr so stdout stays clean for the report.
/// Returns a closure suitable for `RepairPipeline::with_progress()`.
pub fn terminal_progress() -> impl Fn(PipelineEvent) + Send + Sync + 'static {
    move |event| eprintln!("{}", render(&event))
}
