// src/repair/single.rs — One-shot repair: inspect, repair with every flag, inspect again

use std::path::{Path, PathBuf};

use super::parser;
use super::report::QualityReport;
use super::stages::SINGLE_SHOT_FLAGS;
use crate::infra::errors::ManifixError;
use crate::infra::paths;
use crate::tools::MeshTool;

pub const PROCESSED_SUFFIX: &str = ".fixed.stl";

#[derive(Debug, Clone)]
pub struct SingleShotOutcome {
    pub success: bool,
    pub diagnostics: String,
    pub output: PathBuf,
    pub report: QualityReport,
}

/// Repair `source` into `output_dir` as `<stem>.fixed.stl` (or the next
/// free numbered name). The name is reserved before the tool runs, so
/// concurrent repairs of same-named files never share an output.
///
/// An unsuccessful repair is not an error; the report then compares the
/// source against itself. `Err` means the tool could not be run at all.
pub async fn process_one_file(
    tool: &dyn MeshTool,
    source: &Path,
    output_dir: &Path,
) -> Result<SingleShotOutcome, ManifixError> {
    let destination =
        paths::reserve_output_path(output_dir, &paths::safe_stem(source), PROCESSED_SUFFIX)
            .await?;

    let result = repair_into(tool, source, &destination).await;
    if !matches!(result, Ok(ref outcome) if outcome.success) {
        discard_placeholder(&destination).await;
    }
    result
}

async fn repair_into(
    tool: &dyn MeshTool,
    source: &Path,
    destination: &Path,
) -> Result<SingleShotOutcome, ManifixError> {
    let before_text = tool.inspect(source).await?;
    let before = parser::parse(&before_text);
    let before_metrics = parser::parse_metrics(&before_text);

    let run = tool.repair(source, destination, SINGLE_SHOT_FLAGS).await?;

    let (after, after_metrics) = if run.success {
        let after_text = tool.inspect(destination).await?;
        (parser::parse(&after_text), parser::parse_metrics(&after_text))
    } else {
        (before, before_metrics)
    };

    Ok(SingleShotOutcome {
        success: run.success,
        diagnostics: run.diagnostics,
        output: destination.to_path_buf(),
        report: QualityReport::build(&before, &after, &before_metrics, &after_metrics),
    })
}

/// Drop the reserved name when nothing was written into it.
async fn discard_placeholder(path: &Path) {
    if let Ok(meta) = tokio::fs::metadata(path).await {
        if meta.len() == 0 {
            let _ = tokio::fs::remove_file(path).await;
        }
    }
}
