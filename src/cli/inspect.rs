// src/cli/inspect.rs — `manifix analyze` and `manifix fix`

use std::path::{Path, PathBuf};

use crate::infra::config::Config;
use crate::repair::parser;
use crate::repair::process_one_file;
use crate::tools::admesh::AdmeshTool;
use crate::tools::MeshTool;

pub async fn run_analyze(config: &Config, file: &Path, json: bool) -> anyhow::Result<()> {
    let tool = AdmeshTool::from_config(&config.tool);
    let text = tool.inspect(file).await?;
    let issues = parser::parse(&text);
    let metrics = parser::parse_metrics(&text);

    if json {
        let out = serde_json::json!({
            "file": file.display().to_string(),
            "issues": issues,
            "metrics": metrics,
            "total_errors": issues.total(),
            "pattern_set": parser::PATTERN_SET_VERSION,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", file.display());
    for (category, count) in issues.iter() {
        println!("  {:<28} {}", category.label(), count);
    }
    println!("  {:<28} {}", "Total", issues.total());
    if let Some(t) = metrics.triangle_count {
        println!("  {:<28} {}", "Triangles", t);
    }
    if let Some(p) = metrics.part_count {
        println!("  {:<28} {}", "Parts", p);
    }
    Ok(())
}

pub async fn run_fix(config: &Config, file: &Path, out_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let out_dir = super::output_dir_for(file, out_dir);
    tokio::fs::create_dir_all(&out_dir).await?;

    let tool = AdmeshTool::from_config(&config.tool);
    let outcome = process_one_file(&tool, file, &out_dir).await?;
    tracing::debug!("admesh output:\n{}", outcome.diagnostics);

    println!("{}", outcome.report);
    if outcome.success {
        println!("Wrote {}", outcome.output.display());
        Ok(())
    } else {
        eprintln!("{}", outcome.diagnostics);
        anyhow::bail!("repair failed for {}", file.display())
    }
}
