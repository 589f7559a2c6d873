// src/cli/repair.rs — `manifix repair`: the staged pipeline in-process

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::progress::terminal_progress;
use crate::infra::config::Config;
use crate::infra::stats::ServiceStats;
use crate::repair::{analyze_upload, RepairPipeline, RunOutcome};
use crate::session::SessionStore;
use crate::tools::admesh::AdmeshTool;
use crate::tools::MeshTool;

pub async fn run_repair(config: &Config, file: &Path, out_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let out_dir = super::output_dir_for(file, out_dir);
    tokio::fs::create_dir_all(&out_dir).await?;
    tokio::fs::create_dir_all(&config.sessions.root).await?;

    let tool: Arc<dyn MeshTool> = Arc::new(AdmeshTool::from_config(&config.tool));
    let store = Arc::new(SessionStore::new(
        1,
        Duration::from_secs(config.sessions.ttl_seconds),
        config.sessions.max_log_chars,
    ));
    let pipeline = RepairPipeline::new(store.clone(), tool.clone(), Arc::new(ServiceStats::new()))
        .with_progress(terminal_progress());

    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = tokio::fs::read(file).await?;
    let analyzed = analyze_upload(
        &store,
        tool.as_ref(),
        &config.sessions.root,
        &filename,
        &bytes,
    )
    .await?;
    eprintln!(
        "[analyze] {} issue(s), sha256 {}",
        analyzed.total_errors, analyzed.file_sha256
    );

    let outcome = pipeline.run_now(&analyzed.session_id).await?;
    let result = match outcome {
        Some(RunOutcome::Completed { report, output }) => {
            let name = output.file_name().map(PathBuf::from).unwrap_or_default();
            let dest = out_dir.join(name);
            tokio::fs::copy(&output, &dest).await?;
            println!("{report}");
            println!("Wrote {}", dest.display());
            Ok(())
        }
        Some(RunOutcome::Failed { stage }) => {
            if let Some(session) = store.get(&analyzed.session_id, false) {
                eprintln!("{}", session.logs.joined());
            }
            Err(anyhow::anyhow!("repair failed at '{stage}'"))
        }
        None => Err(anyhow::anyhow!("repair did not start")),
    };

    store.delete(&analyzed.session_id).await?;
    result
}
