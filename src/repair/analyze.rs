// src/repair/analyze.rs — First diagnosis of an upload; creates the session

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

use super::parser::{self, IssueSnapshot, MeshMetrics};
use super::report::QualityReport;
use crate::infra::errors::ManifixError;
use crate::infra::paths;
use crate::session::{NewSession, SessionId, SessionStore};
use crate::tools::MeshTool;

/// Only STL goes through the repair tool.
pub fn is_repairable_file(filename: &str) -> bool {
    paths::file_extension(filename) == "stl"
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeOutcome {
    pub session_id: SessionId,
    pub issues: IssueSnapshot,
    pub metrics: MeshMetrics,
    pub quality_report: QualityReport,
    pub total_errors: u64,
    pub file_sha256: String,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Save an upload into its own working directory under `root`, inspect it
/// and register a session in `analyzed`.
pub async fn analyze_upload(
    store: &SessionStore,
    tool: &dyn MeshTool,
    root: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<AnalyzeOutcome, ManifixError> {
    if filename.is_empty() || !is_repairable_file(filename) {
        return Err(ManifixError::InputRejected(
            "Only .stl files are supported".into(),
        ));
    }

    let safe_name = match paths::sanitize_filename(filename) {
        name if name.is_empty() => "model.stl".to_string(),
        name => name,
    };
    let session_dir = root.join(Uuid::new_v4().simple().to_string());
    tokio::fs::create_dir_all(&session_dir).await?;

    let input_path = session_dir.join(&safe_name);
    tokio::fs::write(&input_path, bytes).await?;
    let file_sha256 = sha256_hex(bytes);

    let text = match tool.inspect(&input_path).await {
        Ok(text) => text,
        Err(e) => {
            let _ = tokio::fs::remove_dir_all(&session_dir).await;
            return Err(e);
        }
    };
    let issues = parser::parse(&text);
    let metrics = parser::parse_metrics(&text);
    tracing::info!(
        "Analyzed {} ({} issue(s), sha256 {})",
        safe_name,
        issues.total(),
        &file_sha256[..12]
    );

    let session_id = store
        .create(NewSession {
            filename: safe_name,
            session_dir,
            input_path,
            file_sha256: file_sha256.clone(),
            issues,
            metrics,
            diagnostics: text,
        })
        .await;

    Ok(AnalyzeOutcome {
        session_id,
        issues,
        metrics,
        quality_report: QualityReport::build(&issues, &issues, &metrics, &metrics),
        total_errors: issues.total(),
        file_sha256,
    })
}
