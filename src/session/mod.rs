// src/session/mod.rs — Analyze/repair session records

pub mod log;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::repair::parser::{IssueSnapshot, MeshMetrics};
use crate::repair::report::QualityReport;
pub use log::SessionLog;
pub use store::{RepairStart, RunSeed, SessionStore};

pub type SessionId = String;

/// `analyzed -> repairing -> completed | failed`; a failed session may be
/// repaired again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Analyzed,
    Repairing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Analyzed => "analyzed",
            SessionStatus::Repairing => "repairing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analyze/repair lifecycle. Owned by the [`SessionStore`]; callers only
/// ever see clones.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub filename: String,
    pub status: SessionStatus,
    pub stage: String,
    pub session_dir: PathBuf,
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub file_sha256: String,
    pub issues_initial: IssueSnapshot,
    pub issues_current: IssueSnapshot,
    pub metrics_initial: MeshMetrics,
    pub metrics_current: MeshMetrics,
    pub quality_report: QualityReport,
    pub logs: SessionLog,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Session {
    /// Always the sum of the current counts.
    pub fn remaining_errors(&self) -> u64 {
        self.issues_current.total()
    }

    pub fn output_name(&self) -> Option<String> {
        self.output_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            filename: self.filename.clone(),
            status: self.status,
            remaining_errors: self.remaining_errors(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            output_name: self.output_name(),
        }
    }
}

/// What the analyze step knows when it registers a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub filename: String,
    pub session_dir: PathBuf,
    pub input_path: PathBuf,
    pub file_sha256: String,
    pub issues: IssueSnapshot,
    pub metrics: MeshMetrics,
    pub diagnostics: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub filename: String,
    pub status: SessionStatus,
    pub remaining_errors: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub output_name: Option<String>,
}

/// Per-stage state written into the session in one update.
#[derive(Debug, Clone)]
pub struct StageUpdate {
    pub issues: IssueSnapshot,
    pub metrics: MeshMetrics,
    pub report: QualityReport,
    pub log_title: String,
    pub diagnostics: String,
}

/// Final state written when a run completes.
#[derive(Debug, Clone)]
pub struct Completion {
    pub issues: IssueSnapshot,
    pub metrics: MeshMetrics,
    pub report: QualityReport,
    pub output_path: PathBuf,
    pub diagnostics: String,
}
