// src/api/types.rs

use serde::Serialize;

use crate::infra::stats::StatsSnapshot;
use crate::repair::parser::{IssueSnapshot, MeshMetrics};
use crate::repair::report::QualityReport;
use crate::session::{Session, SessionStatus, SessionSummary};

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub watch_mode: bool,
    pub watch_workers: usize,
    pub queue_depth: usize,
    pub poll_seconds: u64,
    pub session_ttl_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub status: &'static str,
    pub active_sessions: usize,
    pub max_sessions: usize,
    pub session_ttl_seconds: u64,
    pub admesh_timeout_seconds: u64,
    pub stats: StatsSnapshot,
}

/// Response to `POST /repair/{id}`.
#[derive(Debug, Serialize)]
pub struct RepairStarted {
    pub status: &'static str,
}

/// Poll view of one session.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session_id: String,
    pub status: SessionStatus,
    pub stage: String,
    pub issues_current: IssueSnapshot,
    pub metrics_current: MeshMetrics,
    pub remaining_errors: u64,
    pub quality_report: QualityReport,
    pub logs: Vec<String>,
    pub output_name: Option<String>,
}

impl From<&Session> for StatusResponse {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.id.clone(),
            status: s.status,
            stage: s.stage.clone(),
            issues_current: s.issues_current,
            metrics_current: s.metrics_current,
            remaining_errors: s.remaining_errors(),
            quality_report: s.quality_report,
            logs: s.logs.entries().to_vec(),
            output_name: s.output_name(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub status: &'static str,
    pub session_id: String,
}
