// src/session/store.rs — Bounded, TTL-governed session registry
//
// One mutex guards both the id -> record map and the insertion order. The
// lock is never held across filesystem work: evicted or expired records are
// taken out under the lock and their directories removed afterwards.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use super::{
    Completion, NewSession, Session, SessionId, SessionLog, SessionStatus, SessionSummary,
    StageUpdate,
};
use crate::infra::errors::ManifixError;
use crate::repair::parser::{IssueSnapshot, MeshMetrics};
use crate::repair::report::QualityReport;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    order: VecDeque<SessionId>,
}

/// What a pipeline run starts from.
#[derive(Debug, Clone)]
pub struct RunSeed {
    pub session_dir: PathBuf,
    pub input_path: PathBuf,
    pub issues_initial: IssueSnapshot,
    pub metrics_initial: MeshMetrics,
    pub issues: IssueSnapshot,
    pub metrics: MeshMetrics,
}

/// Result of asking to start a repair run.
#[derive(Debug, Clone)]
pub enum RepairStart {
    Started(RunSeed),
    AlreadyRepairing,
    AlreadyCompleted,
}

impl RepairStart {
    pub fn status_message(&self) -> &'static str {
        match self {
            RepairStart::Started(_) => "started",
            RepairStart::AlreadyRepairing => "already repairing",
            RepairStart::AlreadyCompleted => "already completed",
        }
    }
}

pub struct SessionStore {
    inner: Mutex<Inner>,
    max_sessions: usize,
    ttl: Duration,
    log_budget: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize, ttl: Duration, log_budget: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_sessions: max_sessions.max(1),
            ttl,
            log_budget,
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a freshly analyzed upload and return its id.
    ///
    /// Evicts the oldest sessions (and their directories) while over capacity.
    pub async fn create(&self, new: NewSession) -> SessionId {
        let now = Utc::now();
        let id = Uuid::new_v4().simple().to_string();

        let mut logs = SessionLog::new(self.log_budget);
        logs.push_section("Analyze", &new.diagnostics);

        let session = Session {
            id: id.clone(),
            filename: new.filename,
            status: SessionStatus::Analyzed,
            stage: "analyzed".into(),
            session_dir: new.session_dir,
            input_path: new.input_path,
            output_path: None,
            file_sha256: new.file_sha256,
            issues_initial: new.issues,
            issues_current: new.issues,
            metrics_initial: new.metrics,
            metrics_current: new.metrics,
            quality_report: QualityReport::build(
                &new.issues,
                &new.issues,
                &new.metrics,
                &new.metrics,
            ),
            logs,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
        };

        let evicted = {
            let mut inner = self.lock();
            inner.sessions.insert(id.clone(), session);
            inner.order.push_back(id.clone());

            let mut evicted = Vec::new();
            while inner.order.len() > self.max_sessions {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                if let Some(old) = inner.sessions.remove(&oldest) {
                    evicted.push(old);
                }
            }
            evicted
        };

        for old in evicted {
            tracing::info!("Evicting session {} (capacity {})", old.id, self.max_sessions);
            remove_session_dir(&old.session_dir).await;
        }
        id
    }

    /// Copy of a session. `touch` refreshes the last-accessed time only.
    pub fn get(&self, id: &str, touch: bool) -> Option<Session> {
        let mut inner = self.lock();
        let session = inner.sessions.get_mut(id)?;
        if touch {
            session.last_accessed_at = Utc::now();
        }
        Some(session.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a session and its working directory.
    pub async fn delete(&self, id: &str) -> Result<(), ManifixError> {
        let removed = {
            let mut inner = self.lock();
            let removed = inner.sessions.remove(id);
            if removed.is_some() {
                inner.order.retain(|s| s != id);
            }
            removed
        };
        match removed {
            Some(session) => {
                remove_session_dir(&session.session_dir).await;
                Ok(())
            }
            None => Err(ManifixError::not_found(id)),
        }
    }

    /// Drop every session whose last update is older than the TTL.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let expired: Vec<Session> = {
            let mut inner = self.lock();
            let ids: Vec<SessionId> = inner
                .sessions
                .values()
                .filter(|s| now.signed_duration_since(s.updated_at) > ttl)
                .map(|s| s.id.clone())
                .collect();
            let mut taken = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(s) = inner.sessions.remove(id) {
                    taken.push(s);
                }
            }
            inner.order.retain(|id| !ids.contains(id));
            taken
        };

        for session in &expired {
            tracing::debug!("Session {} expired", session.id);
            remove_session_dir(&session.session_dir).await;
        }
        expired.len()
    }

    /// Summaries of live sessions, most recently updated first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        self.sweep_expired(Utc::now()).await;
        let mut out: Vec<SessionSummary> =
            self.lock().sessions.values().map(Session::summary).collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out
    }

    /// Working directories of every live session.
    pub fn owned_dirs(&self) -> HashSet<PathBuf> {
        self.lock()
            .sessions
            .values()
            .map(|s| s.session_dir.clone())
            .collect()
    }

    // ─── Run mutators ───────────────────────────────────────────

    /// Move a session into `repairing` if it isn't already running or done.
    pub fn begin_repair(&self, id: &str) -> Result<RepairStart, ManifixError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| ManifixError::not_found(id))?;

        match session.status {
            SessionStatus::Repairing => return Ok(RepairStart::AlreadyRepairing),
            SessionStatus::Completed => return Ok(RepairStart::AlreadyCompleted),
            SessionStatus::Analyzed | SessionStatus::Failed => {}
        }

        session.status = SessionStatus::Repairing;
        session.stage = "starting".into();
        session.output_path = None;
        session.logs.clear();
        session.updated_at = Utc::now();

        Ok(RepairStart::Started(RunSeed {
            session_dir: session.session_dir.clone(),
            input_path: session.input_path.clone(),
            issues_initial: session.issues_initial,
            metrics_initial: session.metrics_initial,
            issues: session.issues_current,
            metrics: session.metrics_current,
        }))
    }

    /// Apply `f` to a session that is mid-run. Returns false when the session
    /// is gone or no longer repairing.
    fn update_running(&self, id: &str, f: impl FnOnce(&mut Session)) -> bool {
        let mut inner = self.lock();
        match inner.sessions.get_mut(id) {
            Some(session) if session.status == SessionStatus::Repairing => {
                f(session);
                session.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub fn set_stage(&self, id: &str, stage: &str) -> bool {
        self.update_running(id, |s| s.stage = stage.to_string())
    }

    /// Persist one stage's merged state in a single update.
    pub fn record_stage(&self, id: &str, update: StageUpdate) -> bool {
        self.update_running(id, |s| {
            s.issues_current = update.issues;
            s.metrics_current = update.metrics;
            s.quality_report = update.report;
            s.logs.push_section(&update.log_title, &update.diagnostics);
        })
    }

    /// Terminal failure; `stage` names the stage that failed.
    pub fn fail_run(&self, id: &str, stage: &str, diagnostics: &str) -> bool {
        self.update_running(id, |s| {
            s.status = SessionStatus::Failed;
            s.stage = stage.to_string();
            s.logs.push_section(stage, diagnostics);
        })
    }

    pub fn complete_run(&self, id: &str, done: Completion) -> bool {
        self.update_running(id, |s| {
            s.status = SessionStatus::Completed;
            s.stage = "completed".into();
            s.issues_current = done.issues;
            s.metrics_current = done.metrics;
            s.quality_report = done.report;
            s.output_path = Some(done.output_path);
            s.logs.push_section("Final Analyze", &done.diagnostics);
        })
    }

    #[cfg(test)]
    fn backdate(&self, id: &str, by: chrono::Duration) {
        if let Some(s) = self.lock().sessions.get_mut(id) {
            s.updated_at -= by;
        }
    }
}

async fn remove_session_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", dir.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session(dir: PathBuf) -> NewSession {
        NewSession {
            filename: "part.stl".into(),
            input_path: dir.join("part.stl"),
            session_dir: dir,
            file_sha256: "00".into(),
            issues: IssueSnapshot {
                non_manifold_edges: 3,
                holes_open_boundaries: 2,
                flipped_normals: 0,
                disconnected_shells: 1,
            },
            metrics: MeshMetrics::default(),
            diagnostics: "Number of parts : 2".into(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_analyzed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(4, Duration::from_secs(60), 1000);
        let id = store.create(new_session(tmp.path().join("a"))).await;

        let s = store.get(&id, false).unwrap();
        assert_eq!(s.status, SessionStatus::Analyzed);
        assert_eq!(s.remaining_errors(), 6);
        assert_eq!(s.issues_initial, s.issues_current);
        assert_eq!(s.logs.entries().len(), 1);
        assert!(s.output_path.is_none());
    }

    #[tokio::test]
    async fn test_touch_does_not_count_as_update() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(4, Duration::from_secs(60), 1000);
        let id = store.create(new_session(tmp.path().join("a"))).await;
        let before = store.get(&id, false).unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let after = store.get(&id, true).unwrap();
        assert_eq!(after.updated_at, before.updated_at);
        assert!(after.last_accessed_at > before.last_accessed_at);
    }

    #[tokio::test]
    async fn test_begin_repair_rejects_reentry() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(4, Duration::from_secs(60), 1000);
        let id = store.create(new_session(tmp.path().join("a"))).await;

        assert!(matches!(store.begin_repair(&id).unwrap(), RepairStart::Started(_)));
        assert!(matches!(
            store.begin_repair(&id).unwrap(),
            RepairStart::AlreadyRepairing
        ));

        assert!(store.fail_run(&id, "Fill holes/open boundaries", "exit 1"));
        let failed = store.get(&id, false).unwrap();
        assert_eq!(failed.status, SessionStatus::Failed);
        assert_eq!(failed.stage, "Fill holes/open boundaries");

        // A failed run may be retried.
        assert!(matches!(store.begin_repair(&id).unwrap(), RepairStart::Started(_)));
    }

    #[tokio::test]
    async fn test_mutators_ignored_outside_a_run() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(4, Duration::from_secs(60), 1000);
        let id = store.create(new_session(tmp.path().join("a"))).await;
        assert!(!store.set_stage(&id, "Fix normal directions"));
        assert_eq!(store.get(&id, false).unwrap().stage, "analyzed");
    }

    #[tokio::test]
    async fn test_begin_repair_unknown_id() {
        let store = SessionStore::new(4, Duration::from_secs(60), 1000);
        let err = store.begin_repair("nope").unwrap_err();
        assert!(matches!(err, ManifixError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_removes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("part.stl"), b"solid").unwrap();

        let store = SessionStore::new(4, Duration::from_secs(60), 1000);
        let id = store.create(new_session(dir.clone())).await;
        store.delete(&id).await.unwrap();

        assert!(store.get(&id, false).is_none());
        assert!(!dir.exists());
        assert!(store.delete(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_uses_updated_at() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(4, Duration::from_secs(60), 1000);
        let stale = store.create(new_session(tmp.path().join("a"))).await;
        let fresh = store.create(new_session(tmp.path().join("b"))).await;
        store.backdate(&stale, chrono::Duration::seconds(120));

        assert_eq!(store.sweep_expired(Utc::now()).await, 1);
        assert!(store.get(&stale, false).is_none());
        assert!(store.get(&fresh, false).is_some());
        assert_eq!(store.len(), 1);
    }
}
