// src/watch/queue.rs — Bounded job queue that collapses repeat enqueues per file version

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use tokio::sync::mpsc;

/// A file observed at one modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchJob {
    pub path: PathBuf,
    pub version: SystemTime,
}

pub struct DedupQueue {
    tx: mpsc::Sender<WatchJob>,
    rx: tokio::sync::Mutex<mpsc::Receiver<WatchJob>>,
    /// Latest version queued per path.
    queued: Mutex<HashMap<PathBuf, SystemTime>>,
}

impl DedupQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            queued: Mutex::new(HashMap::new()),
        }
    }

    /// Queue `path` at `version` unless that exact version is already
    /// pending. Waits for room when the queue is full.
    pub async fn enqueue(&self, path: PathBuf, version: SystemTime) -> bool {
        {
            let mut queued = self.queued.lock().unwrap_or_else(PoisonError::into_inner);
            if queued.get(&path) == Some(&version) {
                return false;
            }
            queued.insert(path.clone(), version);
        }
        self.tx.send(WatchJob { path, version }).await.is_ok()
    }

    /// Next job in FIFO order; waits until one is available.
    pub async fn dequeue(&self) -> Option<WatchJob> {
        self.rx.lock().await.recv().await
    }

    /// Take ownership of a dequeued job. False when a newer version of the
    /// same file has been queued since, in which case the job is stale.
    pub fn claim(&self, job: &WatchJob) -> bool {
        let mut queued = self.queued.lock().unwrap_or_else(PoisonError::into_inner);
        if queued.get(&job.path) == Some(&job.version) {
            queued.remove(&job.path);
            true
        } else {
            false
        }
    }

    /// Jobs currently waiting.
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[tokio::test]
    async fn test_same_version_enqueued_once() {
        let q = DedupQueue::new(8);
        assert!(q.enqueue("a.stl".into(), at(1)).await);
        assert!(!q.enqueue("a.stl".into(), at(1)).await);
        assert_eq!(q.depth(), 1);
    }

    #[tokio::test]
    async fn test_newer_version_supersedes() {
        let q = DedupQueue::new(8);
        q.enqueue("a.stl".into(), at(1)).await;
        q.enqueue("a.stl".into(), at(2)).await;
        assert_eq!(q.depth(), 2);

        let first = q.dequeue().await.unwrap();
        assert_eq!(first.version, at(1));
        assert!(!q.claim(&first));

        let second = q.dequeue().await.unwrap();
        assert!(q.claim(&second));
        assert_eq!(q.depth(), 0);
    }

    #[tokio::test]
    async fn test_claimed_version_can_be_queued_again() {
        let q = DedupQueue::new(8);
        q.enqueue("a.stl".into(), at(1)).await;
        let job = q.dequeue().await.unwrap();
        assert!(q.claim(&job));
        // Same mtime seen again after processing, e.g. the file was re-copied.
        assert!(q.enqueue("a.stl".into(), at(1)).await);
    }
}
