// src/watch/stability.rs — Wait for a file to stop changing

use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Polls size and mtime; a file is stable once neither has changed for the
/// required time.
#[derive(Debug, Clone, Copy)]
pub struct StabilityDetector {
    poll_interval: Duration,
}

impl Default for StabilityDetector {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl StabilityDetector {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// True once size and mtime hold still for `required`. False if the
    /// file disappears or `max_wait` runs out first. Never errors.
    pub async fn is_stable(&self, path: &Path, required: Duration, max_wait: Duration) -> bool {
        let started = Instant::now();
        let mut previous: Option<(u64, Option<SystemTime>)> = None;
        let mut stable_for = Duration::ZERO;

        while started.elapsed() <= max_wait {
            let meta = match tokio::fs::metadata(path).await {
                Ok(meta) => meta,
                Err(_) => return false,
            };
            let current = (meta.len(), meta.modified().ok());

            if previous == Some(current) {
                stable_for += self.poll_interval;
                if stable_for >= required {
                    return true;
                }
            } else {
                stable_for = Duration::ZERO;
            }

            previous = Some(current);
            tokio::time::sleep(self.poll_interval).await;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unchanged_file_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.stl");
        std::fs::write(&path, b"solid part").unwrap();

        let detector = StabilityDetector::new(Duration::from_millis(10));
        assert!(
            detector
                .is_stable(&path, Duration::from_millis(30), Duration::from_secs(2))
                .await
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_unstable() {
        let dir = tempfile::tempdir().unwrap();
        let detector = StabilityDetector::new(Duration::from_millis(10));
        assert!(
            !detector
                .is_stable(
                    &dir.path().join("gone.stl"),
                    Duration::from_millis(30),
                    Duration::from_secs(1)
                )
                .await
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_wait() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.stl");
        std::fs::write(&path, b"solid").unwrap();

        let detector = StabilityDetector::new(Duration::from_millis(10));
        // Required window longer than the wait window can never be met.
        assert!(
            !detector
                .is_stable(&path, Duration::from_secs(5), Duration::from_millis(50))
                .await
        );
    }
}
