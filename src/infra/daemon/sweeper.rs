// src/infra/daemon/sweeper.rs

use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;

use crate::session::SessionStore;

/// Delete directories under `root` that no live session owns and that
/// haven't been modified within `ttl`.
pub async fn cleanup_orphan_dirs(
    root: &Path,
    owned: &HashSet<PathBuf>,
    ttl: Duration,
    now: SystemTime,
) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if owned.contains(&path) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_dir() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age <= ttl {
            continue;
        }
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

/// Periodic TTL sweep plus orphan cleanup, until shutdown.
pub async fn run_sweeper(
    store: Arc<SessionStore>,
    root: PathBuf,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    // First tick fires immediately; nothing can be stale yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let expired = store.sweep_expired(Utc::now()).await;
                let owned = store.owned_dirs();
                match cleanup_orphan_dirs(&root, &owned, store.ttl(), SystemTime::now()).await {
                    Ok(orphans) if expired + orphans > 0 => {
                        tracing::info!("Cleanup: {} expired session(s), {} orphan dir(s)", expired, orphans);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Cleanup of {} failed: {}", root.display(), e),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_orphans_removed_only_when_old_and_unowned() {
        let root = tempfile::tempdir().unwrap();
        let owned_dir = root.path().join("owned");
        let orphan = root.path().join("orphan");
        std::fs::create_dir_all(&owned_dir).unwrap();
        std::fs::create_dir_all(&orphan).unwrap();
        std::fs::write(root.path().join("stray.txt"), b"x").unwrap();

        let owned: HashSet<PathBuf> = [owned_dir.clone()].into_iter().collect();
        let ttl = Duration::from_secs(60);

        // Nothing is old yet.
        let n = cleanup_orphan_dirs(root.path(), &owned, ttl, SystemTime::now())
            .await
            .unwrap();
        assert_eq!(n, 0);

        let later = SystemTime::now() + Duration::from_secs(3600);
        let n = cleanup_orphan_dirs(root.path(), &owned, ttl, later).await.unwrap();
        assert_eq!(n, 1);
        assert!(owned_dir.exists());
        assert!(!orphan.exists());
        assert!(root.path().join("stray.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_root_is_fine() {
        let root = tempfile::tempdir().unwrap();
        let n = cleanup_orphan_dirs(
            &root.path().join("nope"),
            &HashSet::new(),
            Duration::from_secs(60),
            SystemTime::now(),
        )
        .await
        .unwrap();
        assert_eq!(n, 0);
    }
}
