// src/watch/producer.rs — Periodic input-directory scan feeding the job queue

use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;

use super::queue::DedupQueue;
use crate::infra::config::WatchConfig;
use crate::infra::errors::ManifixError;
use crate::session::SessionStore;

pub struct WatchProducer {
    input_dir: PathBuf,
    extensions: Vec<String>,
    interval: Duration,
    queue: Arc<DedupQueue>,
    store: Arc<SessionStore>,
    /// Last mtime seen per path.
    seen: HashMap<PathBuf, SystemTime>,
}

impl WatchProducer {
    pub fn new(
        input_dir: PathBuf,
        extensions: Vec<String>,
        interval: Duration,
        queue: Arc<DedupQueue>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            input_dir,
            extensions,
            interval,
            queue,
            store,
            seen: HashMap::new(),
        }
    }

    pub fn from_config(
        config: &WatchConfig,
        queue: Arc<DedupQueue>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self::new(
            config.input_dir.clone(),
            config.extensions.clone(),
            config.poll_interval(),
            queue,
            store,
        )
    }

    /// One pass over the input directory. Returns how many jobs were queued.
    pub async fn scan_once(&mut self) -> Result<usize, ManifixError> {
        let dir = glob::Pattern::escape(&self.input_dir.to_string_lossy());
        let mut present = HashMap::new();

        for ext in &self.extensions {
            let pattern = format!("{dir}/*.{ext}");
            let entries = glob::glob(&pattern)
                .map_err(|e| ManifixError::Config(format!("bad watch pattern {pattern}: {e}")))?;

            for entry in entries {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::debug!("Skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                let meta = match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => meta,
                    _ => continue,
                };
                if let Ok(mtime) = meta.modified() {
                    present.insert(path, mtime);
                }
            }
        }

        let mut queued = 0;
        for (path, mtime) in &present {
            if self.seen.get(path) == Some(mtime) {
                continue;
            }
            self.seen.insert(path.clone(), *mtime);
            if self.queue.enqueue(path.clone(), *mtime).await {
                tracing::debug!("Queued {}", path.display());
                queued += 1;
            }
        }
        // Forget files that went away so a re-added copy is picked up.
        self.seen.retain(|path, _| present.contains_key(path));
        Ok(queued)
    }

    /// Scan on every tick until shutdown. Each tick also sweeps expired
    /// sessions. A failed scan is logged and retried on the next tick.
    ///
    /// Shutdown is honoured mid-scan too: a full queue with no workers left
    /// to drain it would otherwise block the scan forever.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            "Watching {} every {}s",
            self.input_dir.display(),
            self.interval.as_secs()
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expired = self.store.sweep_expired(Utc::now()).await;
                    if expired > 0 {
                        tracing::info!("Expired {} session(s)", expired);
                    }
                    let scanned = tokio::select! {
                        scanned = self.scan_once() => scanned,
                        _ = shutdown.recv() => break,
                    };
                    match scanned {
                        Ok(0) => {}
                        Ok(n) => tracing::info!("Queued {} file(s) for repair", n),
                        Err(e) => tracing::warn!("Watch scan failed: {}", e),
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::info!("Watch producer stopping");
    }
}
