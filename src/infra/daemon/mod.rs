// src/infra/daemon/mod.rs — Long-running service: sweeper, watch ingestion and HTTP API

pub mod sweeper;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::api;
use crate::infra::config::Config;
use crate::infra::paths;
use crate::infra::stats::ServiceStats;
use crate::repair::RepairPipeline;
use crate::session::SessionStore;
use crate::tools::admesh::AdmeshTool;
use crate::tools::convert::{CommandConverter, MeshConverter};
use crate::tools::MeshTool;
use crate::watch::{DedupQueue, WatchProducer, WorkerContext, WorkerPool};

/// Which parts of the service to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// Sweeper, watch ingestion (when enabled) and the HTTP API.
    Serve,
    /// Sweeper and watch ingestion only.
    WatchOnly,
}

/// Every shared, explicitly constructed piece of service state.
pub struct Service {
    pub config: Config,
    pub store: Arc<SessionStore>,
    pub tool: Arc<dyn MeshTool>,
    pub converter: Arc<dyn MeshConverter>,
    pub pipeline: Arc<RepairPipeline>,
    pub queue: Arc<DedupQueue>,
    pub stats: Arc<ServiceStats>,
}

impl Service {
    /// Wire the service with the command-line tools named in `config`.
    pub fn new(config: Config) -> Self {
        let tool: Arc<dyn MeshTool> = Arc::new(AdmeshTool::from_config(&config.tool));
        let converter: Arc<dyn MeshConverter> =
            Arc::new(CommandConverter::from_config(&config.converter));
        Self::with_tools(config, tool, converter)
    }

    pub fn with_tools(
        config: Config,
        tool: Arc<dyn MeshTool>,
        converter: Arc<dyn MeshConverter>,
    ) -> Self {
        let store = Arc::new(SessionStore::new(
            config.sessions.max_sessions,
            Duration::from_secs(config.sessions.ttl_seconds),
            config.sessions.max_log_chars,
        ));
        let stats = Arc::new(ServiceStats::new());
        let pipeline = Arc::new(RepairPipeline::new(
            store.clone(),
            tool.clone(),
            stats.clone(),
        ));
        let queue = Arc::new(DedupQueue::new(config.watch.queue_capacity));
        Self {
            config,
            store,
            tool,
            converter,
            pipeline,
            queue,
            stats,
        }
    }
}

/// Run until Ctrl+C.
pub async fn run_service(service: Service, mode: ServiceMode) -> anyhow::Result<()> {
    let config = service.config.clone();
    paths::ensure_dirs(&[
        config.sessions.root.as_path(),
        config.watch.input_dir.as_path(),
        config.watch.output_dir.as_path(),
    ])
    .await?;

    let service = Arc::new(service);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let sweeper = tokio::spawn(sweeper::run_sweeper(
        service.store.clone(),
        config.sessions.root.clone(),
        Duration::from_secs(config.sessions.cleanup_seconds),
        shutdown_tx.subscribe(),
    ));

    let mut workers = None;
    let mut producer = None;
    if config.watch.enabled {
        let ctx = Arc::new(WorkerContext::from_config(
            &config.watch,
            service.queue.clone(),
            service.tool.clone(),
            service.stats.clone(),
        ));
        workers = Some(WorkerPool::spawn(config.watch.workers, ctx, &shutdown_tx));

        let watch = WatchProducer::from_config(
            &config.watch,
            service.queue.clone(),
            service.store.clone(),
        );
        producer = Some(tokio::spawn(watch.run(shutdown_tx.subscribe())));
        tracing::info!(
            "Watch mode on: {} -> {} ({} worker(s))",
            config.watch.input_dir.display(),
            config.watch.output_dir.display(),
            config.watch.workers
        );
    }

    let mut server = None;
    if mode == ServiceMode::Serve && config.api.enabled {
        let state = service.clone();
        let api_config = config.api.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        server = Some(tokio::spawn(async move {
            if let Err(e) = api::start_server(&api_config, state, shutdown_rx).await {
                tracing::error!("API server failed: {}", e);
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());

    if let Some(pool) = workers {
        pool.join().await;
    }
    for handle in [Some(sweeper), producer, server].into_iter().flatten() {
        let _ = handle.await;
    }
    tracing::info!("Service stopped.");
    Ok(())
}
