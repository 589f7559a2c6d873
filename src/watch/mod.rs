// src/watch/mod.rs — Drop-folder ingestion
//
// WatchProducer -> DedupQueue -> WorkerPool -> single-shot repair -> output dir

pub mod producer;
pub mod queue;
pub mod stability;
pub mod workers;

pub use producer::WatchProducer;
pub use queue::{DedupQueue, WatchJob};
pub use stability::StabilityDetector;
pub use workers::{process_job, JobOutcome, WorkerContext, WorkerPool};
