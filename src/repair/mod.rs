// src/repair/mod.rs — Diagnosis, staged repair and quality reporting

pub mod analyze;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod single;
pub mod stages;

pub use analyze::{analyze_upload, AnalyzeOutcome};
pub use pipeline::{PipelineEvent, RepairPipeline, RunOutcome};
pub use single::{process_one_file, SingleShotOutcome};
