// src/tools/mod.rs — External engines, seen only through their text output and files

pub mod admesh;
pub mod command;
pub mod convert;

use async_trait::async_trait;
use std::path::Path;

use crate::infra::errors::ManifixError;

/// Outcome of one repair invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairRun {
    /// Exit code 0 and the output file exists.
    pub success: bool,
    /// Combined stdout+stderr, kept regardless of exit code.
    pub diagnostics: String,
}

/// The mesh-repair tool contract.
///
/// A timeout is reported as an unsuccessful `RepairRun` carrying a synthetic
/// message; `Err` is reserved for the tool not being runnable at all.
#[async_trait]
pub trait MeshTool: Send + Sync {
    /// Repair `input` into `output` using `flags`.
    async fn repair(
        &self,
        input: &Path,
        output: &Path,
        flags: &[&str],
    ) -> Result<RepairRun, ManifixError>;

    /// Read-only diagnostic pass; the text is handed to the issue parser as-is.
    async fn inspect(&self, mesh: &Path) -> Result<String, ManifixError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
