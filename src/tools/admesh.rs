// src/tools/admesh.rs — ADMesh as the repair/inspection engine

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use super::command::run_captured;
use super::{MeshTool, RepairRun};
use crate::infra::config::ToolConfig;
use crate::infra::errors::ManifixError;

pub struct AdmeshTool {
    program: String,
    timeout: Duration,
}

impl AdmeshTool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(
            config.admesh_path.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

/// `admesh --write-binary-stl <output> <flags...> <input>`
pub fn repair_args(input: &Path, output: &Path, flags: &[&str]) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(flags.len() + 3);
    args.push("--write-binary-stl".into());
    args.push(output.as_os_str().to_owned());
    args.extend(flags.iter().map(OsString::from));
    args.push(input.as_os_str().to_owned());
    args
}

#[async_trait]
impl MeshTool for AdmeshTool {
    async fn repair(
        &self,
        input: &Path,
        output: &Path,
        flags: &[&str],
    ) -> Result<RepairRun, ManifixError> {
        tracing::debug!("admesh repair {:?} -> {:?} {:?}", input, output, flags);
        match run_captured(&self.program, repair_args(input, output, flags), self.timeout).await {
            Ok(run) => {
                // An empty file at `output` may be a reserved name, not a result.
                let written = tokio::fs::metadata(output)
                    .await
                    .map(|meta| meta.len() > 0)
                    .unwrap_or(false);
                Ok(RepairRun {
                    success: run.exit_ok && written,
                    diagnostics: run.output,
                })
            }
            Err(ManifixError::ToolTimeout { seconds, .. }) => Ok(RepairRun {
                success: false,
                diagnostics: format!("admesh timed out after {seconds}s"),
            }),
            Err(e) => Err(e),
        }
    }

    async fn inspect(&self, mesh: &Path) -> Result<String, ManifixError> {
        let args = [OsString::from("--exact"), mesh.as_os_str().to_owned()];
        match run_captured(&self.program, args, self.timeout).await {
            Ok(run) => Ok(run.output),
            Err(ManifixError::ToolTimeout { seconds, .. }) => {
                Ok(format!("admesh inspect timed out after {seconds}s"))
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_args_order() {
        let args = repair_args(
            Path::new("/s/in.stl"),
            Path::new("/s/stage_1.stl"),
            &["--exact", "--normal-directions"],
        );
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "--write-binary-stl",
                "/s/stage_1.stl",
                "--exact",
                "--normal-directions",
                "/s/in.stl"
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_unsuccessful() {
        // `false` ignores its arguments and exits 1.
        let tool = AdmeshTool::new("false", Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();
        let run = tool
            .repair(&dir.path().join("a.stl"), &dir.path().join("b.stl"), &[])
            .await
            .unwrap();
        assert!(!run.success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_zero_without_output_is_unsuccessful() {
        let tool = AdmeshTool::new("true", Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();
        let run = tool
            .repair(&dir.path().join("a.stl"), &dir.path().join("b.stl"), &[])
            .await
            .unwrap();
        assert!(!run.success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_an_unsuccessful_run() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hang.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tool = AdmeshTool::new(script.to_string_lossy(), Duration::from_millis(100));
        let started = std::time::Instant::now();
        let run = tool
            .repair(&dir.path().join("a.stl"), &dir.path().join("b.stl"), &[])
            .await
            .unwrap();
        assert!(!run.success);
        assert!(run.diagnostics.contains("timed out"), "{}", run.diagnostics);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let tool = AdmeshTool::new("manifix-no-such-admesh", Duration::from_secs(1));
        assert!(tool.inspect(Path::new("x.stl")).await.is_err());
    }
}
