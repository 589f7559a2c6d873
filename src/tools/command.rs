// src/tools/command.rs — Run an external program with captured output and a hard timeout

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::infra::errors::ManifixError;

/// What an external program left behind.
#[derive(Debug, Clone)]
pub struct CapturedRun {
    pub exit_ok: bool,
    pub exit_code: Option<i32>,
    /// stdout, a newline, then stderr; trimmed.
    pub output: String,
}

/// Run `program args...`, waiting at most `timeout`.
///
/// The child is spawned with `kill_on_drop`, so when the timeout fires the
/// dropped future takes the process down with it.
pub async fn run_captured<I, S>(
    program: &str,
    args: I,
    timeout: Duration,
) -> Result<CapturedRun, ManifixError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ManifixError::ToolSpawn {
            program: program.to_string(),
            message: e.to_string(),
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!("{} exceeded {}s, killed", program, timeout.as_secs());
            return Err(ManifixError::ToolTimeout {
                program: program.to_string(),
                seconds: timeout.as_secs(),
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{}\n{}", stdout, stderr);

    Ok(CapturedRun {
        exit_ok: output.status.success(),
        exit_code: output.status.code(),
        output: combined.trim().to_string(),
    })
}

/// At most `max_len` bytes from the front of a diagnostic, cut on a char boundary.
pub fn excerpt(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("admesh: bad", 6), "admesh");
        assert_eq!(excerpt("café", 4), "caf");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_both_streams() {
        let run = run_captured(
            "sh",
            ["-c", "echo out; echo err 1>&2; exit 3"],
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(!run.exit_ok);
        assert_eq!(run.exit_code, Some(3));
        assert!(run.output.contains("out"));
        assert!(run.output.contains("err"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let err = run_captured("sh", ["-c", "sleep 5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ManifixError::ToolTimeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = run_captured(
            "manifix-no-such-binary",
            Vec::<String>::new(),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ManifixError::ToolSpawn { .. }));
    }
}
