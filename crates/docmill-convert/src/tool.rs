//! Subprocess boundary for external rendering tools.
//!
//! Every invocation runs under a wall-clock timeout. On expiry the child is
//! killed, never left running; the caller receives a timeout error rather
//! than a hang.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ConversionError;

const STDERR_CAPTURE_LIMIT: usize = 2048;

/// One external command-line tool with its invocation policy.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    name: &'static str,
    program: PathBuf,
    timeout: Duration,
}

impl ExternalTool {
    /// Describe a tool by identifier, binary path, and timeout.
    #[must_use]
    pub const fn new(name: &'static str, program: PathBuf, timeout: Duration) -> Self {
        Self {
            name,
            program,
            timeout,
        }
    }

    /// Stable tool identifier used in errors and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Run the tool to completion inside the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::ToolMissing`] when the binary cannot be
    /// spawned, [`ConversionError::Timeout`] when the wall clock expires (the
    /// child is killed), and [`ConversionError::ToolFailed`] with captured
    /// stderr on a non-zero exit.
    pub async fn run<I, S>(&self, args: I, cwd: &Path) -> Result<(), ConversionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(tool = self.name, cwd = %cwd.display(), "spawning external tool");
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ConversionError::ToolMissing { tool: self.name });
            }
            Ok(Err(err)) => {
                return Err(ConversionError::ToolFailed {
                    tool: self.name,
                    status: None,
                    stderr: err.to_string(),
                });
            }
            // Dropping the output future kills the child via kill_on_drop.
            Err(_elapsed) => {
                warn!(tool = self.name, timeout_secs = self.timeout.as_secs(),
                    "external tool timed out and was killed");
                return Err(ConversionError::Timeout {
                    tool: self.name,
                    timeout: self.timeout,
                });
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            // Truncate the raw bytes first; the lossy conversion repairs any
            // multi-byte character split at the cut.
            let captured = &output.stderr[..output.stderr.len().min(STDERR_CAPTURE_LIMIT)];
            let stderr = String::from_utf8_lossy(captured).into_owned();
            Err(ConversionError::ToolFailed {
                tool: self.name,
                status: output.status.code(),
                stderr,
            })
        }
    }

    /// Probe whether the binary is runnable at all.
    pub async fn available(&self, probe_arg: &str) -> bool {
        Command::new(&self.program)
            .arg(probe_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_maps_to_tool_missing() {
        let tool = ExternalTool::new(
            "absent",
            PathBuf::from("/definitely/not/a/binary"),
            Duration::from_secs(5),
        );
        let err = tool
            .run(["--version"], Path::new("/tmp"))
            .await
            .expect_err("spawn must fail");
        assert!(matches!(err, ConversionError::ToolMissing { tool: "absent" }));
    }

    #[tokio::test]
    async fn failing_command_captures_status() {
        let tool = ExternalTool::new("false", PathBuf::from("false"), Duration::from_secs(5));
        let err = tool
            .run(std::iter::empty::<&str>(), Path::new("/tmp"))
            .await
            .expect_err("false exits non-zero");
        assert!(matches!(
            err,
            ConversionError::ToolFailed {
                tool: "false",
                status: Some(1),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn timeout_kills_and_reports_within_bound() {
        let tool = ExternalTool::new("sleep", PathBuf::from("sleep"), Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = tool
            .run(["30"], Path::new("/tmp"))
            .await
            .expect_err("must time out");
        assert!(matches!(err, ConversionError::Timeout { tool: "sleep", .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn stderr_capture_survives_a_multibyte_character_at_the_cut() {
        let tool = ExternalTool::new("sh", PathBuf::from("sh"), Duration::from_secs(5));
        // 2047 ASCII bytes put the two-byte character astride the capture limit.
        let script = format!(
            "printf '%s' '{}é' >&2; exit 1",
            "x".repeat(STDERR_CAPTURE_LIMIT - 1)
        );
        let err = tool
            .run(["-c", &script], Path::new("/tmp"))
            .await
            .expect_err("script exits non-zero");
        let ConversionError::ToolFailed { stderr, .. } = err else {
            panic!("expected a tool failure");
        };
        assert!(stderr.chars().count() <= STDERR_CAPTURE_LIMIT);
        assert!(stderr.starts_with("xxx"));
    }

    #[tokio::test]
    async fn successful_command_returns_ok() {
        let tool = ExternalTool::new("true", PathBuf::from("true"), Duration::from_secs(5));
        tool.run(std::iter::empty::<&str>(), Path::new("/tmp"))
            .await
            .expect("true exits zero");
    }
}
