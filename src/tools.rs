//! External tool invocation with a timeout and failure classification.
//!
//! | Outcome | Classified as |
//! |---------|---------------|
//! | binary not found / cannot spawn | `NonRetryable` |
//! | timeout | `Retryable` |
//! | non-zero exit mentioning "No such file" | `NonRetryable` |
//! | any other non-zero exit | `Retryable` |

use std::ffi::{OsStr, OsString};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::config::Config;
use crate::errors::PipelineError;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external binaries under a retry policy.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    timeout: Duration,
    retry: RetryPolicy,
}

impl ToolRunner {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_secs(config.settings.tools.timeout_secs),
            config.settings.retry.to_policy(),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run<I, S>(&self, program: &str, args: I) -> Result<ToolOutput, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        self.retry
            .execute(program, || run_once(program, &args, self.timeout))
            .await
    }
}

/// Spawn `program` once, wait at most `limit`, and classify the result.
pub async fn run_once(
    program: &str,
    args: &[OsString],
    limit: Duration,
) -> Result<ToolOutput, PipelineError> {
    debug!(program, ?args, "running tool");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::NonRetryable(format!("{program} is not installed or not in PATH"))
            } else {
                PipelineError::NonRetryable(format!("Failed to start {program}: {e}"))
            }
        })?;

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(result) => result
            .map_err(|e| PipelineError::Retryable(format!("Failed to wait for {program}: {e}")))?,
        Err(_) => {
            return Err(PipelineError::Retryable(format!(
                "{program} timed out after {}s",
                limit.as_secs()
            )));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(classify_exit(program, output.status.code(), &stderr));
    }
    Ok(ToolOutput { stdout, stderr })
}

pub fn classify_exit(program: &str, code: Option<i32>, stderr: &str) -> PipelineError {
    let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    let msg = format!("{program} exited with {code}: {}", stderr.trim());
    if stderr.contains("No such file") {
        PipelineError::NonRetryable(msg)
    } else {
        PipelineError::Retryable(msg)
    }
}
