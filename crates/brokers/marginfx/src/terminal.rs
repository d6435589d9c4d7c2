use gateway_core::AdapterError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::protocol::{parse_reply, TerminalReply};

/// Hard ceiling on how long one terminal invocation may run.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// One-shot bridge to the broker's automation terminal.
///
/// Every call spawns the configured program with the call's arguments,
/// waits for it under a hard timeout, and holds it to the reply contract:
/// exit code zero, silent stderr, exactly one line of JSON on stdout.
/// Each violation maps to its own [`AdapterError`] kind so nothing
/// partial ever reads as success.
#[derive(Debug, Clone)]
pub struct TerminalBridge {
    program: PathBuf,
    timeout: Duration,
}

impl TerminalBridge {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Run one invocation to completion and parse its reply.
    ///
    /// The spawned child has `kill_on_drop` set; if the timeout fires the
    /// wait future is dropped and the process is terminated with it, so a
    /// wedged terminal can neither hang the caller nor leak.
    ///
    /// `args` may contain credentials. They exist only in the argv of
    /// this single invocation and are never logged or retained here.
    pub async fn run(&self, args: &[&str]) -> Result<TerminalReply, AdapterError> {
        debug!(program = %self.program.display(), "invoking automation terminal");

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AdapterError::Subprocess(format!(
                    "failed to spawn {}: {e}",
                    self.program.display()
                ))
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(waited) => waited.map_err(|e| {
                AdapterError::Subprocess(format!("failed to collect terminal output: {e}"))
            })?,
            Err(_) => return Err(AdapterError::Timeout(self.timeout)),
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(AdapterError::Subprocess(format!(
                "terminal exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            return Err(AdapterError::Subprocess(format!(
                "terminal wrote to stderr: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_reply(single_line(&stdout)?)
    }
}

/// Enforce the one-line stdout contract, tolerating only the trailing
/// newline.
fn single_line(stdout: &str) -> Result<&str, AdapterError> {
    let trimmed = stdout.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        return Err(AdapterError::Parse(
            "terminal produced no output".to_string(),
        ));
    }
    let lines = trimmed.lines().count();
    if lines != 1 {
        return Err(AdapterError::Parse(format!(
            "expected exactly one line of output, got {lines}"
        )));
    }
    Ok(trimmed)
}
