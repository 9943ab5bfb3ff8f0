use std::io::ErrorKind;
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

use toolwarden_core::error::GatewayError;

use crate::command::RunnerCommand;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub command: String,
    pub working_dir: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// `timeout` or `command_not_found` when the program never finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Spawns `command`, waits at most its timeout and caps each stream at
/// `max_output` characters. The child is killed if the wait is abandoned.
pub async fn run(
    line: &str,
    command: &RunnerCommand,
    max_output: usize,
) -> Result<ExecutionResult, GatewayError> {
    let working_dir = command.working_dir.display().to_string();
    let failed = |stderr: String, error: &str, timed_out: bool| ExecutionResult {
        success: false,
        command: line.to_string(),
        working_dir: working_dir.clone(),
        exit_code: -1,
        stdout: String::new(),
        stderr,
        timed_out,
        error: Some(error.to_string()),
    };

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.working_dir)
        .env_clear()
        .envs(&command.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(program = %command.program, "program not found");
            return Ok(failed(
                format!("Command not found: {}", command.program),
                "command_not_found",
                false,
            ));
        }
        Err(err) => return Err(GatewayError::io("spawn command", err)),
    };

    let output = match tokio::time::timeout(command.timeout, child.wait_with_output()).await {
        Ok(output) => output.map_err(|err| GatewayError::io("wait for command", err))?,
        Err(_) => {
            let secs = command.timeout.as_secs();
            warn!(timeout_secs = secs, "command timed out");
            return Ok(failed(
                format!("Command timed out after {secs} seconds"),
                "timeout",
                true,
            ));
        }
    };

    let exit_code = output.status.code().unwrap_or(-1);
    debug!(exit_code, "command finished");
    Ok(ExecutionResult {
        success: output.status.success(),
        command: line.to_string(),
        working_dir,
        exit_code,
        stdout: truncate_chars(&String::from_utf8_lossy(&output.stdout), max_output),
        stderr: truncate_chars(&String::from_utf8_lossy(&output.stderr), max_output),
        timed_out: false,
        error: None,
    })
}

pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
