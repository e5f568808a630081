//! Command runner - every OS probe and actuation goes through here
//!
//! Commands run with a hard timeout and are killed when it expires, so a
//! hung tool can never stall the poll loop.

use radiogate_common::ProbeError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

fn describe(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run a command, bounded by `timeout`. Non-zero exit is not an error here.
pub async fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, ProbeError> {
    let command = describe(program, args);
    debug!("  Executing: {}", command);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Err(_) => {
            return Err(ProbeError::Timeout {
                command,
                secs: timeout.as_secs(),
            })
        }
        Ok(Err(source)) => return Err(ProbeError::Spawn { command, source }),
        Ok(Ok(output)) => output,
    };

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Run a command and return its stdout, mapping non-zero exit to an error.
pub async fn run_checked(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, ProbeError> {
    let output = run_command(program, args, timeout).await?;
    if !output.success {
        return Err(ProbeError::CommandFailed {
            command: describe(program, args),
            code: output.code,
            stderr: output.stderr,
        });
    }
    Ok(output.stdout)
}
