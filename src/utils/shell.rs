// src/utils/shell.rs
use std::process::{Output, Stdio};
use std::time::Duration;
use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// Whether `program` can be spawned at all
pub async fn is_installed(program: &str, version_flag: &str) -> bool {
    let probe = Command::new(program)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match tokio::time::timeout(Duration::from_secs(5), probe).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            trace!("{} is not available: {}", program, e);
            false
        }
        Err(_) => false,
    }
}

/// Run a program with arguments, killing it if it outlives `timeout_secs`
pub async fn execute_with_timeout(program: &str, args: &[&str], timeout_secs: u64) -> Result<Output> {
    debug!("Executing with timeout {}: {} {}", timeout_secs, program, args.join(" "));

    let command_future = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(Duration::from_secs(timeout_secs), command_future).await {
        Ok(result) => {
            let output = result.context(format!("Failed to execute {}", program))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!("{} exited with {}: {}", program, output.status, stderr.trim());
            }
            Ok(output)
        }
        Err(_) => {
            warn!("{} timed out after {} seconds", program, timeout_secs);
            Err(anyhow::anyhow!("{} timed out after {} seconds", program, timeout_secs))
        }
    }
}
