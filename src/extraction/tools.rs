/*!
 * Helpers for running external command-line collaborators
 * (pdftoppm, tesseract, headless browsers) with a wall-clock limit.
 */

use std::ffi::OsStr;
use std::process::Output;
use std::time::Duration;

use log::debug;
use tokio::process::Command;

use crate::errors::ExtractionError;

/// Whether `binary` is on PATH
pub async fn has_command(binary: &str) -> bool {
    Command::new("which")
        .arg(binary)
        .output()
        .await
        .map(|out| out.status.success() && !out.stdout.is_empty())
        .unwrap_or(false)
}

/// Run `program` with `args`, killing it once `timeout_secs` elapses.
/// A non-zero exit status is reported as `ToolFailed` with the captured stderr.
pub async fn run_tool<I, S>(program: &str, args: I, timeout_secs: u64) -> Result<Output, ExtractionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    if !has_command(program).await {
        return Err(ExtractionError::ToolMissing(program.to_string()));
    }

    debug!("Running {}", program);
    let child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();

    let output = tokio::select! {
        result = child => {
            result.map_err(|e| ExtractionError::ToolFailed {
                tool: program.to_string(),
                message: e.to_string(),
            })?
        },
        _ = tokio::time::sleep(Duration::from_secs(timeout_secs)) => {
            return Err(ExtractionError::Timeout {
                tool: program.to_string(),
                secs: timeout_secs,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractionError::ToolFailed {
            tool: program.to_string(),
            message: stderr.trim().to_string(),
        });
    }
    Ok(output)
}
