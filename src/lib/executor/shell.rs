use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::types::{CommandExecutor, ExecError, ExecResult, ShellExecutor};

impl ShellExecutor {
    pub fn new() -> Self {
        ShellExecutor {
            shell: "sh".to_string(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps `value` in single quotes for `sh`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Collects everything `reader` produces, byte for byte. Output is decoded
/// once at the end; invalid UTF-8 is replaced rather than failing the command.
async fn drain<R>(reader: Option<R>, verbose: bool, stream: &'static str) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(String::new());
    };

    let mut reader = BufReader::new(reader);
    let mut captured = Vec::new();
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        if reader.read_until(b'\n', &mut chunk).await? == 0 {
            break;
        }
        if verbose {
            let line = String::from_utf8_lossy(&chunk);
            info!(target: "led::exec", stream, "{}", line.trim_end());
        }
        captured.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&captured).into_owned())
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str, verbose: bool) -> ExecResult<String> {
        debug!(command, "executing");

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = drain(child.stdout.take(), verbose, "stdout");
        let stderr = drain(child.stderr.take(), verbose, "stderr");
        let (stdout, stderr, status) = tokio::join!(stdout, stderr, child.wait());

        let output_err = |source| ExecError::Output {
            command: command.to_string(),
            source,
        };
        let status = status.map_err(output_err)?;
        let stdout = stdout.map_err(output_err)?;
        let stderr = stderr.map_err(output_err)?;

        if status.success() {
            Ok(stdout)
        } else {
            Err(ExecError::Failed {
                command: command.to_string(),
                status: status.code(),
                stderr: stderr.trim_end().to_string(),
            })
        }
    }
}
