use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with status {status:?}: {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("failed reading output of `{command}`: {source}")]
    Output {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    /// Captured standard error, when the process got far enough to produce any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecError::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    pub fn is_no_such_container(&self) -> bool {
        self.to_string().contains("No such container")
    }
}

pub type ExecResult<T> = Result<T, ExecError>;

/// Runs a shell command and hands back its standard output.
///
/// `verbose` only affects observability: implementations may stream output as
/// it arrives, but the returned text is the same either way.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str, verbose: bool) -> ExecResult<String>;
}

#[derive(Debug, Clone)]
pub struct ShellExecutor {
    pub shell: String,
}
