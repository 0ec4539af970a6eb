pub mod shell;
pub mod types;

pub use shell::shell_quote;
pub use types::{CommandExecutor, ExecError, ExecResult, ShellExecutor};
