//! Type-safe external command execution.
//!
//! Every tool the engine shells out to (`systemctl`, `net`,
//! `ipa-client-install`, `cacertdir_rehash`) is described by a struct that
//! implements `CommandArgs`. The struct is the contract for the tool's flags,
//! and `run_command` is the one place that spawns processes.

use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::error::{AuthconfError, Result};

/// Typed arguments for one external tool invocation.
///
/// # Contract
///
/// - `program()`: executable name or absolute path.
/// - `to_cli_args()`: arguments exactly as the tool expects them.
/// - `logged_args()`: the same arguments with secrets masked; this is what
///   reaches the log.
pub trait CommandArgs {
    fn program(&self) -> String;

    fn to_cli_args(&self) -> Vec<String>;

    fn get_env_vars(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn logged_args(&self) -> Vec<String> {
        self.to_cli_args()
    }
}

/// Output from a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    /// Turn a non-zero exit into a command error.
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let code = self.exit_code.unwrap_or(-1);
        Err(AuthconfError::command(format!(
            "{} failed (exit code {}): {}",
            context,
            code,
            self.stderr.trim()
        )))
    }
}

/// Run a command to completion, capturing its output.
///
/// Spawn failures are errors; a non-zero exit is reported through
/// `CommandOutput::success`.
pub fn run_command<T: CommandArgs>(args: &T) -> Result<CommandOutput> {
    let program = args.program();
    info!("run_command: {} args={:?}", program, args.logged_args());

    let mut cmd = Command::new(&program);
    cmd.args(args.to_cli_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in args.get_env_vars() {
        cmd.env(key, value);
    }

    let output = cmd
        .output()
        .map_err(|e| AuthconfError::command(format!("failed to spawn {}: {}", program, e)))?;

    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
        success: output.status.success(),
    };
    debug!("{} exited with {:?}", program, result.exit_code);
    Ok(result)
}
