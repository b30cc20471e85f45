//! Thin wrappers around [`std::process::Command`] for external tools.
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Result of a command execution.
#[derive(Debug)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Run a command with extra environment variables, allowing failure.
///
/// # Errors
///
/// Returns an error only if the program cannot be started.
pub fn run_unchecked_with_env(
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
) -> Result<ExecResult> {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null());
    for (k, v) in env {
        cmd.env(k, v);
    }
    let output = cmd
        .output()
        .with_context(|| format!("failed to execute: {program}"))?;

    Ok(ExecResult::from(output))
}

/// Run a command attached to the current terminal and wait for it.
///
/// Used for steps that need the user (device-code login). Returns whether
/// the command succeeded.
///
/// # Errors
///
/// Returns an error if the program cannot be started.
pub fn run_interactive_with_env(program: &str, args: &[&str], env: &[(&str, &str)]) -> Result<bool> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    for (k, v) in env {
        cmd.env(k, v);
    }
    let status = cmd
        .status()
        .with_context(|| format!("failed to execute: {program}"))?;
    Ok(status.success())
}

/// Start a command without waiting for it, detached from our stdio.
///
/// # Errors
///
/// Returns an error if the program cannot be started.
pub fn spawn_detached(program: &str, args: &[&str]) -> Result<()> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to start: {program}"))?;
    Ok(())
}

/// Locate `program` on `PATH`.
#[must_use]
pub fn find(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_env() {
        let result =
            run_unchecked_with_env("sh", &["-c", "echo $PROFMAN_TEST_VALUE"], &[("PROFMAN_TEST_VALUE", "hello")])
                .unwrap();
        assert!(result.success);
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_reported_not_raised() {
        let result = run_unchecked_with_env("sh", &["-c", "echo oops >&2; exit 3"], &[]).unwrap();
        assert!(!result.success);
        assert_eq!(result.code, Some(3));
        assert_eq!(result.stderr.trim(), "oops");
    }

    #[test]
    fn missing_program_is_an_error() {
        assert!(run_unchecked_with_env("this-program-does-not-exist-12345", &[], &[]).is_err());
        assert!(spawn_detached("this-program-does-not-exist-12345", &[]).is_err());
        assert!(find("this-program-does-not-exist-12345").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn find_locates_sh() {
        assert!(find("sh").is_some());
    }
}
