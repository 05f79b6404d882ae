use crate::cancel::CancellationToken;
use crate::error::{DeviateError, Result};
use std::path::PathBuf;
use std::process::Command;

/// Runs host tools (`git`, `gh`) inside the project directory
#[derive(Debug, Clone)]
pub struct Executor {
    dir: PathBuf,
    cancel: CancellationToken,
    env: Vec<(String, String)>,
}

impl Executor {
    pub fn new(dir: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        Executor {
            dir: dir.into(),
            cancel,
            env: Vec::new(),
        }
    }

    /// Set an environment variable for every command run by this executor
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Execute a command and return its standard output
    ///
    /// The command runs with the project directory as its working directory.
    /// Any non-zero exit code is reported as [DeviateError::CommandFailed]
    /// carrying the captured stdout and stderr.
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - stdout of a command that exited with code 0
    /// * `Err(Cancelled)` - the run was cancelled before the command started
    /// * `Err(CommandFailed)` - the command could not start or exited non-zero
    pub fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>> {
        self.cancel.check()?;
        let command = format!("{} {}", program, args.join(" "));
        tracing::debug!(command = %command, dir = %self.dir.display(), "exec");

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.dir);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|e| DeviateError::CommandFailed {
            command: command.clone(),
            code: -1,
            stdout: String::new(),
            stderr: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(DeviateError::CommandFailed {
                command,
                code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }

    /// Try to execute a command, logging failures but not failing
    ///
    /// Used for cleanup (e.g. `git merge --abort`) after a primary failure,
    /// where the primary error is the one that must surface.
    pub fn run_permissive(&self, program: &str, args: &[&str]) {
        if let Err(e) = self.run(program, args) {
            tracing::warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_missing_program_fails() {
        let exec = Executor::new(std::env::temp_dir(), CancellationToken::new());
        let err = exec.run("/nonexistent/path/to/tool", &["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        assert!(err.to_string().contains("/nonexistent/path/to/tool --help"));
    }

    #[test]
    fn test_cancelled_executor_does_not_spawn() {
        let token = CancellationToken::new();
        token.cancel();
        let exec = Executor::new(std::env::temp_dir(), token);
        let err = exec.run("git", &["--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_captures_output() {
        let exec = Executor::new(std::env::temp_dir(), CancellationToken::new());
        let err = exec
            .run("sh", &["-c", "echo out; echo err >&2; exit 3"])
            .unwrap_err();
        match err {
            DeviateError::CommandFailed {
                code,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(code, 3);
                assert_eq!(stdout.trim(), "out");
                assert_eq!(stderr.trim(), "err");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_env_is_passed_to_command() {
        let exec = Executor::new(std::env::temp_dir(), CancellationToken::new())
            .with_env("DEVIATE_TEST_VALUE", "42");
        let out = exec.run("sh", &["-c", "printf %s \"$DEVIATE_TEST_VALUE\""]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "42");
    }
}
