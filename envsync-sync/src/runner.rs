//! External command runner.
//!
//! Every git invocation goes through [`Cmd::run`]: stdin is closed, stdout and
//! stderr are captured into one string, and a non-zero exit becomes
//! [`SyncError::Command`] carrying the command line and that output. There is
//! no retry and no timeout; callers decide.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::SyncError;

/// Builder for one external command invocation.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn git() -> Self {
        Self::new("git")
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable for this invocation only.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Human-readable command line, used in logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion and return combined stdout + stderr.
    pub fn run(&self) -> Result<String, SyncError> {
        let command = self.display();
        tracing::debug!("running cmd {command}");

        let mut process = Command::new(&self.program);
        process
            .args(&self.args)
            .stdin(Stdio::null())
            .envs(self.envs.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str())));
        if let Some(dir) = &self.cwd {
            process.current_dir(dir);
        }

        let output = process.output().map_err(|source| SyncError::Spawn {
            command: command.clone(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(SyncError::Command {
                command,
                output: combined,
            });
        }
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_stderr() {
        let out = Cmd::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .run()
            .expect("run");
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }

    #[test]
    fn non_zero_exit_carries_command_and_output() {
        let err = Cmd::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .run()
            .unwrap_err();
        match err {
            SyncError::Command { command, output } => {
                assert!(command.starts_with("sh -c"));
                assert!(output.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = Cmd::new("envsync-definitely-not-a-binary").run().unwrap_err();
        assert!(matches!(err, SyncError::Spawn { .. }));
    }

    #[test]
    fn env_and_cwd_apply_to_the_invocation_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = Cmd::new("sh")
            .args(["-c", "echo $ENVSYNC_RUNNER_TEST; pwd"])
            .env("ENVSYNC_RUNNER_TEST", "scoped")
            .current_dir(dir.path())
            .run()
            .expect("run");
        assert!(out.contains("scoped"));
        assert!(std::env::var_os("ENVSYNC_RUNNER_TEST").is_none());
    }
}
