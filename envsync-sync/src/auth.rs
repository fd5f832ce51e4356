//! Scoped ssh credentials for mirror network operations.
//!
//! With an `ssh_key` configured, [`GitAuth::with_auth`] writes a temporary
//! wrapper script that runs `ssh` with that key and host-key checking
//! disabled, and hands the closure an [`AuthScope`]. Commands built through
//! [`AuthScope::apply`] get `GIT_SSH` pointing at the script; nothing is set
//! on the agent process itself. The script is deleted when the scope ends,
//! whether the closure succeeded or not.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::error::{io_err, SyncError};
use crate::runner::Cmd;

pub const GIT_SSH_ENV: &str = "GIT_SSH";

/// Credential configuration, passed explicitly down the call chain.
#[derive(Debug, Clone, Default)]
pub struct GitAuth {
    ssh_key: Option<PathBuf>,
}

/// A live credential scope. Dropping it removes the wrapper script.
#[derive(Debug)]
pub struct AuthScope {
    wrapper: Option<TempPath>,
}

impl GitAuth {
    pub fn new(ssh_key: Option<PathBuf>) -> Self {
        Self { ssh_key }
    }

    /// Run `f` inside a credential scope.
    pub fn with_auth<T>(
        &self,
        f: impl FnOnce(&AuthScope) -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        let scope = self.open()?;
        let result = f(&scope);
        drop(scope);
        result
    }

    fn open(&self) -> Result<AuthScope, SyncError> {
        let Some(key) = self.ssh_key.as_deref() else {
            return Ok(AuthScope { wrapper: None });
        };

        let mut file = tempfile::Builder::new()
            .prefix("envsync-ssh-")
            .suffix(".sh")
            .tempfile()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        file.write_all(wrapper_script(key).as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| io_err(file.path(), e))?;

        // Close the handle before anyone tries to exec the script.
        let wrapper = file.into_temp_path();
        set_executable(&wrapper)?;
        tracing::debug!("installed ssh wrapper {}", wrapper.display());
        Ok(AuthScope {
            wrapper: Some(wrapper),
        })
    }
}

impl AuthScope {
    /// Path of the wrapper script, if a key is configured.
    pub fn wrapper_path(&self) -> Option<&Path> {
        self.wrapper.as_deref()
    }

    /// Attach the credential to one command.
    pub fn apply(&self, cmd: Cmd) -> Cmd {
        match self.wrapper_path() {
            Some(path) => cmd.env(GIT_SSH_ENV, path),
            None => cmd,
        }
    }
}

fn wrapper_script(key: &Path) -> String {
    format!(
        "#!/bin/sh\nexec ssh -i {} -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null \"$@\"\n",
        shell_quote(&key.to_string_lossy())
    )
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), SyncError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), SyncError> {
    Ok(())
}
