//! Single-branch checkout into its environment directory.
//!
//! ## `Checkout::run`: 7-step protocol
//!
//! 1. Branch not live → [`CheckoutOutcome::BranchNotFound`] (not an error).
//! 2. `mkdir -p` the environments root and the target directory.
//! 3. Read the revision marker as `from` (`"unknown"` if absent).
//! 4. Effective revision = explicit revision, else the branch name.
//! 5. Detached forced checkout bound to the mirror, then `clean -ffdx`.
//! 6. Resolve `HEAD` and overwrite the marker.
//! 7. Run the after-checkout hook, if any; its result is informational.
//!
//! Failures in steps 2–6 surface as [`SyncError::Checkout`]. A failed checkout
//! may leave the directory half-reset; the next successful run resets it again.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use envsync_core::{to_local_name, LocalName};

use crate::error::{io_err, SyncError};
use crate::mirror::Mirror;
use crate::runner::Cmd;

/// Hidden file inside each environment recording the last checked-out commit.
pub const REVISION_MARKER: &str = ".envsync_revision";

/// Placeholder for `from` when no marker exists yet.
pub const UNKNOWN_REVISION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutReport {
    pub branch: String,
    pub environment: LocalName,
    pub path: PathBuf,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_checkout_ok: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    CheckedOut(CheckoutReport),
    BranchNotFound { branch: String },
}

/// Everything a checkout needs, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct Checkout<'a> {
    pub mirror: &'a Mirror,
    pub environments_dir: &'a Path,
    pub after_checkout: Option<&'a str>,
}

impl Checkout<'_> {
    /// Check `branch` out at `revision` (or its tip). `live` is the current
    /// ignore-filtered branch set.
    pub fn run(
        &self,
        live: &[String],
        branch: &str,
        revision: Option<&str>,
    ) -> Result<CheckoutOutcome, SyncError> {
        if !live.iter().any(|b| b == branch) {
            tracing::info!("branch {branch} not found in mirror; nothing to check out");
            return Ok(CheckoutOutcome::BranchNotFound {
                branch: branch.to_string(),
            });
        }

        let environment = to_local_name(branch);
        let dir = self.environments_dir.join(&environment.0);
        let effective = revision
            .map(str::trim)
            .filter(|rev| !rev.is_empty())
            .unwrap_or(branch);

        let (from, to) = self
            .materialise(&dir, effective)
            .map_err(|source| SyncError::Checkout {
                branch: branch.to_string(),
                source: Box::new(source),
            })?;
        tracing::info!("checked out {branch} ({effective}) into {}: {from} -> {to}", dir.display());

        let after_checkout_ok = self
            .after_checkout
            .map(|hook| run_hook(hook, &dir, branch, &environment, &to));

        Ok(CheckoutOutcome::CheckedOut(CheckoutReport {
            branch: branch.to_string(),
            environment,
            path: dir,
            from,
            to,
            after_checkout_ok,
        }))
    }

    fn materialise(&self, dir: &Path, revision: &str) -> Result<(String, String), SyncError> {
        std::fs::create_dir_all(self.environments_dir)
            .map_err(|e| io_err(self.environments_dir, e))?;
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let from = read_marker(dir)?.unwrap_or_else(|| UNKNOWN_REVISION.to_string());

        let work_tree = format!("--work-tree={}", dir.display());
        self.mirror
            .git()
            .arg(&work_tree)
            .args(["checkout", "--detach", "--force"])
            .arg(revision)
            .arg("--")
            .current_dir(dir)
            .run()?;
        self.mirror
            .git()
            .arg(&work_tree)
            .args(["clean", "-ffdx", "--quiet"])
            .current_dir(dir)
            .run()?;

        let to = self.mirror.rev_parse("HEAD")?;
        write_marker(dir, &to)?;
        Ok((from, to))
    }
}

/// Last recorded revision of an environment, if any.
pub fn read_marker(dir: &Path) -> Result<Option<String>, SyncError> {
    let path = dir.join(REVISION_MARKER);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Some(text.trim().to_string()).filter(|rev| !rev.is_empty())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

fn write_marker(dir: &Path, revision: &str) -> Result<(), SyncError> {
    let path = dir.join(REVISION_MARKER);
    std::fs::write(&path, format!("{revision}\n")).map_err(|e| io_err(path, e))
}

fn run_hook(hook: &str, dir: &Path, branch: &str, environment: &LocalName, revision: &str) -> bool {
    let result = Cmd::new("sh")
        .arg("-c")
        .arg(hook)
        .current_dir(dir)
        .env("ENVSYNC_BRANCH", branch)
        .env("ENVSYNC_ENVIRONMENT", &environment.0)
        .env("ENVSYNC_REVISION", revision)
        .run();
    match result {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!("after-checkout hook failed in {}: {err}", dir.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn marker_roundtrip_and_missing() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(read_marker(tmp.path()).unwrap(), None);
        write_marker(tmp.path(), "abc123").unwrap();
        assert_eq!(read_marker(tmp.path()).unwrap().as_deref(), Some("abc123"));
    }

    #[test]
    fn unknown_branch_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let mirror = Mirror::new(tmp.path().join("puppet.git"), "unused");
        let envs = tmp.path().join("environments");
        let checkout = Checkout {
            mirror: &mirror,
            environments_dir: &envs,
            after_checkout: None,
        };
        let outcome = checkout
            .run(&["master".to_string()], "gone", None)
            .expect("no-op is not an error");
        assert_eq!(
            outcome,
            CheckoutOutcome::BranchNotFound {
                branch: "gone".into()
            }
        );
        assert!(!envs.exists(), "no-op must not create directories");
    }

    #[test]
    fn hook_failure_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        let env = LocalName::from("x");
        assert!(run_hook("exit 0", tmp.path(), "x", &env, "abc"));
        assert!(!run_hook("exit 1", tmp.path(), "x", &env, "abc"));
    }

    #[test]
    fn hook_runs_in_environment_with_context() {
        let tmp = TempDir::new().unwrap();
        let env = LocalName::from("masterbranch");
        assert!(run_hook(
            "echo \"$ENVSYNC_BRANCH $ENVSYNC_ENVIRONMENT $ENVSYNC_REVISION\" > hook.out",
            tmp.path(),
            "master",
            &env,
            "abc",
        ));
        let written = std::fs::read_to_string(tmp.path().join("hook.out")).unwrap();
        assert_eq!(written.trim(), "master masterbranch abc");
    }
}
