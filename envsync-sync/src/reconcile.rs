//! Branch-set reconciliation: bring the environments root in line with the
//! mirror's live branches.
//!
//! Every public operation takes the repository lock for its whole sequence.
//! Internal steps (`*_locked`) assume the caller already holds it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use envsync_core::{to_local_name, AgentConfig, LocalName};

use crate::auth::GitAuth;
use crate::branches::{list_environment_dirs, list_remote_branches, strip_ignored};
use crate::checkout::{Checkout, CheckoutOutcome, CheckoutReport};
use crate::error::{io_err, SyncError};
use crate::lock::with_repository_lock;
use crate::mirror::{Mirror, MirrorAction};
use crate::writer::{write_environment_config, WriteResult};

/// Confirmation tokens that let a cleanup proceed.
pub const AFFIRMATIVE_TOKENS: &[&str] = &["yes", "1", "true"];

/// Status string carried by successful replies.
pub const STATUS_DONE: &str = "Done";

#[derive(Debug, Clone, Serialize)]
pub struct UpdateAllReport {
    pub status: &'static str,
    pub mirror: MirrorAction,
    pub checkouts: Vec<CheckoutReport>,
    pub cleanup: CleanupReport,
    /// `None` when `rewrite_config` is off.
    pub config_written: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum UpdateReport {
    Done(CheckoutReport),
    /// The branch no longer exists upstream; nothing was touched.
    Deleted { branch: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// The confirm token was present but not affirmative.
    pub skipped: bool,
    pub removed: Vec<String>,
    pub failed: Vec<CleanupFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub name: String,
    pub error: String,
}

/// `None` means "no confirmation requested" and proceeds.
pub fn is_affirmative(confirm: Option<&str>) -> bool {
    confirm.map_or(true, |token| AFFIRMATIVE_TOKENS.contains(&token))
}

/// Owns the resolved configuration plus the mirror and credential handles
/// derived from it.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    config: AgentConfig,
    mirror: Mirror,
    auth: GitAuth,
    environments_dir: PathBuf,
}

impl Synchronizer {
    pub fn new(config: AgentConfig) -> Self {
        let mirror = Mirror::new(absolute(config.mirror_dir()), config.repository.clone());
        let auth = GitAuth::new(config.ssh_key.clone());
        let environments_dir = absolute(config.environments_dir());
        Self {
            config,
            mirror,
            auth,
            environments_dir,
        }
    }

    // -----------------------------------------------------------------------
    // Public operations (take the lock)
    // -----------------------------------------------------------------------

    /// Refresh the mirror, check out every live branch at its tip, rewrite
    /// the environment config and drop stale environments.
    ///
    /// The first checkout failure aborts the run; earlier checkouts stay.
    pub fn update_all(&self) -> Result<UpdateAllReport, SyncError> {
        self.locked(|| {
            let mirror = self.mirror.ensure(&self.auth)?;
            let live = self.live_branches()?;
            let wanted = strip_ignored(live.clone(), &self.config.remove_branches);

            let checkout = self.checkout();
            let mut checkouts = Vec::with_capacity(wanted.len());
            for branch in &wanted {
                tracing::info!("updating branch {branch}");
                if let CheckoutOutcome::CheckedOut(report) = checkout.run(&live, branch, None)? {
                    checkouts.push(report);
                }
            }

            let config_written = self.rewrite_config_locked(&wanted)?;
            let cleanup = self.cleanup_locked(&live)?;

            Ok(UpdateAllReport {
                status: STATUS_DONE,
                mirror,
                checkouts,
                cleanup,
                config_written,
            })
        })
    }

    /// Refresh the mirror and check out a single branch, optionally pinned.
    pub fn update_branch(
        &self,
        branch: &str,
        revision: Option<&str>,
    ) -> Result<UpdateReport, SyncError> {
        self.locked(|| {
            self.mirror.ensure(&self.auth)?;
            let live = self.live_branches()?;
            if self.config.remove_branches.matches(branch) {
                tracing::info!("branch {branch} matches a remove rule; not checking out");
                return Ok(UpdateReport::Deleted {
                    branch: branch.to_string(),
                });
            }
            let report = match self.checkout().run(&live, branch, revision)? {
                CheckoutOutcome::CheckedOut(report) => report,
                CheckoutOutcome::BranchNotFound { branch } => {
                    return Ok(UpdateReport::Deleted { branch })
                }
            };
            let wanted = strip_ignored(live, &self.config.remove_branches);
            self.rewrite_config_locked(&wanted)?;
            Ok(UpdateReport::Done(report))
        })
    }

    /// Remove environment directories with no live, non-removed branch.
    ///
    /// Uses the mirror as it is; run an update first to refresh it.
    pub fn cleanup(&self, confirm: Option<&str>) -> Result<CleanupReport, SyncError> {
        if !is_affirmative(confirm) {
            tracing::info!("cleanup not confirmed; skipping");
            return Ok(CleanupReport {
                skipped: true,
                ..CleanupReport::default()
            });
        }
        self.locked(|| {
            if !self.mirror.exists() {
                return Err(SyncError::MirrorMissing {
                    path: self.mirror.path().to_path_buf(),
                });
            }
            let live = self.live_branches()?;
            self.cleanup_locked(&live)
        })
    }

    pub fn gc(&self) -> Result<(), SyncError> {
        self.locked(|| self.mirror.gc())
    }

    // -----------------------------------------------------------------------
    // Building blocks (caller holds the lock)
    // -----------------------------------------------------------------------

    /// Live branches in the mirror, ignore rules applied.
    pub fn live_branches(&self) -> Result<Vec<String>, SyncError> {
        list_remote_branches(&self.mirror, &self.config.ignore_branches)
    }

    /// Environment directories on disk, ignore rules applied.
    pub fn environment_dirs(&self) -> Result<Vec<String>, SyncError> {
        list_environment_dirs(&self.environments_dir, &self.config.ignore_branches)
    }

    fn checkout(&self) -> Checkout<'_> {
        Checkout {
            mirror: &self.mirror,
            environments_dir: &self.environments_dir,
            after_checkout: self.config.after_checkout_hook(),
        }
    }

    fn cleanup_locked(&self, live: &[String]) -> Result<CleanupReport, SyncError> {
        self.sweep(live, remove_entry)
    }

    /// Remove every environment not backed by a kept branch. A failed
    /// removal is recorded and the sweep moves on.
    fn sweep(
        &self,
        live: &[String],
        mut remove: impl FnMut(&Path) -> Result<(), SyncError>,
    ) -> Result<CleanupReport, SyncError> {
        let keep: BTreeSet<LocalName> = live
            .iter()
            .filter(|branch| !self.config.remove_branches.matches(branch))
            .map(|branch| to_local_name(branch))
            .collect();

        let mut report = CleanupReport::default();
        for name in self.environment_dirs()? {
            if keep.contains(&LocalName::from(name.as_str())) {
                continue;
            }
            let path = self.environments_dir.join(&name);
            tracing::info!("removing stale environment {}", path.display());
            match remove(&path) {
                Ok(()) => report.removed.push(name),
                Err(err) => {
                    tracing::warn!("failed to remove {}: {err}", path.display());
                    report.failed.push(CleanupFailure {
                        name,
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn rewrite_config_locked(&self, wanted: &[String]) -> Result<Option<bool>, SyncError> {
        if !self.config.rewrite_config {
            return Ok(None);
        }
        let mut environments: Vec<LocalName> = Vec::with_capacity(wanted.len());
        for branch in wanted {
            let local = to_local_name(branch);
            if !environments.contains(&local) {
                environments.push(local);
            }
        }
        let result = write_environment_config(&self.config, &environments)?;
        Ok(Some(matches!(result, WriteResult::Written { .. })))
    }

    fn locked<T>(&self, f: impl FnOnce() -> Result<T, SyncError>) -> Result<T, SyncError> {
        with_repository_lock(&self.config.lock_file, f)
    }
}

/// Git runs with the environment as its working directory, so relative
/// paths must be resolved up front.
fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn remove_entry(path: &Path) -> Result<(), SyncError> {
    let meta = std::fs::symlink_metadata(path).map_err(|e| io_err(path, e))?;
    if meta.is_dir() {
        std::fs::remove_dir_all(path).map_err(|e| io_err(path, e))
    } else {
        std::fs::remove_file(path).map_err(|e| io_err(path, e))
    }
}
