//! The local mirror of the remote repository.
//!
//! A `git clone --mirror` holding every ref and no working tree. It is the
//! object store all environment checkouts read from. Created lazily on first
//! use and refreshed (fetch + prune) on every repository-wide operation.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::auth::GitAuth;
use crate::error::{io_err, SyncError};
use crate::runner::Cmd;

/// What [`Mirror::ensure`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorAction {
    Cloned,
    Fetched,
}

#[derive(Debug, Clone)]
pub struct Mirror {
    path: PathBuf,
    url: String,
}

impl Mirror {
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// `git --git-dir=<mirror>`: base for every command against the mirror.
    pub fn git(&self) -> Cmd {
        Cmd::git().arg(format!("--git-dir={}", self.path.display()))
    }

    /// Clone the mirror if absent, otherwise fetch and prune.
    pub fn ensure(&self, auth: &GitAuth) -> Result<MirrorAction, SyncError> {
        auth.with_auth(|scope| {
            if self.exists() {
                tracing::info!("fetching mirror {}", self.path.display());
                scope.apply(self.git().args(["fetch", "origin"])).run()?;
                scope
                    .apply(self.git().args(["remote", "prune", "origin"]))
                    .run()?;
                Ok(MirrorAction::Fetched)
            } else {
                tracing::info!("cloning {} into {}", self.url, self.path.display());
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
                }
                scope
                    .apply(
                        Cmd::git()
                            .args(["clone", "--mirror", "--"])
                            .arg(&self.url)
                            .arg(&self.path),
                    )
                    .run()?;
                Ok(MirrorAction::Cloned)
            }
        })
        .map_err(|source| SyncError::MirrorSync {
            path: self.path.clone(),
            source: Box::new(source),
        })
    }

    /// Opportunistic compaction. Best-effort; independent of updates.
    pub fn gc(&self) -> Result<(), SyncError> {
        if !self.exists() {
            return Err(SyncError::MirrorMissing {
                path: self.path.clone(),
            });
        }
        self.git().args(["gc", "--auto", "--prune"]).run()?;
        Ok(())
    }

    /// Resolve `rev` to a full commit id.
    pub fn rev_parse(&self, rev: &str) -> Result<String, SyncError> {
        let out = self
            .git()
            .args(["rev-parse", "--verify", "--quiet"])
            .arg(format!("{rev}^{{commit}}"))
            .run()?;
        Ok(out.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn clone_from_missing_upstream_is_a_mirror_sync_error() {
        let tmp = TempDir::new().unwrap();
        let upstream = tmp.path().join("no-such-upstream");
        let mirror = Mirror::new(tmp.path().join("puppet.git"), upstream.display().to_string());

        let err = mirror.ensure(&GitAuth::default()).unwrap_err();
        match err {
            SyncError::MirrorSync { path, .. } => assert_eq!(path, tmp.path().join("puppet.git")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!mirror.exists());
    }

    #[test]
    fn gc_without_mirror_is_missing() {
        let tmp = TempDir::new().unwrap();
        let mirror = Mirror::new(tmp.path().join("puppet.git"), "unused");
        assert!(matches!(mirror.gc(), Err(SyncError::MirrorMissing { .. })));
    }
}
