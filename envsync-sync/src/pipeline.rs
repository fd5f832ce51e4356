//! Shared operation entrypoint used by the CLI (`--local`) and the agent.
//!
//! Arguments are validated here, before the lock is taken or any command runs.

use serde::Serialize;

use envsync_core::validate::{validate_branch, validate_revision};
use envsync_core::AgentConfig;

use crate::reconcile::{CleanupReport, Synchronizer, UpdateAllReport, UpdateReport, STATUS_DONE};
use crate::SyncError;

/// One repository operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Update every live branch, then clean up.
    UpdateAll,
    /// Update one branch, optionally pinned to `revision`.
    Update {
        branch: String,
        revision: Option<String>,
    },
    /// Remove stale environments. `confirm` must be affirmative when given.
    Cleanup { confirm: Option<String> },
    /// Compact the mirror.
    Gc,
}

impl Operation {
    /// Short name used in logs and replies.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::UpdateAll => "update_all",
            Operation::Update { .. } => "update",
            Operation::Cleanup { .. } => "cleanup",
            Operation::Gc => "git_gc",
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if let Operation::Update { branch, revision } = self {
            validate_branch(branch)?;
            if let Some(revision) = revision {
                validate_revision(revision)?;
            }
        }
        Ok(())
    }
}

/// Result of [`run`], serialized as the `data` of an agent reply.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OperationReport {
    UpdateAll(UpdateAllReport),
    Update(UpdateReport),
    Cleanup(CleanupReport),
    Gc { status: &'static str },
}

/// Validate and run `op` against `config`.
pub fn run(config: &AgentConfig, op: Operation) -> Result<OperationReport, SyncError> {
    op.validate()?;
    tracing::info!("running {}", op.name());
    let sync = Synchronizer::new(config.clone());
    match op {
        Operation::UpdateAll => sync.update_all().map(OperationReport::UpdateAll),
        Operation::Update { branch, revision } => sync
            .update_branch(&branch, revision.as_deref())
            .map(OperationReport::Update),
        Operation::Cleanup { confirm } => sync
            .cleanup(confirm.as_deref())
            .map(OperationReport::Cleanup),
        Operation::Gc => sync.gc().map(|()| OperationReport::Gc {
            status: STATUS_DONE,
        }),
    }
}

#[cfg(test)]
mod tests {
    use envsync_core::ValidationError;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn unsafe_branch_is_rejected_before_any_side_effect() {
        let home = TempDir::new().expect("home");
        let config = AgentConfig::rooted_at(home.path(), "unused");
        let err = run(
            &config,
            Operation::Update {
                branch: "master; rm -rf /".into(),
                revision: None,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::Unsafe { field: "branch", .. })
        ));
        assert!(!config.lock_file.exists(), "lock must not be taken");
        assert!(!config.mirror_dir().exists());
    }

    #[test]
    fn unsafe_revision_is_rejected() {
        let home = TempDir::new().expect("home");
        let config = AgentConfig::rooted_at(home.path(), "unused");
        let err = run(
            &config,
            Operation::Update {
                branch: "master".into(),
                revision: Some("$(id)".into()),
            },
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn gc_without_mirror_reports_missing() {
        let home = TempDir::new().expect("home");
        let config = AgentConfig::rooted_at(home.path(), "unused");
        let err = run(&config, Operation::Gc).unwrap_err();
        assert!(matches!(err, SyncError::MirrorMissing { .. }));
    }
}
