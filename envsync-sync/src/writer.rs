//! Atomic writer for the generated environment config.
//!
//! ## `atomic_write` protocol
//!
//! 1. Normalise line endings to LF.
//! 2. Compare with the file on disk → skip if identical.
//! 3. Write to `<path>.envsync.tmp`.
//! 4. Rename to final path (atomic on POSIX); remove the tmp on failure.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use envsync_core::{AgentConfig, LocalName};
use envsync_renderer::{ConfigContext, Renderer};

use crate::error::{io_err, SyncError};

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped: rendered content matches what is on disk.
    Unchanged { path: PathBuf },
}

/// Atomically replace `path` with `content` unless it already matches.
pub fn atomic_write(path: &Path, content: &str) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.envsync.tmp", path.display()));
    atomic_write_with_tmp(path, content, &tmp)
}

fn atomic_write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<WriteResult, SyncError> {
    let normalized = content.replace("\r\n", "\n");
    let content = normalized.as_str();

    match std::fs::read_to_string(path) {
        Ok(existing) if existing == content => {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(path, err)),
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

/// Render `puppet.conf` from `puppet.conf.base` plus one section per
/// environment and write it atomically.
pub fn write_environment_config(
    config: &AgentConfig,
    environments: &[LocalName],
) -> Result<WriteResult, SyncError> {
    let ctx = ConfigContext::from_base_file(&config.config_base_file(), environments)?;
    let content = Renderer::new()?.render_with_context(&ctx)?;
    atomic_write(&config.config_file(), &content)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("puppet.conf");
        let result = atomic_write(&path, "hello").unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert!(path.exists());
    }

    #[test]
    fn second_write_same_content_returns_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("puppet.conf");
        atomic_write(&path, "same content").unwrap();
        let result = atomic_write(&path, "same content").unwrap();
        assert!(matches!(result, WriteResult::Unchanged { .. }));
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("puppet.conf");
        atomic_write(&path, "data").unwrap();
        let tmp_path = PathBuf::from(format!("{}.envsync.tmp", path.display()));
        assert!(!tmp_path.exists(), ".envsync.tmp must be cleaned up");
    }

    #[test]
    fn crlf_content_is_normalised() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("puppet.conf");
        atomic_write(&path, "line1\r\nline2\r\n").unwrap();
        let second = atomic_write(&path, "line1\nline2\n").unwrap();
        assert!(matches!(second, WriteResult::Unchanged { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "line1\nline2\n");
    }

    #[test]
    fn environment_config_includes_base_and_sections() {
        let tmp = TempDir::new().unwrap();
        let config = AgentConfig::rooted_at(tmp.path(), "unused");
        fs::write(config.config_base_file(), "[main]\nssldir=/var/lib/puppet/ssl\n").unwrap();

        let envs = vec![LocalName::from("masterbranch"), LocalName::from("branch1")];
        let result = write_environment_config(&config, &envs).expect("write");
        assert!(matches!(result, WriteResult::Written { .. }));

        let text = fs::read_to_string(config.config_file()).unwrap();
        assert!(text.starts_with("[main]\nssldir=/var/lib/puppet/ssl\n[masterbranch]\n"));
        assert!(text.contains("manifest=$confdir/environments/branch1/manifests/site.pp"));
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();

        let path = readonly_dir.join("puppet.conf");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("puppet.conf.envsync.tmp");

        let result = atomic_write_with_tmp(&path, "new content", &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Root ignores directory permissions; only assert when the rename failed.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
            assert!(!tmp_path.exists(), ".envsync.tmp should be cleaned up");
        }
    }
}
