//! Branch enumeration: live branches from the mirror, environment
//! directories from disk. Both go through the same ignore filter.

use std::io::ErrorKind;
use std::path::Path;

use envsync_core::BranchRules;

use crate::error::{io_err, SyncError};
use crate::mirror::Mirror;

/// List live branches in the mirror, ignore rules applied.
pub fn list_remote_branches(mirror: &Mirror, ignore: &BranchRules) -> Result<Vec<String>, SyncError> {
    let listing = mirror.git().args(["branch", "-a", "--no-color"]).run()?;
    Ok(strip_ignored(parse_branch_listing(&listing), ignore))
}

/// Parse `git branch -a` output.
///
/// Drops the current-branch marker, detached/unborn placeholders and
/// symbolic `HEAD -> ...` lines. A mirror only holds `refs/heads/*`, so
/// names are kept exactly as listed; `origin/x` is a branch of its own.
pub fn parse_branch_listing(listing: &str) -> Vec<String> {
    let mut branches: Vec<String> = Vec::new();
    for line in listing.lines() {
        let line = line.trim().trim_start_matches('*').trim();
        if line.is_empty() || is_placeholder(line) || line.contains(" -> ") {
            continue;
        }
        if line == "HEAD" || branches.iter().any(|b| b == line) {
            continue;
        }
        branches.push(line.to_string());
    }
    branches
}

fn is_placeholder(line: &str) -> bool {
    line.starts_with('(')
        || line.contains("(no branch)")
        || line.contains("detached from")
        || line.contains("detached at")
}

/// List entries directly under the environments root, ignore rules applied.
///
/// A missing root is an empty list. Hidden entries are not environments.
pub fn list_environment_dirs(root: &Path, ignore: &BranchRules) -> Result<Vec<String>, SyncError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(io_err(root, err)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(root, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(strip_ignored(names, ignore))
}

/// Drop every name matching `rules`.
pub fn strip_ignored(names: Vec<String>, rules: &BranchRules) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| !rules.matches(name))
        .collect()
}
