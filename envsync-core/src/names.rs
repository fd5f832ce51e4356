//! Remote branch name → environment directory name.
//!
//! The mapping is deterministic but not injective: `a/b` and `a__b` both map
//! to `a__b`, `a-b` and `a_b` both map to `a_b`. Colliding branches share one
//! environment directory; the last checkout wins.

use crate::types::LocalName;

/// Names that would clash with tool-internal paths or confuse the
/// generated environment config.
pub const RESERVED_NAMES: &[&str] = &["master", "user", "agent", "main"];

/// Suffix appended to reserved names.
pub const RESERVED_SUFFIX: &str = "branch";

/// Strip a `remotes/<remote>/` or `origin/` prefix and a leading `* ` marker.
pub fn remote_branch_name(branch: &str) -> &str {
    let branch = branch.trim();
    let branch = branch.strip_prefix("* ").unwrap_or(branch);
    if let Some(rest) = branch.strip_prefix("remotes/") {
        return rest.split_once('/').map(|(_, name)| name).unwrap_or(rest);
    }
    branch.strip_prefix("origin/").unwrap_or(branch)
}

/// Map a remote branch name to its environment directory name.
pub fn to_local_name(branch: &str) -> LocalName {
    let name = remote_branch_name(branch)
        .replace('/', "__")
        .replace('-', "_");
    if RESERVED_NAMES.contains(&name.as_str()) {
        LocalName(format!("{name}{RESERVED_SUFFIX}"))
    } else {
        LocalName(name)
    }
}
