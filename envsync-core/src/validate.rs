//! Request-boundary validation for `update` arguments.

use crate::error::ValidationError;

const UNSAFE_CHARS: &[char] = &['`', '$', ';', '|', '&', '>', '<'];

fn is_shell_safe(value: &str) -> bool {
    !value.starts_with('-')
        && !value.chars().any(|c| UNSAFE_CHARS.contains(&c) || c.is_control())
}

/// A branch must be non-empty and shell safe.
pub fn validate_branch(branch: &str) -> Result<(), ValidationError> {
    if branch.trim().is_empty() {
        return Err(ValidationError::Empty { field: "branch" });
    }
    if !is_shell_safe(branch) {
        return Err(ValidationError::Unsafe {
            field: "branch",
            value: branch.to_string(),
        });
    }
    Ok(())
}

/// An empty revision means "branch tip"; anything else must be shell safe.
pub fn validate_revision(revision: &str) -> Result<(), ValidationError> {
    if revision.is_empty() || is_shell_safe(revision) {
        return Ok(());
    }
    Err(ValidationError::Unsafe {
        field: "revision",
        value: revision.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_revision_is_accepted() {
        assert!(validate_revision("").is_ok());
    }

    #[test]
    fn blank_branch_is_rejected() {
        assert_eq!(
            validate_branch("  ").unwrap_err(),
            ValidationError::Empty { field: "branch" }
        );
    }
}
