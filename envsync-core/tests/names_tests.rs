//! Name mapper and request validation properties.
//!
//! Each `#[case]` is isolated: no shared state.

use envsync_core::names::{to_local_name, RESERVED_NAMES};
use envsync_core::validate::{validate_branch, validate_revision};
use envsync_core::ValidationError;
use rstest::rstest;

// ---------------------------------------------------------------------------
// Name mapper
// ---------------------------------------------------------------------------

#[rstest]
#[case("master", "masterbranch")]
#[case("user", "userbranch")]
#[case("agent", "agentbranch")]
#[case("main", "mainbranch")]
fn reserved_names_get_suffix(#[case] branch: &str, #[case] expected: &str) {
    assert_eq!(to_local_name(branch).0, expected);
}

#[rstest]
#[case("foobar")]
#[case("branch1")]
#[case("production")]
#[case("masters")]
#[case("Main")]
fn plain_names_are_unchanged(#[case] branch: &str) {
    assert_eq!(to_local_name(branch).0, branch);
}

#[rstest]
#[case("feature/login", "feature__login")]
#[case("hot-fix", "hot_fix")]
#[case("team/a-b/c", "team__a_b__c")]
#[case("ma-in", "ma_in")]
fn separators_are_substituted(#[case] branch: &str, #[case] expected: &str) {
    let local = to_local_name(branch).0;
    assert_eq!(local, expected);
    assert!(!local.contains('/') && !local.contains('-'));
}

#[test]
fn reserved_check_runs_after_substitution() {
    // Nothing substitutes *into* a reserved name, but the suffix must still
    // apply to a name that only becomes reserved after prefix stripping.
    assert_eq!(to_local_name("remotes/origin/main").0, "mainbranch");
    for name in RESERVED_NAMES {
        assert!(to_local_name(name).0.ends_with("branch"));
    }
}

#[test]
fn mapping_is_not_injective() {
    assert_eq!(to_local_name("a-b"), to_local_name("a_b"));
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[rstest]
#[case("master")]
#[case("feature/login")]
#[case("release-1.2")]
fn safe_branches_pass(#[case] branch: &str) {
    assert!(validate_branch(branch).is_ok());
}

#[rstest]
#[case("master; rm -rf /")]
#[case("$(id)")]
#[case("`id`")]
#[case("a|b")]
#[case("a && b")]
#[case("a > b")]
#[case("--upload-pack=evil")]
#[case("line\nbreak")]
fn unsafe_branches_are_rejected(#[case] branch: &str) {
    assert!(matches!(
        validate_branch(branch),
        Err(ValidationError::Unsafe { field: "branch", .. })
    ));
}

#[test]
fn empty_branch_is_rejected() {
    assert_eq!(
        validate_branch("").unwrap_err(),
        ValidationError::Empty { field: "branch" }
    );
}

#[rstest]
#[case("")]
#[case("3f2a9c1")]
#[case("HEAD~1")]
fn safe_revisions_pass(#[case] revision: &str) {
    assert!(validate_revision(revision).is_ok());
}

#[test]
fn unsafe_revision_is_rejected() {
    assert!(validate_revision("abc;reboot").is_err());
}
