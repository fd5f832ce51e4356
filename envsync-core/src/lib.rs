//! envsync core library: configuration, branch rules, name mapping, errors.
//!
//! - [`config`]: [`AgentConfig`] and its YAML loader
//! - [`types`]: [`LocalName`], [`BranchPattern`], [`BranchRules`]
//! - [`names`]: branch name → environment directory name
//! - [`validate`]: request-boundary argument checks
//! - [`error`]: [`ConfigError`], [`ValidationError`]

pub mod config;
pub mod error;
pub mod names;
pub mod types;
pub mod validate;

pub use config::AgentConfig;
pub use error::{ConfigError, ValidationError};
pub use names::to_local_name;
pub use types::{BranchPattern, BranchRules, LocalName};
