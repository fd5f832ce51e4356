//! Agent configuration.
//!
//! # File layout
//!
//! ```yaml
//! directory: /etc/puppet
//! repository: git@git.example.com:ops/puppet.git
//! clone_at: /var/lib/envsync/puppet.git   # default: <directory>/puppet.git
//! ignore_branches: leave_me_alone,/^wip-/
//! remove_branches: [ "/^must" ]
//! run_after_checkout: librarian-puppet install
//! ssh_key: /etc/envsync/id_rsa
//! rewrite_config: yes
//! ```
//!
//! Every key is optional. Pattern lists accept a sequence or a single
//! comma-separated string (see [`BranchRules`]).
//!
//! # API pattern
//!
//! - `load_at(path)`: explicit file; missing file is an error.
//! - `load(explicit)`: resolves `explicit` → `$ENVSYNC_CONFIG` → [`DEFAULT_CONFIG_PATH`];
//!   a missing file at the default location yields [`AgentConfig::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::types::BranchRules;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/envsync/agent.yaml";
pub const CONFIG_ENV_VAR: &str = "ENVSYNC_CONFIG";

pub const DEFAULT_DIRECTORY: &str = "/etc/puppet";
pub const DEFAULT_REPOSITORY: &str = "http://git/git/puppet";
pub const DEFAULT_LOCK_FILE: &str = "/tmp/envsync.lock";
pub const DEFAULT_SOCKET: &str = "/run/envsync/agent.sock";

pub const MIRROR_DIR_NAME: &str = "puppet.git";
pub const ENVIRONMENTS_DIR_NAME: &str = "environments";
pub const CONFIG_FILE_NAME: &str = "puppet.conf";
pub const CONFIG_BASE_FILE_NAME: &str = "puppet.conf.base";

// ---------------------------------------------------------------------------
// 1. Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Root of the managed tree.
    pub directory: PathBuf,
    /// Remote repository URL.
    pub repository: String,
    /// Mirror location override.
    pub clone_at: Option<PathBuf>,
    /// Branches hidden from checkout *and* cleanup.
    pub ignore_branches: BranchRules,
    /// Branches never checked out, but removed from disk if present.
    pub remove_branches: BranchRules,
    /// Shell command run inside an environment after each checkout.
    pub run_after_checkout: Option<String>,
    /// Private key enabling the ssh wrapper for mirror network operations.
    pub ssh_key: Option<PathBuf>,
    #[serde(deserialize_with = "boolish")]
    pub rewrite_config: bool,
    pub lock_file: PathBuf,
    pub socket: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            repository: DEFAULT_REPOSITORY.to_string(),
            clone_at: None,
            ignore_branches: BranchRules::default(),
            remove_branches: BranchRules::default(),
            run_after_checkout: None,
            ssh_key: None,
            rewrite_config: true,
            lock_file: PathBuf::from(DEFAULT_LOCK_FILE),
            socket: PathBuf::from(DEFAULT_SOCKET),
        }
    }
}

impl AgentConfig {
    /// Defaults rooted at `directory`, with the lock file inside it.
    /// Handy for tests and ad-hoc runs.
    pub fn rooted_at(directory: impl Into<PathBuf>, repository: impl Into<String>) -> Self {
        let directory = directory.into();
        Self {
            lock_file: directory.join(".envsync.lock"),
            socket: directory.join(".envsync.sock"),
            directory,
            repository: repository.into(),
            ..Self::default()
        }
    }

    /// `<clone_at>` or `<directory>/puppet.git`.
    pub fn mirror_dir(&self) -> PathBuf {
        self.clone_at
            .clone()
            .unwrap_or_else(|| self.directory.join(MIRROR_DIR_NAME))
    }

    /// `<directory>/environments`
    pub fn environments_dir(&self) -> PathBuf {
        self.directory.join(ENVIRONMENTS_DIR_NAME)
    }

    /// `<directory>/puppet.conf`
    pub fn config_file(&self) -> PathBuf {
        self.directory.join(CONFIG_FILE_NAME)
    }

    /// `<directory>/puppet.conf.base`
    pub fn config_base_file(&self) -> PathBuf {
        self.directory.join(CONFIG_BASE_FILE_NAME)
    }

    /// A blank hook command counts as unset.
    pub fn after_checkout_hook(&self) -> Option<&str> {
        self.run_after_checkout
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load configuration from an explicit file.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<AgentConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(AgentConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve and load configuration. See the module docs for lookup order.
pub fn load(explicit: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_at(path);
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return load_at(Path::new(&path));
    }
    let default = Path::new(DEFAULT_CONFIG_PATH);
    if default.exists() {
        load_at(default)
    } else {
        Ok(AgentConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn boolish<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Int(i) => Ok(i != 0),
        Raw::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" | "on" => Ok(true),
            "no" | "false" | "0" | "off" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean-ish value, got '{other}'"
            ))),
        },
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
