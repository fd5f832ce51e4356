//! Template context: the base config text plus one entry per environment.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use envsync_core::LocalName;

use crate::error::RenderError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentCtx {
    pub name: String,
}

/// Rendering payload for `puppet.conf`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigContext {
    /// Verbatim contents of `puppet.conf.base`, trailing newlines trimmed.
    pub base: Option<String>,
    pub environments: Vec<EnvironmentCtx>,
}

impl ConfigContext {
    pub fn new(base: Option<&str>, environments: &[LocalName]) -> Self {
        Self {
            base: base
                .map(|text| text.trim_end_matches(['\n', '\r']).to_string())
                .filter(|text| !text.is_empty()),
            environments: environments
                .iter()
                .map(|name| EnvironmentCtx {
                    name: name.0.clone(),
                })
                .collect(),
        }
    }

    /// Build a context, reading the base file if it exists.
    pub fn from_base_file(base: &Path, environments: &[LocalName]) -> Result<Self, RenderError> {
        let text = match std::fs::read_to_string(base) {
            Ok(text) => Some(text),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(source) => {
                return Err(RenderError::Io {
                    path: base.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self::new(text.as_deref(), environments))
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_base_file_is_none() {
        let dir = TempDir::new().unwrap();
        let ctx = ConfigContext::from_base_file(&dir.path().join("puppet.conf.base"), &[])
            .expect("context");
        assert!(ctx.base.is_none());
    }

    #[test]
    fn base_file_is_read_and_trimmed() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("puppet.conf.base");
        std::fs::write(&base, "[main]\nlogdir=/var/log/puppet\n\n").unwrap();
        let ctx = ConfigContext::from_base_file(&base, &[LocalName::from("branch1")])
            .expect("context");
        assert_eq!(ctx.base.as_deref(), Some("[main]\nlogdir=/var/log/puppet"));
        assert_eq!(ctx.environments[0].name, "branch1");
    }
}
