//! Domain types shared by the engine, the agent and the CLI.
//!
//! Branch names stay plain `String`s (they are transient, recomputed on every
//! enumeration); the directory-side name gets a newtype so the two are never
//! confused when computing what to keep.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Filesystem-safe directory name of an environment under `environments/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalName(pub String);

impl fmt::Display for LocalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for LocalName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LocalName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for LocalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Branch patterns
// ---------------------------------------------------------------------------

/// One entry of an ignore/remove rule set.
///
/// `/body` and `/body/` are regex bodies; everything else matches the whole
/// branch name literally (same as `^name$`).
#[derive(Debug, Clone)]
pub enum BranchPattern {
    Exact(String),
    Regex(Regex),
}

impl BranchPattern {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        match raw.strip_prefix('/') {
            Some(body) => {
                let body = body.strip_suffix('/').unwrap_or(body);
                Regex::new(body)
                    .map(BranchPattern::Regex)
                    .map_err(|source| ConfigError::Pattern {
                        pattern: raw.to_string(),
                        source,
                    })
            }
            None => Ok(BranchPattern::Exact(raw.to_string())),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            BranchPattern::Exact(exact) => exact == name,
            BranchPattern::Regex(re) => re.is_match(name),
        }
    }
}

impl fmt::Display for BranchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchPattern::Exact(exact) => f.write_str(exact),
            BranchPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Ordered, immutable set of [`BranchPattern`]s.
#[derive(Debug, Clone, Default)]
pub struct BranchRules(Vec<BranchPattern>);

impl BranchRules {
    /// Parse a comma-separated pattern list. Blank entries are skipped.
    pub fn parse_list(list: &str) -> Result<Self, ConfigError> {
        Self::parse_items(list.split(','))
    }

    fn parse_items<'a>(items: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let patterns = items
            .into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(BranchPattern::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(patterns))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.0.iter().any(|pattern| pattern.matches(name))
    }

    pub fn patterns(&self) -> &[BranchPattern] {
        &self.0
    }
}

/// Accepts either a YAML sequence or a single comma-separated string.
impl<'de> Deserialize<'de> for BranchRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<String>),
            Joined(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::List(items) => BranchRules::parse_items(items.iter().map(String::as_str)),
            Raw::Joined(joined) => BranchRules::parse_list(&joined),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
