//! Parser options
//!
//! Loaded from code, from a YAML file, or from environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;
pub const DEFAULT_MAX_SUBSTITUTION_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Directory relative includes in string input resolve against;
    /// the current directory when unset
    pub base_dir: Option<PathBuf>,
    pub max_include_depth: usize,
    pub max_substitution_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            base_dir: None,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            max_substitution_depth: DEFAULT_MAX_SUBSTITUTION_DEPTH,
        }
    }
}

impl ParseOptions {
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Options from `OBJGRAPH_BASE_DIR` and `OBJGRAPH_MAX_INCLUDE_DEPTH`,
    /// falling back to defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(dir) = std::env::var("OBJGRAPH_BASE_DIR") {
            options.base_dir = Some(PathBuf::from(dir));
        }
        if let Some(depth) = std::env::var("OBJGRAPH_MAX_INCLUDE_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            options.max_include_depth = depth;
        }
        options
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse parser options YAML")
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let options = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid parser options in {}", path.display()))?;
        info!("Loaded parser options from {}", path.display());
        Ok(options)
    }

    /// Directory relative includes from in-memory input resolve against
    pub(crate) fn string_base_dir(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
