//! Enhancer configuration.
//!
//! Project-level config: `.watdocs/config.yaml` (every field optional).
//!
//! Resolution: explicit path (CLI `--config`) → project file → defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::editor::{EditorFlavor, HeightPolicy};
use crate::lsp::loader::AssetSet;

/// Default location of the project config, relative to the working directory.
pub const PROJECT_CONFIG: &str = ".watdocs/config.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Where diagnostics are switched off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Pages whose path contains any of these hold deliberately incomplete
    /// snippets.
    pub suppress_on_paths: Vec<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            suppress_on_paths: vec!["/instructions/".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancerConfig {
    /// Language tag of the blocks to enhance.
    pub language: String,
    pub aliases: Vec<String>,
    pub flavor: EditorFlavor,
    pub debounce_ms: u64,
    pub editor: HeightPolicy,
    pub diagnostics: DiagnosticsConfig,
    pub assets: AssetSet,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            language: "wat".into(),
            aliases: vec!["wast".into()],
            flavor: EditorFlavor::default(),
            debounce_ms: 300,
            editor: HeightPolicy::default(),
            diagnostics: DiagnosticsConfig::default(),
            assets: AssetSet::default(),
        }
    }
}

impl EnhancerConfig {
    /// Load the project config, falling back to defaults when it is missing
    /// or unreadable.
    pub fn load() -> Self {
        let path = Path::new(PROJECT_CONFIG);
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{e}; using defaults");
                Self::default()
            }
        }
    }

    /// Load a specific file. Errors are reported, not defaulted.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // an empty file deserializes as null
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Whether pages at `path` get diagnostics.
    pub fn diagnostics_enabled_for(&self, path: &str) -> bool {
        !self
            .diagnostics
            .suppress_on_paths
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
    }
}
