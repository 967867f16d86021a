//! # Config Module
//!
//! The curation configuration: which stages run, in what order, with which
//! options. It is loaded once when the pipeline is assembled and each
//! stage receives its own [`StageOptions`] by value.
//!
//! ## Example
//! ```yaml
//! input: data/original_raw
//! output: data/final
//! stages:
//!   - kind: dedupe
//!     options: { threshold: 10, oracle: perceptual }
//!   - kind: person_detector
//!     options: { model: annotations/yolo.json, confidence_threshold: 0.5 }
//! ```

mod options;

pub use options::{StageOptions, ON_ERROR_KEY};

use crate::core::stage::StageKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Complete configuration of one curation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationConfig {
    /// Input collection root (the CLI argument takes precedence)
    #[serde(default)]
    pub input: Option<PathBuf>,
    /// Output directory for survivors (the CLI flag takes precedence)
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Run decide phases on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// File extensions treated as images (None = common formats)
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    /// Stages in execution order
    pub stages: Vec<StageConfig>,
}

fn default_parallel() -> bool {
    true
}

/// One configured stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub kind: StageKind,
    /// Report name; defaults to the kind's name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: StageOptions,
}

impl StageConfig {
    /// Name used in reports and diagnostics
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.default_name())
    }
}

impl CurationConfig {
    /// Load and validate a YAML configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML configuration text
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CurationConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks. Stage options are validated later by each stage's setup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }

        let mut names = HashSet::new();
        for stage in &self.stages {
            if !names.insert(stage.display_name()) {
                return Err(ConfigError::DuplicateStageName {
                    name: stage.display_name().to_string(),
                });
            }
        }

        Ok(())
    }
}
