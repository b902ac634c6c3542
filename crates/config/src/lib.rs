//! Configuration loading, validation, and management for Promptloom.
//!
//! Loads engine settings from a TOML file with environment variable
//! overrides (`PROMPTLOOM_*`). Validates all settings before the engine
//! accepts them. The pipeline itself performs no I/O; this crate is the
//! one place a file is read.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Engine settings for the prompt-compilation pipeline.
///
/// Maps directly to a `promptloom.toml` file:
///
/// ```toml
/// default_template = "chatml"
/// scan_depth = 4
/// max_template_len = 65536
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Template used when a prompt build does not request one by name
    #[serde(default = "default_template")]
    pub default_template: String,

    /// How many recent messages feed the lorebook scan text
    #[serde(default = "default_scan_depth")]
    pub scan_depth: usize,

    /// Upper bound on registered template source size, in bytes. Guards
    /// against pathological caller-supplied templates.
    #[serde(default = "default_max_template_len")]
    pub max_template_len: usize,
}

fn default_template() -> String {
    "chatml".into()
}
fn default_scan_depth() -> usize {
    4
}
fn default_max_template_len() -> usize {
    64 * 1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_template: default_template(),
            scan_depth: default_scan_depth(),
            max_template_len: default_max_template_len(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file, apply environment overrides, and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(template = %config.default_template, scan_depth = config.scan_depth, "Config loaded");
        Ok(config)
    }

    /// Environment overrides: `PROMPTLOOM_DEFAULT_TEMPLATE`,
    /// `PROMPTLOOM_SCAN_DEPTH`. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var("PROMPTLOOM_DEFAULT_TEMPLATE") {
            if !name.trim().is_empty() {
                self.default_template = name;
            }
        }
        if let Ok(depth) = std::env::var("PROMPTLOOM_SCAN_DEPTH") {
            if let Ok(depth) = depth.parse() {
                self.scan_depth = depth;
            }
        }
    }

    /// Reject settings the pipeline cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_template.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_template must not be empty".into(),
            ));
        }
        if self.scan_depth == 0 {
            return Err(ConfigError::ValidationError(
                "scan_depth must be at least 1".into(),
            ));
        }
        if self.max_template_len == 0 {
            return Err(ConfigError::ValidationError(
                "max_template_len must be nonzero".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration failures, reported with the offending path or field.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}
