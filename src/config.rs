//! Configuration module for Modwire
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - Project configuration (./modwire.toml)
//! - The file named by the MODWIRE_CONFIG environment variable
//! - Command-line arguments (applied by the CLI layer)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// Colors and output settings
    pub colors: ColorsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Default output format (human, json, yaml)
    pub output: String,

    /// Var-files loaded before any given on the command line
    pub var_files: Vec<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: "human".to_string(),
            var_files: Vec::new(),
        }
    }
}

/// Color settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Whether colored output is enabled at all
    pub enabled: bool,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level override (trace, debug, info, warn, error)
    pub level: Option<String>,
}

impl LoggingConfig {
    /// Effective log filter. Repeated `-v` flags take precedence; the
    /// configured level only applies when no flag is given.
    pub fn filter(&self, verbosity: u8) -> &str {
        match verbosity {
            0 => self.level.as_deref().unwrap_or("warn"),
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

impl Config {
    /// Loads configuration, trying in order: the explicit path, the
    /// MODWIRE_CONFIG environment variable, then ./modwire.toml.
    pub fn load(explicit: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var("MODWIRE_CONFIG") {
            return Self::from_file(Path::new(&path));
        }
        let project = Path::new("modwire.toml");
        if project.exists() {
            return Self::from_file(project);
        }
        Ok(Self::default())
    }

    /// Loads configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }
}
