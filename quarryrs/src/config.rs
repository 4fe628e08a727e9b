//! Project configuration.
//!
//! Every quarry project carries a `quarry.toml` at its root naming the
//! project, the source directories, and the target database.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};

/// Root configuration structure, one per project directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name, used for diagnostics only.
    pub name: String,

    /// Directories scanned for model sources and property files.
    pub model_paths: Vec<String>,

    /// Directories scanned for seed CSV files.
    pub seed_paths: Vec<String>,

    pub database: DatabaseConfig,
    pub preview: PreviewConfig,
}

/// Target database settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// DuckDB database file, relative to the project root.
    pub path: String,
    /// Schema every relation is created in.
    pub schema: String,
}

/// Preview (`show`) settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Default row limit when `--limit` is not given.
    pub limit: i64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "quarry".to_string(),
            model_paths: vec!["models".to_string()],
            seed_paths: vec!["seeds".to_string()],
            database: DatabaseConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "quarry.duckdb".to_string(),
            schema: "main".to_string(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { limit: 5 }
    }
}

impl ProjectConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| QuarryError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| QuarryError::Config(format!("failed to parse config: {e}")))
    }

    /// Load the config for a project directory.
    ///
    /// The `QUARRY_CONFIG` environment variable overrides the default
    /// `<dir>/quarry.toml` location.
    pub fn load<P: AsRef<Path>>(project_dir: P) -> Result<Self> {
        if let Ok(path) = std::env::var("QUARRY_CONFIG") {
            tracing::info!(path = %path, "loading config from QUARRY_CONFIG");
            return Self::from_file(&path);
        }
        let path = project_dir.as_ref().join("quarry.toml");
        if !path.exists() {
            return Err(QuarryError::Config(format!(
                "no quarry.toml found in {}",
                project_dir.as_ref().display()
            )));
        }
        tracing::debug!(path = %path.display(), "loading project config");
        Self::from_file(path)
    }
}
