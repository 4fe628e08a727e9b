//! Project source discovery.
//!
//! Walks the configured model and seed directories and collects raw model
//! SQL, seed CSV paths, and YAML property files. Nothing is compiled here;
//! the manifest takes these parts and turns them into nodes.

use std::path::{Path, PathBuf};

use glob::glob;
use serde::Deserialize;

use crate::config::ProjectConfig;
use crate::error::{QuarryError, Result};

/// A raw model source file: `<model_paths>/<name>.sql`.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub name: String,
    pub path: PathBuf,
    pub raw_sql: String,
}

/// A seed CSV file: `<seed_paths>/<name>.csv`.
#[derive(Debug, Clone)]
pub struct SeedSource {
    pub name: String,
    pub path: PathBuf,
}

/// Model visibility, settable from property files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub name: String,
    pub owner: Option<Owner>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// One versioned definition of a model.
///
/// `defined_in` names the backing source file; it defaults to
/// `<name>_v<v>`, falling back to `<name>` when that file exists.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionSpec {
    pub v: u32,
    pub defined_in: Option<String>,
}

/// Per-model metadata declared in a YAML property file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelProperties {
    pub name: String,
    pub description: Option<String>,
    pub access: Option<Access>,
    pub group: Option<String>,
    pub latest_version: Option<u32>,
    #[serde(default)]
    pub versions: Vec<VersionSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PropertiesFile {
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    models: Vec<ModelProperties>,
}

/// All source files of a project, loaded but not yet compiled.
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub root: PathBuf,
    pub models: Vec<ModelSource>,
    pub seeds: Vec<SeedSource>,
    pub groups: Vec<Group>,
    pub properties: Vec<ModelProperties>,
}

impl Project {
    pub fn load<P: AsRef<Path>>(root: P, config: &ProjectConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut project = Project {
            root: root.clone(),
            ..Default::default()
        };
        for dir in &config.model_paths {
            project.load_model_dir(&root.join(dir))?;
        }
        for dir in &config.seed_paths {
            project.load_seed_dir(&root.join(dir))?;
        }
        tracing::debug!(
            models = project.models.len(),
            seeds = project.seeds.len(),
            properties = project.properties.len(),
            "loaded project sources"
        );
        Ok(project)
    }

    fn load_model_dir(&mut self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            tracing::debug!(dir = %dir.display(), "model directory missing, skipping");
            return Ok(());
        }
        for entry in glob(&format!("{}/*.sql", dir.display()))
            .map_err(|e| QuarryError::Other(e.into()))?
            .flatten()
        {
            self.load_model_file(&entry)?;
        }
        for pattern in ["yml", "yaml"] {
            for entry in glob(&format!("{}/*.{pattern}", dir.display()))
                .map_err(|e| QuarryError::Other(e.into()))?
                .flatten()
            {
                self.load_properties_file(&entry)?;
            }
        }
        Ok(())
    }

    fn load_model_file(&mut self, path: &Path) -> Result<()> {
        let name = file_stem(path)?;
        if self.models.iter().any(|m| m.name == name) {
            return Err(QuarryError::Validation(format!(
                "duplicate model source '{name}'"
            )));
        }
        let raw_sql = std::fs::read_to_string(path)?;
        self.models.push(ModelSource {
            name,
            path: path.to_path_buf(),
            raw_sql,
        });
        Ok(())
    }

    fn load_properties_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        let file: PropertiesFile = serde_yaml::from_str(&contents)?;
        self.groups.extend(file.groups);
        self.properties.extend(file.models);
        Ok(())
    }

    fn load_seed_dir(&mut self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            tracing::debug!(dir = %dir.display(), "seed directory missing, skipping");
            return Ok(());
        }
        for entry in glob(&format!("{}/*.csv", dir.display()))
            .map_err(|e| QuarryError::Other(e.into()))?
            .flatten()
        {
            let name = file_stem(&entry)?;
            if self.seeds.iter().any(|s| s.name == name) {
                return Err(QuarryError::Validation(format!("duplicate seed '{name}'")));
            }
            self.seeds.push(SeedSource { name, path: entry });
        }
        Ok(())
    }
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            QuarryError::Validation(format!("unusable source file name: {}", path.display()))
        })
}
