pub mod backends;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod manifest;
pub mod output;
pub mod project;
pub mod runner;
pub mod template;

use std::path::Path;

use crate::error::Result;

/// Load a project directory into its config and compiled manifest.
pub fn load_project<P: AsRef<Path>>(root: P) -> Result<(config::ProjectConfig, manifest::Manifest)> {
    let config = config::ProjectConfig::load(&root)?;
    let project = project::Project::load(&root, &config)?;
    let manifest = manifest::Manifest::build(&project, &config)?;
    Ok((config, manifest))
}

pub use crate::backends::{BackendConnection, DuckDbBackend};
pub use crate::compiler::Compiler;
pub use crate::config::ProjectConfig;
pub use crate::error::QuarryError;
pub use crate::executor::QueryResult;
pub use crate::manifest::Manifest;
pub use crate::output::{LogSink, OutputFormat};
pub use crate::project::Project;
pub use crate::runner::{run_and_capture, RunResults, Runner};
