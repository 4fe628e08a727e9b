//! Command dispatch.
//!
//! The [`Runner`] owns a project directory, its config, and a log sink;
//! `seed`, `build`, and `show` all go through it. The binary and the
//! functional test harness share this entry point so captured output is
//! exactly the CLI's output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::backends::{BackendConnection, DuckDbBackend};
use crate::compiler::Compiler;
use crate::config::ProjectConfig;
use crate::error::{QuarryError, Result};
use crate::manifest::{Manifest, Node};
use crate::output::{render_json, render_table, LogSink, OutputFormat};
use crate::project::Project;
use crate::template::Materialization;

#[derive(Debug, Parser)]
#[command(name = "quarry", version, about = "Data transformation CLI for DuckDB")]
pub struct Cli {
    /// Project directory (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Suppress status output, leaving only data.
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load seed CSV files into the target schema.
    Seed,
    /// Run seeds, then materialize every model in dependency order.
    Build,
    /// Preview a node or ad hoc query.
    Show(ShowArgs),
}

#[derive(Debug, Args, Default)]
pub struct ShowArgs {
    /// Whitespace-separated node names to preview.
    #[arg(long)]
    pub select: Option<String>,

    /// Ad hoc query text, templated against the project's models.
    #[arg(long)]
    pub inline: Option<String>,

    /// Ad hoc query text executed verbatim, without templating.
    #[arg(long = "inline-direct")]
    pub inline_direct: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Row limit; -1 disables the limit.
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

/// Outcome of one invocation, one entry per touched node.
#[derive(Debug, Default)]
pub struct RunResults {
    pub results: Vec<NodeResult>,
}

#[derive(Debug)]
pub struct NodeResult {
    pub node: String,
}

pub struct Runner {
    root: PathBuf,
    config: ProjectConfig,
    sink: Arc<LogSink>,
}

impl Runner {
    /// Runner for interactive use: output echoes to stdout.
    pub fn from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::with_sink(root, Arc::new(LogSink::new(true)))
    }

    pub fn with_sink<P: AsRef<Path>>(root: P, sink: Arc<LogSink>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let config = ProjectConfig::load(&root)?;
        Ok(Self { root, config, sink })
    }

    /// Parse an argument list (without the program name) and execute it.
    pub async fn run(&self, args: &[&str]) -> Result<RunResults> {
        let argv = std::iter::once("quarry").chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv).map_err(|e| QuarryError::Usage(e.to_string()))?;
        self.execute(cli).await
    }

    pub async fn execute(&self, cli: Cli) -> Result<RunResults> {
        self.sink.set_quiet(cli.quiet);
        self.sink
            .status(&format!("Running with quarry={}", env!("CARGO_PKG_VERSION")));
        match cli.command {
            Command::Seed => self.cmd_seed().await,
            Command::Build => self.cmd_build().await,
            Command::Show(args) => self.cmd_show(args).await,
        }
    }

    fn backend(&self) -> DuckDbBackend {
        DuckDbBackend::new(self.root.join(&self.config.database.path))
    }

    async fn cmd_seed(&self) -> Result<RunResults> {
        let project = Project::load(&self.root, &self.config)?;
        let manifest = Manifest::build(&project, &self.config)?;
        let backend = self.backend();
        let mut results = RunResults::default();
        self.run_seeds(&backend, &manifest, &mut results).await?;
        Ok(results)
    }

    async fn run_seeds(
        &self,
        backend: &DuckDbBackend,
        manifest: &Manifest,
        results: &mut RunResults,
    ) -> Result<()> {
        backend
            .execute_batch(&format!(
                "create schema if not exists {};",
                self.config.database.schema
            ))
            .await?;
        for node in manifest.nodes.values() {
            let Node::Seed(seed) = node else { continue };
            let path = escape_sql_string(&seed.path.display().to_string());
            let ddl = format!(
                "create or replace table {} as select * from read_csv('{path}');",
                seed.relation
            );
            backend.execute_batch(&ddl).await?;
            self.sink.status(&format!("Seeded {}", seed.relation));
            results.results.push(NodeResult {
                node: seed.name.clone(),
            });
        }
        Ok(())
    }

    async fn cmd_build(&self) -> Result<RunResults> {
        let project = Project::load(&self.root, &self.config)?;
        let manifest = Manifest::build(&project, &self.config)?;
        let backend = self.backend();
        let mut results = RunResults::default();
        self.run_seeds(&backend, &manifest, &mut results).await?;

        let compiler = Compiler::new(&manifest);
        for model in manifest.build_order()? {
            if model.materialized == Materialization::Ephemeral {
                tracing::debug!(node = %model.display_name, "ephemeral model, not materialized");
                continue;
            }
            let keyword = match model.materialized {
                Materialization::View => "view",
                _ => "table",
            };
            let sql = compiler.compile_model(model)?;
            let ddl = format!(
                "create or replace {keyword} {} as (\n{sql}\n);",
                model.relation
            );
            backend.execute_batch(&ddl).await?;
            self.sink
                .status(&format!("Built {} as {keyword}", model.display_name));
            results.results.push(NodeResult {
                node: model.display_name.clone(),
            });
        }
        Ok(results)
    }

    async fn cmd_show(&self, args: ShowArgs) -> Result<RunResults> {
        if args.select.is_none() && args.inline.is_none() && args.inline_direct.is_none() {
            return Err(QuarryError::Usage(
                "Either --select or --inline must be passed to show".to_string(),
            ));
        }
        let limit = args.limit.unwrap_or(self.config.preview.limit);
        let backend = self.backend();
        let mut results = RunResults::default();

        if let Some(raw) = &args.inline_direct {
            // No templating, no manifest: raw text against qualified names.
            let result = backend.execute_sql(&with_limit(raw, limit)).await?;
            self.emit_preview(None, &result, args.output, &mut results)?;
            return Ok(results);
        }

        let project = Project::load(&self.root, &self.config)?;
        let manifest = Manifest::build(&project, &self.config)?;
        let compiler = Compiler::new(&manifest);

        if let Some(raw) = &args.inline {
            let sql = compiler.compile_inline(raw)?;
            let result = backend.execute_sql(&with_limit(&sql, limit)).await?;
            self.emit_preview(None, &result, args.output, &mut results)?;
            return Ok(results);
        }

        let selector = args.select.as_deref().unwrap_or_default();
        let mut selected = Vec::new();
        for token in selector.split_whitespace() {
            let nodes = manifest.select(token);
            if nodes.is_empty() {
                return Err(QuarryError::Validation(format!(
                    "no nodes match selection criteria '{token}'"
                )));
            }
            selected.extend(nodes);
        }
        if selected.is_empty() {
            return Err(QuarryError::Validation(format!(
                "no nodes match selection criteria '{selector}'"
            )));
        }
        for node in selected {
            let sql = match node {
                Node::Seed(seed) => format!("select * from {}", seed.relation),
                Node::Model(model) => compiler.compile_model(model)?,
            };
            let result = backend.execute_sql(&with_limit(&sql, limit)).await?;
            self.emit_preview(Some(node.display_name()), &result, args.output, &mut results)?;
        }
        Ok(results)
    }

    fn emit_preview(
        &self,
        display: Option<&str>,
        result: &crate::executor::QueryResult,
        output: OutputFormat,
        results: &mut RunResults,
    ) -> Result<()> {
        let name = display.unwrap_or("inline");
        match output {
            OutputFormat::Text => {
                let banner = match display {
                    Some(d) => format!("Previewing node '{d}':"),
                    None => "Previewing inline node:".to_string(),
                };
                self.sink.status(&banner);
                self.sink.data(&render_table(result));
            }
            OutputFormat::Json => self.sink.data(&render_json(name, result)?),
        }
        results.results.push(NodeResult {
            node: name.to_string(),
        });
        Ok(())
    }
}

/// Wrap a preview query in a row limit; a negative limit disables it.
fn with_limit(sql: &str, limit: i64) -> String {
    if limit < 0 {
        sql.to_string()
    } else {
        format!("select * from (\n{sql}\n) as quarry_limit_subq limit {limit}")
    }
}

fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Execute an argument list against a project directory, capturing all
/// user-visible output instead of printing it.
pub async fn run_and_capture<P: AsRef<Path>>(
    root: P,
    args: &[&str],
) -> Result<(RunResults, String)> {
    let sink = Arc::new(LogSink::new(false));
    let runner = Runner::with_sink(root, sink.clone())?;
    let results = runner.run(args).await?;
    Ok((results, sink.captured()))
}
