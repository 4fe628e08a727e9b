use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quarry::error::QuarryError;
use quarry::runner::{Cli, Runner};

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr so stdout stays clean for data output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli
        .project_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let runner = match Runner::from_dir(&root) {
        Ok(runner) => runner,
        Err(e) => exit_with(e),
    };
    if let Err(e) = runner.execute(cli).await {
        exit_with(e);
    }
}

fn exit_with(e: QuarryError) -> ! {
    eprintln!("Error: {e}");
    std::process::exit(1)
}
