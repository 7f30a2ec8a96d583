use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod archive;
mod auth;
mod command;
mod diff;
mod manifest;
mod project;
mod sync;

use api::TestLevel;

/// metasync - diff and deploy local source files against a remote metadata org
#[derive(Parser)]
#[command(name = "metasync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a local file with the org's copy and deploy it on confirmation
    Deploy {
        /// The file to deploy
        file: PathBuf,

        /// Validate the deployment without applying it
        #[arg(long)]
        check_only: bool,

        /// Test execution level gating the deployment
        #[arg(long, value_enum, default_value = "run-specified-tests")]
        test_level: TestLevel,

        /// Test to run when the level is run-specified-tests (repeatable)
        #[arg(long = "run-test")]
        run_tests: Vec<String>,
    },
    /// Show stored authorizations and the resolved project target
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Deploy {
            file,
            check_only,
            test_level,
            run_tests,
        } => command::deploy::run_deploy(file, check_only, test_level, run_tests).await,
        Commands::Status => command::status::run_status().await,
    }
}
