//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line interface for the MCP conformance/QA harness.
#[derive(Parser, Debug)]
#[command(
    name = "mcp-harness",
    version,
    about = "Conformance and quality-assurance harness for generated MCP servers"
)]
pub struct Cli {
    /// Path to a TOML/YAML config file layered under `MCP_HARNESS_*` env vars.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Named profile to load before applying `--config`/env overrides.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline against a single generated server directory.
    Test {
        /// Directory containing the entry source and module manifest.
        target: PathBuf,
        /// Name of the binary the compilation stage should produce/run.
        #[arg(long, default_value = "server")]
        binary_name: String,
        /// Report format: json, html, xml.
        #[arg(long)]
        format: Option<String>,
        /// Output path for the rendered report.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fan a batch of target directories across a bounded worker pool.
    Batch {
        /// Directories to run, each independently, through its own pipeline.
        targets: Vec<PathBuf>,
        /// Name of the binary each target's compilation stage should produce.
        #[arg(long, default_value = "server")]
        binary_name: String,
        /// Stop dispatching new work after the first pipeline failure.
        #[arg(long)]
        stop_on_failure: bool,
    },
    /// Post-analyse a previously saved pipeline/test record.
    Diagnose {
        /// Path to a JSON report produced by `test` or `batch`.
        #[arg(long)]
        from: PathBuf,
    },
    /// Manage named configuration profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// Save the current effective configuration under a profile name.
    Save {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print a saved profile's configuration.
    Load {
        name: String,
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// List every saved profile.
    List {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Remove a saved profile.
    Remove {
        name: String,
        #[arg(long)]
        path: Option<PathBuf>,
    },
}
