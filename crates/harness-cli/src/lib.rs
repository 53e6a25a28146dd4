//! `mcp-harness`: the binary entry point wiring the library crates into
//! runnable subcommands.
//!
//! Library crates never initialize a subscriber themselves; only this
//! crate's [`run`] does, exactly once.

pub mod cli;
pub mod commands;
pub mod config_loader;
pub mod output;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ProfileAction};
use harness_types::config::HarnessConfig;

/// Install the `tracing-subscriber` `fmt` layer, `RUST_LOG`-driven,
/// defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Resolve the effective `HarnessConfig` for a run: start from a named
/// profile if `--profile` was given, then layer the `--config` file and
/// `MCP_HARNESS_*` environment on top.
fn resolve_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.profile {
        Some(name) => {
            let path = config_loader::default_profile_path();
            let document = harness_types::config::ProfileDocument::load(&path)
                .context("loading profile document")?;
            document
                .profiles
                .get(name)
                .with_context(|| format!("no profile named '{name}'"))?
                .config
                .clone()
        }
        None => HarnessConfig::default(),
    };

    if let Some(config_path) = &cli.config {
        config = config_loader::load(Some(config_path)).context("loading configuration file")?;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Parse arguments, resolve configuration, and dispatch to the requested
/// subcommand. The only condition allowed to propagate out of this
/// function is misuse (spec §7): invalid configuration or arguments.
pub async fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Test {
            target,
            binary_name,
            format,
            output,
        } => commands::test(config, target, binary_name, format, output).await,
        Commands::Batch {
            targets,
            binary_name,
            stop_on_failure,
        } => commands::batch(config, targets, binary_name, stop_on_failure).await,
        Commands::Diagnose { from } => commands::diagnose(from).await,
        Commands::Profile { action } => match action {
            ProfileAction::Save {
                name,
                description,
                path,
            } => commands::profile::save(config, name, description, path),
            ProfileAction::Load { name, path } => commands::profile::load(name, path),
            ProfileAction::List { path } => commands::profile::list(path),
            ProfileAction::Remove { name, path } => commands::profile::remove(name, path),
        },
    }
}
