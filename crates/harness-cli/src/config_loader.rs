//! Layered `HarnessConfig` loading: a caller-supplied TOML/YAML file,
//! overridden by process environment variables prefixed `MCP_HARNESS_`.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use harness_types::config::HarnessConfig;
use harness_types::error::{HarnessError, HarnessResult};

/// Load a `HarnessConfig`, layering an optional file under `MCP_HARNESS_*`
/// environment variables, then validating the result. Absence of a file
/// is not an error: the engine must tolerate default values throughout.
pub fn load(config_path: Option<&Path>) -> HarnessResult<HarnessConfig> {
    let mut builder = Config::builder()
        .add_source(Config::try_from(&HarnessConfig::default()).map_err(config_error)?);

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path.to_path_buf()));
    }

    builder = builder.add_source(Environment::with_prefix("MCP_HARNESS").separator("__"));

    let built = builder.build().map_err(config_error)?;
    let config: HarnessConfig = built.try_deserialize().map_err(config_error)?;
    config.validate()?;
    Ok(config)
}

fn config_error(e: config::ConfigError) -> HarnessError {
    HarnessError::Internal(format!("loading configuration: {e}"))
}

/// Default profile document path: `dirs::config_dir()/mcp-harness/profiles.json`.
/// The engine itself never decides to persist unprompted; this is only
/// consulted when the caller explicitly runs a `profile` subcommand
/// without `--path`.
#[must_use]
pub fn default_profile_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mcp-harness")
        .join("profiles.json")
}
