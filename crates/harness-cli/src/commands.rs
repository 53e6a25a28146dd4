//! Subcommand implementations: thin wiring over the library crates. These
//! carry no additional engine semantics beyond what the library crates
//! already implement.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use harness_diagnostics::analyze;
use harness_pipeline::{run_batch, BatchTarget, Pipeline};
use harness_report::{render, resolve_output_path, score, ReportFormat, ScoringThresholds};
use harness_types::config::HarnessConfig;
use harness_types::context::HarnessContext;
use harness_types::records::PipelineRecord;

use crate::output::{render_batch_summary, render_pipeline_summary};

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// `mcp-harness test <target>`: run the full pipeline against one target
/// directory and render the scored report.
pub async fn test(
    config: HarnessConfig,
    target: PathBuf,
    binary_name: String,
    format_override: Option<String>,
    output_override: Option<PathBuf>,
) -> Result<()> {
    let bar = spinner("running conformance pipeline...");
    let ctx = HarnessContext::background();
    let pipeline = Pipeline::new(config.clone());
    let record = pipeline.run(&ctx, &target, &binary_name).await;
    bar.finish_and_clear();

    println!("{}", render_pipeline_summary(&record));

    write_report(&config, &record, format_override, output_override)?;

    if !record.success {
        std::process::exit(1);
    }
    Ok(())
}

fn write_report(
    config: &HarnessConfig,
    record: &PipelineRecord,
    format_override: Option<String>,
    output_override: Option<PathBuf>,
) -> Result<()> {
    let Some(test_record) = &record.test_record else {
        return Ok(());
    };

    let format_name = format_override.unwrap_or_else(|| config.report_format.clone());
    let format = ReportFormat::parse(&format_name)
        .with_context(|| format!("unknown report format: {format_name}"))?;

    let thresholds = ScoringThresholds {
        response_time_ceiling: config.response_time_ceiling,
        memory_ceiling_bytes: config.memory_ceiling_bytes,
    };
    let scores = score(test_record, thresholds);
    let rendered = render(test_record, &scores, format).context("rendering report")?;

    let configured = output_override.or_else(|| config.output_path.clone());
    let path = resolve_output_path(configured.as_deref(), format, test_record.timestamp);
    std::fs::write(&path, rendered).with_context(|| format!("writing report to {}", path.display()))?;
    println!("report written to {}", path.display());
    Ok(())
}

/// `mcp-harness batch <targets...>`: fan a batch of target directories
/// across the configured worker pool.
pub async fn batch(
    config: HarnessConfig,
    targets: Vec<PathBuf>,
    binary_name: String,
    stop_on_failure: bool,
) -> Result<()> {
    if targets.is_empty() {
        bail!("batch requires at least one target directory");
    }

    let bar = spinner("running batch across worker pool...");
    let ctx = HarnessContext::background();
    let batch_targets = targets
        .into_iter()
        .map(|path| BatchTarget {
            path,
            binary_name: binary_name.clone(),
        })
        .collect();
    let record = run_batch(&ctx, &config, batch_targets, stop_on_failure).await;
    bar.finish_and_clear();

    println!("{}", render_batch_summary(&record));

    let rendered = serde_json::to_string_pretty(&record).context("serializing batch record")?;
    let path = PathBuf::from(format!(
        "mcp_batch_report_{}.json",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, rendered).with_context(|| format!("writing batch report to {}", path.display()))?;
    println!("batch report written to {}", path.display());

    if record.failed_tests > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// `mcp-harness diagnose --from <report.json>`: load a previously saved
/// `PipelineRecord` and run the out-of-band diagnostic pass over it.
pub async fn diagnose(from: PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(&from)
        .with_context(|| format!("reading pipeline record from {}", from.display()))?;
    let record: PipelineRecord =
        serde_json::from_str(&raw).context("parsing pipeline record; expected `test`/`batch` JSON output")?;

    let report = analyze(&record, record.test_record.as_ref());
    let rendered = serde_json::to_string_pretty(&report).context("serializing diagnostic report")?;
    println!("{rendered}");
    Ok(())
}

pub mod profile {
    use super::{Context, Path, PathBuf, Result};
    use harness_types::config::{HarnessConfig, Profile, ProfileDocument};

    fn document_at(path: Option<&Path>) -> Result<(PathBuf, ProfileDocument)> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(crate::config_loader::default_profile_path);
        let document = ProfileDocument::load(&path).context("loading profile document")?;
        Ok((path, document))
    }

    pub fn save(config: HarnessConfig, name: String, description: String, path: Option<PathBuf>) -> Result<()> {
        let (path, mut document) = document_at(path.as_deref())?;
        let now = chrono::Utc::now();
        document.upsert(Profile {
            name: name.clone(),
            description,
            config,
            created_at: now,
            updated_at: now,
        });
        document.save(&path).context("saving profile document")?;
        println!("saved profile '{name}' to {}", path.display());
        Ok(())
    }

    pub fn load(name: String, path: Option<PathBuf>) -> Result<()> {
        let (_, document) = document_at(path.as_deref())?;
        let profile = document
            .profiles
            .get(&name)
            .with_context(|| format!("no profile named '{name}'"))?;
        let rendered = serde_json::to_string_pretty(&profile.config)?;
        println!("{rendered}");
        Ok(())
    }

    pub fn list(path: Option<PathBuf>) -> Result<()> {
        let (_, document) = document_at(path.as_deref())?;
        if document.profiles.is_empty() {
            println!("no profiles saved");
            return Ok(());
        }
        for (name, profile) in &document.profiles {
            println!("{name}\t{}", profile.description);
        }
        Ok(())
    }

    pub fn remove(name: String, path: Option<PathBuf>) -> Result<()> {
        let (path, mut document) = document_at(path.as_deref())?;
        if document.remove(&name).is_none() {
            anyhow::bail!("no profile named '{name}'");
        }
        document.save(&path).context("saving profile document")?;
        println!("removed profile '{name}'");
        Ok(())
    }
}
