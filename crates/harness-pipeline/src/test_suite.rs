//! The `TestSuite`: every validator plus `ProtocolProbe`, `ScenarioDriver`
//! and `LoadHarness`, wired together and folded into one `TestRecord`
//! (spec §4.7: "the pipeline runs the full TestSuite and attaches its
//! TestRecord").

use std::path::Path;
use std::time::Duration;

use harness_invoke::{default_validators, ExternalTool, SafeInvoker};
use harness_probe::{run_load, run_protocol_probe, run_scenarios, LoadHarnessConfig, ProtocolProbeConfig};
use harness_types::config::HarnessConfig;
use harness_types::context::HarnessContext;
use harness_types::records::{ProtocolReport, TestRecord};

/// Build the persistent server binary that `ProtocolProbe`, `ScenarioDriver`
/// and `LoadHarness` spawn and re-spawn throughout the suite. This is
/// distinct from `CompilationValidator`'s scratch build (which is deleted
/// immediately after checking the build succeeds, spec §4.2): the binary
/// built here lives for the duration of the suite and is removed on every
/// exit path once the suite has finished with it.
async fn build_server_binary(invoker: &SafeInvoker, binary_name: &str) -> Result<(), String> {
    let prepared = invoker
        .prepare_tool(
            ExternalTool::Toolchain,
            &["build".to_string(), "-o".to_string(), binary_name.to_string(), ".".to_string()],
            true,
        )
        .map_err(|e| e.to_string())?;
    let child = prepared.spawn().map_err(|e| e.to_string())?;
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("waiting for build: {e}"))?;
    if !output.status.success() {
        return Err(format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(())
}

/// Run every enabled component against `target_path` and fold the results
/// into a single finalized `TestRecord`.
pub async fn run_test_suite(
    ctx: &HarnessContext,
    invoker: &SafeInvoker,
    binary_name: &str,
    config: &HarnessConfig,
    target_path: &Path,
) -> TestRecord {
    let start = tokio::time::Instant::now();
    let mut record = TestRecord::new(target_path.to_path_buf());

    for validator in default_validators(config.overall_deadline) {
        if validator.name() == "style_validator" && !config.enable_style {
            continue;
        }
        if validator.name() == "security_lint_validator" && !config.enable_security {
            continue;
        }
        let validation = validator.run(ctx, target_path).await;
        record.validations.insert(validator.name().to_string(), validation);
    }

    let binary_path = target_path.join(binary_name);
    if let Err(message) = build_server_binary(invoker, binary_name).await {
        let mut protocol = ProtocolReport::new();
        protocol.errors.push(format!("building server binary for live probes: {message}"));
        protocol.finalize(false);
        record.protocol = Some(protocol);
        record.errors.push(message);
        record.elapsed = start.elapsed().max(Duration::ZERO);
        record.finalize();
        return record;
    }

    let protocol_config = ProtocolProbeConfig {
        protocol_version: config.protocol_version.clone(),
        required_methods: config.required_methods.clone(),
        required_capabilities: config.required_capabilities.clone(),
    };
    record.protocol = Some(run_protocol_probe(ctx, invoker, binary_name, &protocol_config).await);

    if config.enable_scenarios {
        record.scenarios = run_scenarios(ctx, invoker, binary_name).await;
    }

    if config.enable_load {
        let load_config = LoadHarnessConfig {
            response_time_ceiling: config.response_time_ceiling,
            memory_ceiling_bytes: config.memory_ceiling_bytes,
        };
        record.load = Some(run_load(ctx, invoker, binary_name, &load_config).await);
    }

    let _ = std::fs::remove_file(&binary_path);

    record.elapsed = start.elapsed().max(Duration::ZERO);
    record.finalize();
    record
}
