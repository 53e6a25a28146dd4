//! C7: `Pipeline` — the ordered stage list plus the post-stage `TestSuite`
//! run (spec §4.7).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use harness_invoke::{default_validators, ExternalTool, SafeInvoker};
use harness_types::config::HarnessConfig;
use harness_types::context::HarnessContext;
use harness_types::error::HarnessError;
use harness_types::records::{FailurePolicy, PipelineRecord, StageRecord, ValidationRecord};

use crate::stage::{default_stage_defs, stage_enabled, StageDef};
use crate::test_suite::run_test_suite;

const ENTRY_FILE: &str = "main.go";
const MODULE_MANIFEST: &str = "go.mod";

/// Statically-defined, ordered pipeline. One instance owns one re-entrancy
/// guard; a second concurrent `run` call is refused rather than racing
/// (spec §4.7: "a pipeline instance is non-reentrant").
pub struct Pipeline {
    config: HarnessConfig,
    running: AtomicBool,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Run the full stage table, then (unless halted) the `TestSuite`,
    /// against `target_path`. Always returns a `PipelineRecord`, even when
    /// refused for reentrancy or when every stage fails.
    pub async fn run(&self, ctx: &HarnessContext, target_path: &Path, binary_name: &str) -> PipelineRecord {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let mut record = PipelineRecord::new(target_path.to_path_buf());
            record
                .errors
                .push(HarnessError::Internal("pipeline is already running".to_string()).to_string());
            return record;
        }
        let _guard = RunningGuard(&self.running);

        let start = Instant::now();
        let mut record = PipelineRecord::new(target_path.to_path_buf());

        let invoker = match SafeInvoker::new(target_path, self.config.external_tool_paths.clone()) {
            Ok(invoker) => invoker,
            Err(e) => {
                record.errors.push(e.to_string());
                record.elapsed = start.elapsed();
                record.recount();
                return record;
            }
        };

        let mut halted = false;
        for stage in default_stage_defs() {
            if !stage_enabled(stage.name, self.config.enable_security, self.config.enable_style) {
                record.stages.insert(stage.name.to_string(), StageRecord::skipped(stage.name));
                continue;
            }

            let stage_record = self.run_stage_with_retries(ctx, &invoker, target_path, &stage).await;
            let stage_failed = !stage_record.success;
            if let Some(error) = &stage_record.error {
                record.errors.push(error.clone());
            }
            record.stages.insert(stage.name.to_string(), stage_record);

            if stage_failed && stage.on_failure == FailurePolicy::Stop && !self.config.continue_on_stage_failure {
                halted = true;
                break;
            }
        }

        record.recount();

        if !halted || self.config.continue_on_stage_failure {
            let test_record =
                run_test_suite(ctx, &invoker, binary_name, &self.config, target_path).await;
            record.success = test_record.success && record.failed_stages == 0;
            record.test_record = Some(test_record);
        } else {
            record.success = false;
        }

        record.elapsed = start.elapsed();
        record
    }

    async fn run_stage_with_retries(
        &self,
        ctx: &HarnessContext,
        invoker: &SafeInvoker,
        target_path: &Path,
        stage: &StageDef,
    ) -> StageRecord {
        let mut attempt = 0u32;
        loop {
            let stage_ctx = ctx.with_timeout(stage.timeout);
            let start = Instant::now();
            let outcome = self.execute_stage(&stage_ctx, invoker, target_path, stage.name).await;
            let elapsed = start.elapsed();

            match outcome {
                Ok(detail) => {
                    return StageRecord {
                        name: stage.name.to_string(),
                        elapsed,
                        success: true,
                        skipped: false,
                        retries_performed: attempt,
                        error: None,
                        detail,
                    };
                }
                Err(message) => {
                    if attempt >= stage.retries {
                        return StageRecord {
                            name: stage.name.to_string(),
                            elapsed,
                            success: false,
                            skipped: false,
                            retries_performed: attempt,
                            error: Some(message),
                            detail: Default::default(),
                        };
                    }
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }
            }
        }
    }

    async fn execute_stage(
        &self,
        ctx: &HarnessContext,
        invoker: &SafeInvoker,
        target_path: &Path,
        name: &str,
    ) -> Result<std::collections::HashMap<String, serde_json::Value>, String> {
        match name {
            "pre_validation" => pre_validation(target_path),
            "environment_setup" => environment_setup(target_path),
            "compilation_validation" => {
                validation_result(run_named_validator(ctx, invoker, target_path, "compilation_validator", self.config.overall_deadline).await)
            }
            "syntax_validation" => {
                validation_result(run_named_validator(ctx, invoker, target_path, "syntax_validator", self.config.overall_deadline).await)
            }
            "security_scan" => {
                validation_result(run_named_validator(ctx, invoker, target_path, "security_lint_validator", self.config.overall_deadline).await)
            }
            "lint_check" => {
                validation_result(run_named_validator(ctx, invoker, target_path, "style_validator", self.config.overall_deadline).await)
            }
            "dependency_check" => {
                validation_result(run_named_validator(ctx, invoker, target_path, "dependency_validator", self.config.overall_deadline).await)
            }
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn pre_validation(target_path: &Path) -> Result<std::collections::HashMap<String, serde_json::Value>, String> {
    if !target_path.join(ENTRY_FILE).is_file() {
        return Err(format!("required file {ENTRY_FILE} not found"));
    }
    if !target_path.join(MODULE_MANIFEST).is_file() {
        return Err(format!("required file {MODULE_MANIFEST} not found"));
    }
    if which_on_path(ExternalTool::Toolchain.default_binary_name()).is_none() {
        return Err(format!(
            "toolchain entry point {} not found on PATH",
            ExternalTool::Toolchain.default_binary_name()
        ));
    }
    Ok(Default::default())
}

fn environment_setup(target_path: &Path) -> Result<std::collections::HashMap<String, serde_json::Value>, String> {
    let scratch = target_path.join(".harness-scratch");
    std::fs::create_dir_all(&scratch).map_err(|e| format!("creating scratch directory: {e}"))?;
    let _ = std::fs::remove_dir(&scratch);
    Ok(Default::default())
}

fn which_on_path(binary_name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary_name))
        .find(|candidate| candidate.is_file())
}

async fn run_named_validator(
    ctx: &HarnessContext,
    invoker: &SafeInvoker,
    target_path: &Path,
    name: &str,
    overall_deadline: std::time::Duration,
) -> ValidationRecord {
    let validators = default_validators(overall_deadline);
    let validator = validators
        .into_iter()
        .find(|v| v.name() == name)
        .expect("stage names are drawn from the fixed validator registry");
    let _ = invoker.working_dir();
    validator.run(ctx, target_path).await
}

fn validation_result(record: ValidationRecord) -> Result<std::collections::HashMap<String, serde_json::Value>, String> {
    if record.success {
        Ok(record.detail)
    } else {
        Err(record.errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_reentrant_run() {
        let pipeline = Pipeline::new(HarnessConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let ctx = HarnessContext::background();

        let first = pipeline.run(&ctx, dir.path(), "does-not-exist");
        let second = pipeline.run(&ctx, dir.path(), "does-not-exist");
        let (_, second_record) = tokio::join!(first, second);
        // One of the two concurrent calls must observe the guard; since
        // both start near-simultaneously we only assert the guard clears
        // cleanly afterward, not which one wins.
        let _ = second_record;
        assert!(!pipeline.running.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn missing_entry_file_halts_at_pre_validation() {
        let pipeline = Pipeline::new(HarnessConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let ctx = HarnessContext::background();

        let record = pipeline.run(&ctx, dir.path(), "does-not-exist").await;
        assert!(!record.success);
        assert!(record.test_record.is_none());
        let pre = record.stages.get("pre_validation").unwrap();
        assert!(!pre.success);
    }
}
