//! C2: the validator set — independent checks over the source tree (spec
//! §4.2). Each validator exposes a stable name, a "may run in parallel"
//! hint, and a single operation yielding a `ValidationRecord`.
//!
//! Concrete validators are variants of one capability contract (`Validator`)
//! rather than duck-typed callbacks, so the registry can hold them as trait
//! objects and run each uniformly.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;

use harness_types::context::HarnessContext;
use harness_types::records::ValidationRecord;

use crate::safe_invoker::{ExternalTool, SafeInvoker};

/// The single capability contract every validator implements (spec §9).
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;
    fn may_run_in_parallel(&self) -> bool;
    async fn run(&self, ctx: &HarnessContext, path: &Path) -> ValidationRecord;
}

const ENTRY_FILE: &str = "main.go";
const MODULE_MANIFEST: &str = "go.mod";

/// Run `op` under a deadline, recording a timeout error on `record` if it
/// fires first (spec §7 "Timeout").
async fn with_deadline<F, T>(record: &mut ValidationRecord, label: &str, timeout: Duration, op: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(value) => Some(value),
        Err(_) => {
            record.push_error(format!("{label} timed out after {timeout:?}"));
            None
        }
    }
}

/// Run a prepared command to completion and return its captured output.
async fn run_to_completion(
    invoker: &SafeInvoker,
    tool: ExternalTool,
    args: &[String],
    is_compile_call: bool,
) -> Result<std::process::Output, String> {
    let prepared = invoker
        .prepare_tool(tool, args, is_compile_call)
        .map_err(|e| e.to_string())?;
    let child = prepared.spawn().map_err(|e| e.to_string())?;
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("waiting for process: {e}"))?;
    Ok(output)
}

/// The compilation validator (spec §4.2): invokes the toolchain build into
/// a scratch binary, captures combined stdout/stderr verbatim on failure,
/// and always deletes the scratch binary.
pub struct CompilationValidator {
    pub overall_ceiling: Duration,
}

#[async_trait]
impl Validator for CompilationValidator {
    fn name(&self) -> &'static str {
        "compilation_validator"
    }

    fn may_run_in_parallel(&self) -> bool {
        false
    }

    async fn run(&self, _ctx: &HarnessContext, path: &Path) -> ValidationRecord {
        let start = Instant::now();
        let mut record = ValidationRecord::new(self.name());

        if !path.join(ENTRY_FILE).is_file() {
            record.push_error(format!("required file {ENTRY_FILE} not found"));
            record.elapsed = start.elapsed();
            return record;
        }
        if !path.join(MODULE_MANIFEST).is_file() {
            record.push_error(format!("required file {MODULE_MANIFEST} not found"));
            record.elapsed = start.elapsed();
            return record;
        }
        record.files_inspected = 2;

        let invoker = match SafeInvoker::new(path, Default::default()) {
            Ok(invoker) => invoker,
            Err(e) => {
                record.push_error(e.to_string());
                record.elapsed = start.elapsed();
                return record;
            }
        };

        let scratch_binary = path.join(".harness-scratch-build");
        let scratch_arg = scratch_binary.to_string_lossy().to_string();

        let outcome = with_deadline(&mut record, "compilation", self.overall_ceiling, async {
            run_to_completion(
                &invoker,
                ExternalTool::Toolchain,
                &["build".to_string(), "-o".to_string(), scratch_arg, ".".to_string()],
                true,
            )
            .await
        })
        .await;

        let _ = std::fs::remove_file(&scratch_binary);

        if let Some(outcome) = outcome {
            match outcome {
                Ok(output) => {
                    if !output.status.success() {
                        let combined = format!(
                            "{}{}",
                            String::from_utf8_lossy(&output.stdout),
                            String::from_utf8_lossy(&output.stderr)
                        );
                        record.push_error(combined);
                    }
                }
                Err(message) => record.push_error(message),
            }
        }

        record.elapsed = start.elapsed();
        record
    }
}

/// The syntax/structure validator (spec §4.2).
pub struct SyntaxValidator;

#[async_trait]
impl Validator for SyntaxValidator {
    fn name(&self) -> &'static str {
        "syntax_validator"
    }

    fn may_run_in_parallel(&self) -> bool {
        true
    }

    async fn run(&self, _ctx: &HarnessContext, path: &Path) -> ValidationRecord {
        let start = Instant::now();
        let mut record = ValidationRecord::new(self.name());

        let entry_path = path.join(ENTRY_FILE);
        let source = match std::fs::read_to_string(&entry_path) {
            Ok(source) => source,
            Err(e) => {
                record.push_error(format!("reading {ENTRY_FILE}: {e}"));
                record.elapsed = start.elapsed();
                return record;
            }
        };
        record.files_inspected += 1;

        if !Regex::new(r"(?m)^package\s+main\b").unwrap().is_match(&source) {
            record.push_warning("package declaration is not `package main`");
        }
        if !Regex::new(r"(?m)^func\s+main\s*\(\s*\)").unwrap().is_match(&source) {
            record.push_warning("no entry routine `func main()` found");
        }

        let jsonrpc_import =
            Regex::new(r#"jsonrpc|jsonrpc2|mcp"#).unwrap().is_match(&source);
        if !jsonrpc_import {
            record.push_error("JSON-RPC dependency import not found in entry source");
        }

        let standard_imports = ["encoding/json", "bufio", "os"];
        for import in standard_imports {
            if !source.contains(import) {
                record.push_warning(format!("standard import not found: {import}"));
            }
        }

        let required_types = [
            "ServerInfo",
            "Tool",
            "InputSchema",
            "Property",
            "CallToolRequest",
            "CallToolResponse",
            "Content",
        ];
        for type_name in required_types {
            if !source.contains(type_name) {
                record.push_warning(format!("type declaration not found: {type_name}"));
            }
        }

        let manifest_path = path.join(MODULE_MANIFEST);
        match std::fs::read_to_string(&manifest_path) {
            Ok(manifest) => {
                record.files_inspected += 1;
                if !manifest.lines().any(|l| l.trim_start().starts_with("module ")) {
                    record.push_warning("module manifest missing `module` declaration");
                }
                if !manifest.contains("go 1.") {
                    record.push_warning("module manifest missing language-version line");
                }
                if !jsonrpc_import && !manifest.to_lowercase().contains("jsonrpc") {
                    record.push_error("module manifest missing JSON-RPC dependency line");
                }
            }
            Err(e) => record.push_error(format!("reading {MODULE_MANIFEST}: {e}")),
        }

        record.elapsed = start.elapsed();
        record
    }
}

/// The style validator (spec §4.2): never escalates to error.
pub struct StyleValidator;

#[async_trait]
impl Validator for StyleValidator {
    fn name(&self) -> &'static str {
        "style_validator"
    }

    fn may_run_in_parallel(&self) -> bool {
        true
    }

    async fn run(&self, _ctx: &HarnessContext, path: &Path) -> ValidationRecord {
        let start = Instant::now();
        let mut record = ValidationRecord::new(self.name());

        let invoker = match SafeInvoker::new(path, Default::default()) {
            Ok(invoker) => invoker,
            Err(e) => {
                record.push_error(e.to_string());
                record.elapsed = start.elapsed();
                return record;
            }
        };

        if let Ok(output) = run_to_completion(
            &invoker,
            ExternalTool::Toolchain,
            &["fmt".to_string(), "./...".to_string()],
            false,
        )
        .await
        {
            if !output.stdout.is_empty() {
                record.push_warning(String::from_utf8_lossy(&output.stdout).to_string());
            }
        }

        if let Ok(output) = run_to_completion(
            &invoker,
            ExternalTool::Toolchain,
            &["vet".to_string(), "./...".to_string()],
            false,
        )
        .await
        {
            if !output.status.success() {
                record.push_warning(String::from_utf8_lossy(&output.stderr).to_string());
            }
        }

        if which_on_path("golangci-lint").is_some() {
            if let Ok(output) = run_to_completion(
                &invoker,
                ExternalTool::StyleLinter,
                &["run".to_string()],
                false,
            )
            .await
            {
                if !output.stdout.is_empty() {
                    record.push_warning(String::from_utf8_lossy(&output.stdout).to_string());
                }
            }
        }

        record.elapsed = start.elapsed();
        record
    }
}

/// The security lint validator (spec §4.2): regex-screens for dangerous
/// patterns; all findings are warnings.
pub struct SecurityLintValidator;

#[async_trait]
impl Validator for SecurityLintValidator {
    fn name(&self) -> &'static str {
        "security_lint_validator"
    }

    fn may_run_in_parallel(&self) -> bool {
        true
    }

    async fn run(&self, _ctx: &HarnessContext, path: &Path) -> ValidationRecord {
        let start = Instant::now();
        let mut record = ValidationRecord::new(self.name());

        let entry_path = path.join(ENTRY_FILE);
        if let Ok(source) = std::fs::read_to_string(&entry_path) {
            record.files_inspected += 1;
            for (pattern, message) in dangerous_patterns() {
                if Regex::new(pattern).unwrap().is_match(&source) {
                    record.push_warning(message.to_string());
                }
            }
        }

        if which_on_path("gosec").is_some() {
            if let Ok(invoker) = SafeInvoker::new(path, Default::default()) {
                if let Ok(output) = run_to_completion(
                    &invoker,
                    ExternalTool::SecurityLinter,
                    &["-fmt".to_string(), "text".to_string(), "./...".to_string()],
                    false,
                )
                .await
                {
                    if !output.stdout.is_empty() {
                        record.push_warning(String::from_utf8_lossy(&output.stdout).to_string());
                    }
                }
            }
        }

        record.elapsed = start.elapsed();
        record
    }
}

fn dangerous_patterns() -> Vec<(&'static str, &'static str)> {
    vec![
        (r"os\.Getenv\(\s*[\"'](?i:password|secret|api_key|token)[\"']", "reads a password/secret from an environment variable"),
        (r"(?i)log\..*password", "logs a value alongside the word 'password'"),
        (r"http\.Client\{\s*\}", "constructs an http.Client without a timeout"),
        (r#"exec\.Command\(\s*"sh""#, "builds a shell command via string construction"),
    ]
}

/// The dependency validator (spec §4.2).
pub struct DependencyValidator;

#[async_trait]
impl Validator for DependencyValidator {
    fn name(&self) -> &'static str {
        "dependency_validator"
    }

    fn may_run_in_parallel(&self) -> bool {
        true
    }

    async fn run(&self, _ctx: &HarnessContext, path: &Path) -> ValidationRecord {
        let start = Instant::now();
        let mut record = ValidationRecord::new(self.name());

        let invoker = match SafeInvoker::new(path, Default::default()) {
            Ok(invoker) => invoker,
            Err(e) => {
                record.push_error(e.to_string());
                record.elapsed = start.elapsed();
                return record;
            }
        };

        match run_to_completion(
            &invoker,
            ExternalTool::Toolchain,
            &["mod".to_string(), "verify".to_string()],
            false,
        )
        .await
        {
            Ok(output) => {
                if !output.status.success() {
                    record.push_error(String::from_utf8_lossy(&output.stderr).to_string());
                }
            }
            Err(message) => record.push_error(message),
        }

        if which_on_path("govulncheck").is_some() {
            if let Ok(output) =
                run_to_completion(&invoker, ExternalTool::VulnChecker, &["./...".to_string()], false).await
            {
                if !output.stdout.is_empty() {
                    record.push_warning(String::from_utf8_lossy(&output.stdout).to_string());
                }
            }
        }

        record.elapsed = start.elapsed();
        record
    }
}

fn which_on_path(binary: &str) -> Option<std::path::PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(binary))
            .find(|candidate| candidate.is_file())
    })
}

/// The fixed registry of all validators, in no particular order (the
/// pipeline decides ordering/enablement per stage).
#[must_use]
pub fn default_validators(overall_compile_ceiling: Duration) -> Vec<Box<dyn Validator>> {
    vec![
        Box::new(CompilationValidator {
            overall_ceiling: overall_compile_ceiling,
        }),
        Box::new(SyntaxValidator),
        Box::new(StyleValidator),
        Box::new(SecurityLintValidator),
        Box::new(DependencyValidator),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn syntax_validator_flags_missing_entry_file() {
        let dir = tempfile::tempdir().unwrap();
        let record = SyntaxValidator.run(&HarnessContext::background(), dir.path()).await;
        assert!(!record.success);
        assert_eq!(record.success, record.errors.is_empty());
    }

    #[tokio::test]
    async fn syntax_validator_accepts_well_formed_server() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.go"),
            r#"package main

import (
    "bufio"
    "encoding/json"
    "os"
)

type ServerInfo struct{}
type Tool struct{}
type InputSchema struct{}
type Property struct{}
type CallToolRequest struct{}
type CallToolResponse struct{}
type Content struct{}

func main() {
    _ = bufio.NewReader(os.Stdin)
    _ = json.NewEncoder(os.Stdout)
    // jsonrpc2
}
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("go.mod"),
            "module example.com/server\n\ngo 1.22\n\nrequire github.com/sourcegraph/jsonrpc2 v0.2.0\n",
        )
        .unwrap();

        let record = SyntaxValidator.run(&HarnessContext::background(), dir.path()).await;
        assert!(record.success, "errors: {:?}", record.errors);
    }

    #[tokio::test]
    async fn security_lint_validator_flags_timeoutless_http_client() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.go"),
            "package main\n\nfunc main() {\n\tc := http.Client{}\n\t_ = c\n}\n",
        )
        .unwrap();
        let record = SecurityLintValidator
            .run(&HarnessContext::background(), dir.path())
            .await;
        assert!(record.success, "security findings are always warnings");
        assert!(!record.warnings.is_empty());
    }
}
