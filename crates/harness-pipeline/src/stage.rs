//! Static stage table for `Pipeline` (spec §4.7).

use std::time::Duration;

use harness_types::records::FailurePolicy;

/// One entry in the statically-defined, ordered stage list. `execute` is
/// supplied by `Pipeline::run` itself; this type only carries the metadata
/// a stage needs (name, deadline, retry policy, enabled gate).
#[derive(Debug, Clone)]
pub struct StageDef {
    pub name: &'static str,
    pub description: &'static str,
    pub timeout: Duration,
    pub retries: u32,
    pub on_failure: FailurePolicy,
}

/// The default stage definition (spec §4.7's table), independent of any
/// particular `HarnessConfig` — `Pipeline::enabled_stages` applies the
/// config's `enable_security`/`enable_style` gates on top of this.
#[must_use]
pub fn default_stage_defs() -> Vec<StageDef> {
    vec![
        StageDef {
            name: "pre_validation",
            description: "paths and required files exist, toolchain available",
            timeout: Duration::from_secs(30),
            retries: 1,
            on_failure: FailurePolicy::Stop,
        },
        StageDef {
            name: "dependency_check",
            description: "resolve and download dependencies",
            timeout: Duration::from_secs(120),
            retries: 2,
            on_failure: FailurePolicy::Continue,
        },
        StageDef {
            name: "compilation_validation",
            description: "build the server into a scratch binary",
            timeout: Duration::from_secs(60),
            retries: 1,
            on_failure: FailurePolicy::Stop,
        },
        StageDef {
            name: "syntax_validation",
            description: "parse and structurally check the entry source",
            timeout: Duration::from_secs(30),
            retries: 0,
            on_failure: FailurePolicy::Continue,
        },
        StageDef {
            name: "security_scan",
            description: "regex and external security-lint sweep",
            timeout: Duration::from_secs(120),
            retries: 1,
            on_failure: FailurePolicy::Continue,
        },
        StageDef {
            name: "lint_check",
            description: "formatter/vetter/style-linter sweep",
            timeout: Duration::from_secs(60),
            retries: 0,
            on_failure: FailurePolicy::Continue,
        },
        StageDef {
            name: "environment_setup",
            description: "scratch directories for the test run",
            timeout: Duration::from_secs(30),
            retries: 2,
            on_failure: FailurePolicy::Stop,
        },
    ]
}

/// Whether a stage is gated behind a config flag; `true` means the stage
/// always runs once reached.
#[must_use]
pub fn stage_enabled(name: &str, enable_security: bool, enable_style: bool) -> bool {
    match name {
        "security_scan" => enable_security,
        "lint_check" => enable_style,
        _ => true,
    }
}
