//! C10: `Diagnostics` — an out-of-band post-failure analysis pass that
//! correlates error strings with known patterns to produce a ranked
//! remedial report (spec §4.10).

pub mod categorize;
pub mod patterns;

use std::collections::HashMap;
use std::path::Path;

use harness_types::diagnostics::{
    CodeAnalysis, DependencyAnalysis, DiagnosticReport, EnvironmentRecord, ErrorPattern,
    FailureAnalysis, Impact, Reproducibility, RootCauseRecord, Severity, TroubleshootingGuide,
};
use harness_types::records::{PipelineRecord, TestRecord};

use categorize::{categorize, stage_suggestions, FailureFamily};
use patterns::PATTERNS;

/// Run the diagnostic pass over a pipeline's outcome. `test_record` is
/// `None` when the pipeline halted before the `TestSuite` phase.
#[must_use]
pub fn analyze(pipeline: &PipelineRecord, test_record: Option<&TestRecord>) -> DiagnosticReport {
    let errors = collect_errors(pipeline, test_record);
    let primary_error = errors.first().cloned();
    let secondary_errors = errors.iter().skip(1).cloned().collect();

    let family = primary_error
        .as_deref()
        .map_or(FailureFamily::General, categorize);

    let per_stage_detail = collect_per_stage_detail(pipeline);
    let matched_patterns = scan_patterns(&errors);
    let root_cause = synthesize_root_cause(&matched_patterns, &errors, family);

    let failed_stage_count = pipeline.failed_stages;
    let impact = derive_impact(family, failed_stage_count);
    let reproducibility = derive_reproducibility(family);
    let severity = derive_severity(impact, family);

    let recommendations = build_recommendations(pipeline, &matched_patterns);
    let troubleshooting = build_troubleshooting(family, &matched_patterns);

    DiagnosticReport {
        id: uuid::Uuid::new_v4(),
        target_path: pipeline.target_path.clone(),
        failure_analysis: FailureAnalysis {
            primary_error,
            secondary_errors,
            per_stage_detail,
            matched_patterns,
            root_cause,
        },
        environment: environment_record(),
        code_analysis: code_analysis(&pipeline.target_path, test_record),
        dependency_analysis: dependency_analysis(&pipeline.target_path, test_record),
        recommendations,
        troubleshooting,
        severity,
        impact,
        reproducibility,
        estimated_fix_time: family.estimated_fix_time().to_string(),
    }
}

fn collect_errors(pipeline: &PipelineRecord, test_record: Option<&TestRecord>) -> Vec<String> {
    let mut errors = Vec::new();
    errors.extend(pipeline.errors.iter().cloned());
    for stage in pipeline.stages.values() {
        if let Some(error) = &stage.error {
            errors.push(error.clone());
        }
    }
    if let Some(test_record) = test_record {
        errors.extend(test_record.errors.iter().cloned());
        for validation in test_record.validations.values() {
            errors.extend(validation.errors.iter().cloned());
        }
        if let Some(protocol) = &test_record.protocol {
            errors.extend(protocol.errors.iter().cloned());
        }
        for scenario in test_record.scenarios.values() {
            for step in &scenario.steps {
                if let Some(error) = &step.error {
                    errors.push(error.clone());
                }
            }
        }
        if let Some(load) = &test_record.load {
            errors.extend(load.errors.iter().cloned());
        }
    }
    errors
}

fn collect_per_stage_detail(pipeline: &PipelineRecord) -> HashMap<String, String> {
    pipeline
        .stages
        .iter()
        .filter_map(|(name, stage)| stage.error.clone().map(|error| (name.clone(), error)))
        .collect()
}

fn scan_patterns(errors: &[String]) -> Vec<ErrorPattern> {
    let mut matched = Vec::new();
    for pattern in PATTERNS {
        let frequency = errors.iter().filter(|e| patterns::matches(pattern, e)).count();
        if frequency > 0 {
            matched.push(ErrorPattern {
                pattern_name: pattern.name.to_string(),
                description: pattern.description.to_string(),
                category: pattern.category.to_string(),
                solutions: pattern.solutions.iter().map(|s| (*s).to_string()).collect(),
                frequency,
            });
        }
    }
    matched.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    matched
}

fn synthesize_root_cause(
    matched_patterns: &[ErrorPattern],
    errors: &[String],
    family: FailureFamily,
) -> RootCauseRecord {
    let Some(dominant) = matched_patterns.first() else {
        return RootCauseRecord {
            probable_cause: "no known error pattern matched the collected output".to_string(),
            confidence: 0.6,
            contributing_factors: Vec::new(),
            evidence: errors.iter().take(3).cloned().collect(),
            analysis: "the failure does not match a recognised signature; manual inspection of the raw output is required".to_string(),
        };
    };

    let confidence = PATTERNS
        .iter()
        .find(|p| p.name == dominant.pattern_name)
        .map_or(0.6, |p| p.confidence);

    let evidence: Vec<String> = errors
        .iter()
        .filter(|e| {
            PATTERNS
                .iter()
                .find(|p| p.name == dominant.pattern_name)
                .is_some_and(|p| patterns::matches(p, e))
        })
        .take(3)
        .cloned()
        .collect();

    RootCauseRecord {
        probable_cause: dominant.description.clone(),
        confidence,
        contributing_factors: vec![format!("classified under the {} failure family", family.broad_category())],
        evidence,
        analysis: format!(
            "the dominant signature matched was \"{}\" ({} occurrence(s)); {}",
            dominant.pattern_name, dominant.frequency, dominant.description
        ),
    }
}

fn derive_impact(family: FailureFamily, failed_stage_count: usize) -> Impact {
    if failed_stage_count >= 3 {
        return Impact::High;
    }
    match family {
        FailureFamily::CompilationBuild | FailureFamily::ConnectionNetwork => Impact::High,
        _ if failed_stage_count >= 2 => Impact::Medium,
        FailureFamily::General => Impact::Low,
        _ => Impact::Medium,
    }
}

fn derive_reproducibility(family: FailureFamily) -> Reproducibility {
    match family {
        FailureFamily::CompilationBuild | FailureFamily::SyntaxParse | FailureFamily::DependencyModule => {
            Reproducibility::Always
        }
        FailureFamily::TimeoutDeadline | FailureFamily::ConnectionNetwork | FailureFamily::MemoryOom => {
            Reproducibility::Intermittent
        }
        _ => Reproducibility::Often,
    }
}

fn derive_severity(impact: Impact, family: FailureFamily) -> Severity {
    match (impact, family) {
        (Impact::High, FailureFamily::CompilationBuild | FailureFamily::ConnectionNetwork) => Severity::Critical,
        (Impact::High, _) => Severity::Major,
        (Impact::Medium, _) => Severity::Major,
        (Impact::Low, _) => Severity::Minor,
    }
}

fn build_recommendations(pipeline: &PipelineRecord, matched_patterns: &[ErrorPattern]) -> Vec<String> {
    let mut recommendations = Vec::new();
    for (name, stage) in &pipeline.stages {
        if !stage.success && !stage.skipped {
            recommendations.extend(stage_suggestions(name).iter().map(|s| (*s).to_string()));
        }
    }
    for pattern in matched_patterns {
        recommendations.extend(pattern.solutions.iter().cloned());
    }
    recommendations.dedup();
    recommendations
}

fn build_troubleshooting(family: FailureFamily, matched_patterns: &[ErrorPattern]) -> TroubleshootingGuide {
    let quick_fixes = matched_patterns
        .iter()
        .flat_map(|p| p.solutions.iter().cloned())
        .take(3)
        .collect();

    let detailed_steps = vec![
        "reproduce the failure locally with the same target directory".to_string(),
        format!("re-run the failed stage in isolation, focusing on the {} category", family.broad_category()),
        "compare the captured output against the error-pattern table for an exact match".to_string(),
    ];

    let common_pitfalls = vec![
        "assuming a warning-level finding is an error (only validators marked as escalating do this)".to_string(),
        "retrying without addressing the root cause, which only consumes the stage's retry budget".to_string(),
    ];

    let prevention_tips = vec![
        "run the validators locally before submitting the generated server for conformance testing".to_string(),
        "pin toolchain and linter versions so local and harness runs agree".to_string(),
    ];

    TroubleshootingGuide {
        quick_fixes,
        detailed_steps,
        common_pitfalls,
        prevention_tips,
    }
}

fn environment_record() -> EnvironmentRecord {
    let tools = ["go", "golangci-lint", "gosec", "govulncheck"];
    let tool_availability = tools
        .iter()
        .map(|tool| ((*tool).to_string(), which_on_path(tool).is_some()))
        .collect();

    EnvironmentRecord {
        tool_availability,
        platform: std::env::consts::OS.to_string(),
        architecture: std::env::consts::ARCH.to_string(),
    }
}

fn which_on_path(binary_name: &str) -> Option<std::path::PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary_name))
        .find(|candidate| candidate.is_file())
}

fn code_analysis(target_path: &Path, test_record: Option<&TestRecord>) -> CodeAnalysis {
    let entry_path = target_path.join("main.go");
    let source = std::fs::read_to_string(&entry_path).unwrap_or_default();
    let files_counted = usize::from(!source.is_empty());
    let lines_counted = source.lines().count();

    let mut missing_components = Vec::new();
    let mut code_smells = Vec::new();
    if let Some(test_record) = test_record {
        if let Some(syntax) = test_record.validations.get("syntax_validator") {
            for warning in &syntax.warnings {
                if let Some(component) = warning.strip_prefix("type declaration not found: ") {
                    missing_components.push(component.to_string());
                }
            }
        }
        if let Some(security) = test_record.validations.get("security_lint_validator") {
            code_smells.extend(security.warnings.iter().cloned());
        }
    }

    CodeAnalysis {
        files_counted,
        lines_counted,
        missing_components,
        code_smells,
    }
}

fn dependency_analysis(target_path: &Path, test_record: Option<&TestRecord>) -> DependencyAnalysis {
    let manifest_path = target_path.join("go.mod");
    let manifest = std::fs::read_to_string(&manifest_path).unwrap_or_default();
    let direct_dependencies = manifest
        .lines()
        .filter(|line| line.trim_start().starts_with("require") || looks_like_require_entry(line))
        .count();

    let mut known_outdated = Vec::new();
    let mut known_vulnerable = Vec::new();
    if let Some(test_record) = test_record {
        if let Some(dependency) = test_record.validations.get("dependency_validator") {
            for warning in &dependency.warnings {
                if warning.to_ascii_uppercase().contains("CVE") || warning.to_ascii_lowercase().contains("vulnerable") {
                    known_vulnerable.push(warning.clone());
                } else if warning.to_ascii_lowercase().contains("outdated") {
                    known_outdated.push(warning.clone());
                }
            }
        }
    }

    DependencyAnalysis {
        total_dependencies: direct_dependencies,
        direct_dependencies,
        known_outdated,
        known_vulnerable,
    }
}

fn looks_like_require_entry(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('/') && trimmed.split_whitespace().count() >= 2 && !trimmed.starts_with("//")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn empty_pipeline() -> PipelineRecord {
        let mut record = PipelineRecord::new(PathBuf::from("/tmp/x"));
        record.errors.push("required file main.go not found".to_string());
        record.failed_stages = 1;
        record
    }

    #[test]
    fn categorizes_missing_file_as_general_or_code() {
        let report = analyze(&empty_pipeline(), None);
        assert!(report.failure_analysis.primary_error.is_some());
        assert!(!report.estimated_fix_time.is_empty());
    }

    #[test]
    fn timeout_errors_are_classified_intermittent() {
        let mut pipeline = empty_pipeline();
        pipeline.errors = vec!["initialize call timed out after 10s".to_string()];
        let report = analyze(&pipeline, None);
        assert_eq!(report.reproducibility, Reproducibility::Intermittent);
    }

    #[test]
    fn pattern_scan_finds_timeout_pattern() {
        let errors = vec!["operation timed out".to_string()];
        let matched = scan_patterns(&errors);
        assert!(matched.iter().any(|p| p.pattern_name == "timeout"));
    }
}
