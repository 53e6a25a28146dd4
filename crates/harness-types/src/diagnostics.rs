//! Data model for the out-of-band diagnostic pass (spec §3, §4.10).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reproducibility {
    Always,
    Often,
    Intermittent,
}

/// One matched entry from the fixed error-pattern table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub pattern_name: String,
    pub description: String,
    pub category: String,
    pub solutions: Vec<String>,
    pub frequency: usize,
}

/// The engine's best guess at what actually went wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCauseRecord {
    pub probable_cause: String,
    pub confidence: f64,
    pub contributing_factors: Vec<String>,
    pub evidence: Vec<String>,
    pub analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureAnalysis {
    pub primary_error: Option<String>,
    pub secondary_errors: Vec<String>,
    pub per_stage_detail: HashMap<String, String>,
    pub matched_patterns: Vec<ErrorPattern>,
    pub root_cause: RootCauseRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub tool_availability: HashMap<String, bool>,
    pub platform: String,
    pub architecture: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeAnalysis {
    pub files_counted: usize,
    pub lines_counted: usize,
    pub missing_components: Vec<String>,
    pub code_smells: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    pub total_dependencies: usize,
    pub direct_dependencies: usize,
    pub known_outdated: Vec<String>,
    pub known_vulnerable: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TroubleshootingGuide {
    pub quick_fixes: Vec<String>,
    pub detailed_steps: Vec<String>,
    pub common_pitfalls: Vec<String>,
    pub prevention_tips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub id: uuid::Uuid,
    pub target_path: PathBuf,
    pub failure_analysis: FailureAnalysis,
    pub environment: EnvironmentRecord,
    pub code_analysis: CodeAnalysis,
    pub dependency_analysis: DependencyAnalysis,
    pub recommendations: Vec<String>,
    pub troubleshooting: TroubleshootingGuide,
    pub severity: Severity,
    pub impact: Impact,
    pub reproducibility: Reproducibility,
    pub estimated_fix_time: String,
}
