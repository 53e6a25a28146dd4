//! C9 (reporting half): render a scored `TestRecord` to JSON, HTML or XML
//! and resolve the output path it should be written to (spec §4.9, §6).

use std::path::{Path, PathBuf};

use harness_types::error::{HarnessError, HarnessResult};
use harness_types::records::TestRecord;

use crate::scorer::Scores;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Html,
    Xml,
}

impl ReportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
            Self::Xml => "xml",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "html" => Some(Self::Html),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }
}

/// The default report name when no output path is configured: spec §4.9's
/// `mcp_test_report_<YYYYMMDD_HHMMSS>.<ext>` in the current directory.
#[must_use]
pub fn default_output_path(format: ReportFormat, timestamp: chrono::DateTime<chrono::Utc>) -> PathBuf {
    PathBuf::from(format!(
        "mcp_test_report_{}.{}",
        timestamp.format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

/// Resolve the final output path: a caller-provided prefix gets the
/// format's extension appended if it doesn't already carry it; absence
/// falls back to the default timestamped name.
#[must_use]
pub fn resolve_output_path(
    configured: Option<&Path>,
    format: ReportFormat,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> PathBuf {
    match configured {
        Some(path) => {
            if path.extension().and_then(|e| e.to_str()) == Some(format.extension()) {
                path.to_path_buf()
            } else {
                let mut with_ext = path.as_os_str().to_os_string();
                with_ext.push(".");
                with_ext.push(format.extension());
                PathBuf::from(with_ext)
            }
        }
        None => default_output_path(format, timestamp),
    }
}

/// Render `record`/`scores` in the requested format.
pub fn render(record: &TestRecord, scores: &Scores, format: ReportFormat) -> HarnessResult<String> {
    match format {
        ReportFormat::Json => render_json(record, scores),
        ReportFormat::Html => Ok(render_html(record, scores)),
        ReportFormat::Xml => Ok(render_xml(record, scores)),
    }
}

#[derive(serde::Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    record: &'a TestRecord,
    scores: &'a Scores,
}

fn render_json(record: &TestRecord, scores: &Scores) -> HarnessResult<String> {
    serde_json::to_string_pretty(&JsonReport { record, scores })
        .map_err(|e| HarnessError::Internal(format!("serializing JSON report: {e}")))
}

fn render_html(record: &TestRecord, scores: &Scores) -> String {
    let status = if record.success { "PASS" } else { "FAIL" };
    let mut validation_rows = String::new();
    for validation in record.validations.values() {
        validation_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&validation.validator_name),
            if validation.success { "pass" } else { "fail" },
            validation.errors.len(),
            validation.warnings.len(),
        ));
    }

    let mut scenario_rows = String::new();
    for scenario in record.scenarios.values() {
        scenario_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&scenario.name),
            if scenario.success { "pass" } else { "fail" },
            scenario.steps.len(),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>MCP conformance report</title></head>
<body>
<h1>MCP conformance report</h1>
<section class="summary-cards">
<div class="card"><h2>Status</h2><p>{status}</p></div>
<div class="card"><h2>Overall</h2><p>{overall:.1}</p></div>
<div class="card"><h2>Quality</h2><p>{quality:.1}</p></div>
<div class="card"><h2>Performance</h2><p>{performance:.1}</p></div>
<div class="card"><h2>Compliance</h2><p>{compliance:.1}</p></div>
</section>
<section class="validations">
<h2>Validations</h2>
<table><thead><tr><th>Validator</th><th>Result</th><th>Errors</th><th>Warnings</th></tr></thead>
<tbody>
{validation_rows}</tbody></table>
</section>
<section class="scenarios">
<h2>Scenarios</h2>
<table><thead><tr><th>Scenario</th><th>Result</th><th>Steps</th></tr></thead>
<tbody>
{scenario_rows}</tbody></table>
</section>
</body>
</html>
"#,
        status = status,
        overall = scores.overall,
        quality = scores.quality,
        performance = scores.performance,
        compliance = scores.compliance,
        validation_rows = validation_rows,
        scenario_rows = scenario_rows,
    )
}

fn render_xml(record: &TestRecord, scores: &Scores) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testReport>\n");
    xml.push_str(&format!("  <id>{}</id>\n", record.id));
    xml.push_str(&format!("  <targetPath>{}</targetPath>\n", escape(&record.target_path.display().to_string())));
    xml.push_str(&format!("  <success>{}</success>\n", record.success));
    xml.push_str("  <scores>\n");
    xml.push_str(&format!("    <overall>{:.1}</overall>\n", scores.overall));
    xml.push_str(&format!("    <quality>{:.1}</quality>\n", scores.quality));
    xml.push_str(&format!("    <performance>{:.1}</performance>\n", scores.performance));
    xml.push_str(&format!("    <compliance>{:.1}</compliance>\n", scores.compliance));
    xml.push_str("  </scores>\n");
    xml.push_str("  <validations>\n");
    for validation in record.validations.values() {
        xml.push_str(&format!(
            "    <validation name=\"{}\" success=\"{}\" errors=\"{}\" warnings=\"{}\"/>\n",
            escape(&validation.validator_name),
            validation.success,
            validation.errors.len(),
            validation.warnings.len(),
        ));
    }
    xml.push_str("  </validations>\n");
    xml.push_str("  <scenarios>\n");
    for scenario in record.scenarios.values() {
        xml.push_str(&format!(
            "    <scenario name=\"{}\" success=\"{}\" steps=\"{}\"/>\n",
            escape(&scenario.name),
            scenario.success,
            scenario.steps.len(),
        ));
    }
    xml.push_str("  </scenarios>\n");
    xml.push_str("</testReport>\n");
    xml
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{score, ScoringThresholds};
    use std::path::PathBuf;

    #[test]
    fn parses_known_formats_case_insensitively() {
        assert_eq!(ReportFormat::parse("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::parse("html"), Some(ReportFormat::Html));
        assert_eq!(ReportFormat::parse("xml"), Some(ReportFormat::Xml));
        assert_eq!(ReportFormat::parse("pdf"), None);
    }

    #[test]
    fn resolve_output_path_appends_missing_extension() {
        let now = chrono::Utc::now();
        let resolved = resolve_output_path(Some(Path::new("report")), ReportFormat::Json, now);
        assert_eq!(resolved, PathBuf::from("report.json"));
    }

    #[test]
    fn resolve_output_path_defaults_to_timestamped_name() {
        let now = chrono::Utc::now();
        let resolved = resolve_output_path(None, ReportFormat::Xml, now);
        assert!(resolved.to_string_lossy().starts_with("mcp_test_report_"));
        assert!(resolved.to_string_lossy().ends_with(".xml"));
    }

    #[test]
    fn json_render_round_trips_through_serde_value() {
        let record = TestRecord::new(PathBuf::from("/tmp/x"));
        let scores = score(&record, ScoringThresholds::default());
        let rendered = render(&record, &scores, ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert!(value.get("scores").is_some());
        assert!(value.get("targetPath").is_some() || value.get("target_path").is_some());
    }

    #[test]
    fn html_render_contains_summary_cards() {
        let record = TestRecord::new(PathBuf::from("/tmp/x"));
        let scores = score(&record, ScoringThresholds::default());
        let rendered = render(&record, &scores, ReportFormat::Html).unwrap();
        assert!(rendered.contains("summary-cards"));
    }
}
