//! Terminal rendering: summary tables and colored pass/fail markers for
//! the `test`/`batch`/`diagnose` subcommands. The on-disk report formats
//! (JSON/HTML/XML) live in `harness-report`; this module is the
//! human-facing companion.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use owo_colors::OwoColorize;

use harness_types::records::{BatchRecord, PipelineRecord};

fn status_cell(success: bool) -> Cell {
    if success {
        Cell::new("PASS".to_string()).fg(comfy_table::Color::Green)
    } else {
        Cell::new("FAIL".to_string()).fg(comfy_table::Color::Red)
    }
}

/// Render one pipeline's stage-by-stage outcome as a table, plus a one-line
/// verdict banner.
#[must_use]
pub fn render_pipeline_summary(record: &PipelineRecord) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Stage", "Result", "Elapsed", "Retries"]);

    let mut names: Vec<&String> = record.stages.keys().collect();
    names.sort();
    for name in names {
        let stage = &record.stages[name];
        let result = if stage.skipped {
            "skipped".to_string()
        } else if stage.success {
            "pass".to_string()
        } else {
            "fail".to_string()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(result),
            Cell::new(format!("{:?}", stage.elapsed)),
            Cell::new(stage.retries_performed.to_string()),
        ]);
    }

    let verdict = if record.success {
        format!("{}", "PIPELINE PASSED".green().bold())
    } else {
        format!("{}", "PIPELINE FAILED".red().bold())
    };

    format!(
        "{verdict}\ntarget: {}\n{table}",
        record.target_path.display()
    )
}

/// Render a `BatchRecord`'s aggregate statistics as a table.
#[must_use]
pub fn render_batch_summary(record: &BatchRecord) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Target", "Result", "Elapsed"]);

    let mut entries: Vec<(&std::path::PathBuf, &PipelineRecord)> = record.pipelines.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (path, pipeline) in entries {
        table.add_row(vec![
            Cell::new(path.display().to_string()),
            status_cell(pipeline.success),
            Cell::new(format!("{:?}", pipeline.elapsed)),
        ]);
    }

    format!(
        "batch {}\ntotal={} completed={} failed={} skipped={} success_rate={:.1}%\n{table}",
        record.request_id,
        record.total_servers,
        record.completed_tests,
        record.failed_tests,
        record.skipped_tests,
        record.success_rate,
    )
}
