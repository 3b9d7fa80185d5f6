//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a harvest run,
//! including per-window statistics and recent download failures.

use crate::output::traits::{OutputResult, RunSummary};
use crate::storage::OutcomeRecord;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run to `output_path`
pub fn generate_markdown_summary(
    summary: &RunSummary,
    failures: &[OutcomeRecord],
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary, failures);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary, failures: &[OutcomeRecord]) -> String {
    let mut md = String::new();

    md.push_str("# Topic-Harvest Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    if let Some(run_id) = summary.run_id {
        md.push_str(&format!("- **Run ID**: {}\n", run_id));
    }
    md.push_str(&format!("- **Topic**: {}\n", summary.topic));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status.to_db_string()));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Totals
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!(
        "- **Downloaded Repositories**: {}\n",
        summary.total_downloaded()
    ));
    md.push_str(&format!("- **Failed Downloads**: {}\n", summary.total_failed()));
    md.push_str(&format!(
        "- **Skipped Repositories**: {}\n",
        summary.total_skipped()
    ));
    md.push_str(&format!("- **Search Pages**: {}\n", summary.total_pages()));
    md.push_str(&format!(
        "- **Unreachable Results**: {}\n",
        summary.total_unreachable()
    ));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    // Per-window breakdown
    if !summary.periods.is_empty() {
        md.push_str("## Periods\n\n");
        md.push_str("| Start | End | Downloaded | Pages | Failed | Skipped | Leaves | Unreachable |\n");
        md.push_str("|-------|-----|------------|-------|--------|---------|--------|-------------|\n");

        for period in &summary.periods {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
                period.window.start(),
                period.window.end(),
                period.downloaded,
                period.pages_processed,
                period.failed,
                period.skipped,
                period.leaf_windows,
                period.unreachable
            ));
        }
        md.push('\n');
    }

    if summary.total_unreachable() > 0 {
        md.push_str(
            "> Some single-day windows held more results than the search API returns; \
             the surplus could not be enumerated.\n\n",
        );
    }

    // Failures
    if !failures.is_empty() {
        md.push_str("## Failed Downloads\n\n");
        md.push_str("| Repository | Branch | Error |\n");
        md.push_str("|------------|--------|-------|\n");

        for failure in failures {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                table_cell(&failure.full_name),
                table_cell(&failure.branch),
                table_cell(&failure.detail)
            ));
        }
        md.push('\n');
    }

    md
}

/// Keeps free text on one table row: pipes are escaped, line breaks folded
fn table_cell(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}
