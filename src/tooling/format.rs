//! Format stage reports and store status as text.

use crate::pipeline::StageReport;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// One table row per stage run.
pub fn format_stage_reports_text(reports: &[&StageReport]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Run Summary")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Stage", "Selected", "Succeeded", "Skipped", "Failed"]);
    for report in reports {
        table.add_row(vec![
            report.stage.to_string(),
            report.selected.to_string(),
            report.succeeded.to_string(),
            report.skipped.to_string(),
            report.failed.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

/// Per-status user counts of the status store.
pub fn format_status_text(
    store_path: &str,
    collection: &str,
    counts: &BTreeMap<String, usize>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Hive Status")));
    out.push_str(&format!("  Store path: {}\n", store_path));
    out.push_str(&format!("  Collection: {}\n\n", collection));
    if counts.is_empty() {
        out.push_str("No users discovered yet.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Status", "Users"]);
    for (status, count) in counts {
        table.add_row(vec![status.clone(), count.to_string()]);
    }
    let total: usize = counts.values().sum();
    table.add_row(vec!["total".to_string(), total.to_string()]);
    out.push_str(&format!("{}\n", table));
    out
}
