//! Terminal rendering of a run report

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use phase_market::{SynthesisReport, keys, report_value};
use phase_workflow::RunReport;

const TIME_FORMAT: &str = "%m-%d %H:%M";

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// One row per phase, in plan order
pub fn status_table(report: &RunReport) -> Table {
    let mut table = table(vec!["Phase", "Status", "Group", "Elapsed", "Reason"]);
    for record in &report.phases {
        table.add_row(vec![
            record.id.clone(),
            record.status.to_string(),
            record.group.map_or_else(|| "-".to_string(), |g| g.to_string()),
            record
                .elapsed
                .map_or_else(|| "-".to_string(), |e| format!("{}ms", e.as_millis())),
            record.reason().unwrap_or_default(),
        ]);
    }
    table
}

/// One row per cluster with its forecast; `None` when synthesis did not run
pub fn cluster_table(report: &RunReport) -> Option<Table> {
    let synthesis: SynthesisReport = report_value(report, &keys::SYNTHESIS)?;

    let mut table = table(vec!["Cluster", "Avg high", "Points", "First", "Last", "Forecast"]);
    for entry in &synthesis.entries {
        table.add_row(vec![
            entry.cluster.to_string(),
            format!("{:.2}", entry.average),
            entry.points.to_string(),
            entry
                .first
                .map(|t| t.format(TIME_FORMAT).to_string())
                .unwrap_or_default(),
            entry
                .last
                .map(|t| t.format(TIME_FORMAT).to_string())
                .unwrap_or_default(),
            entry.prediction.clone().unwrap_or_default(),
        ]);
    }
    Some(table)
}

/// The profile summary with a heading
pub fn profile_text(report: &RunReport) -> Option<String> {
    let synthesis = report_value(report, &keys::SYNTHESIS)?;
    Some(format!(
        "{} {} profile:\n{}",
        synthesis.symbol, synthesis.interval, synthesis.profile
    ))
}
