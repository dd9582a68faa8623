use cfgladder_core::Ledger;
use serde::Serialize;

use crate::render::{render_section_header, render_status_line, OutputStyle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct StatusReport {
    pub(crate) config_root: String,
    /// `None` when no marker exists yet; a run would start from the first
    /// ledger entry.
    pub(crate) current_version: Option<String>,
    pub(crate) latest_version: String,
    pub(crate) known_version: bool,
    pub(crate) up_to_date: bool,
    pub(crate) pending: Vec<PendingStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct PendingStep {
    pub(crate) label: String,
    pub(crate) step: String,
    pub(crate) resulting_version: String,
}

pub(crate) fn build_status_report(
    ledger: &Ledger,
    config_root: &str,
    current_version: Option<String>,
) -> StatusReport {
    let start = current_version
        .as_deref()
        .unwrap_or_else(|| ledger.first_label());
    let pending_entries = ledger.pending_from(start);
    let known_version = pending_entries.is_some();
    let pending = pending_entries
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| {
            entry.step().map(|step| PendingStep {
                label: entry.label().to_string(),
                step: step.name().to_string(),
                resulting_version: entry.resulting_version().to_string(),
            })
        })
        .collect::<Vec<_>>();

    StatusReport {
        config_root: config_root.to_string(),
        up_to_date: known_version && pending.is_empty(),
        current_version,
        latest_version: ledger.latest_label().to_string(),
        known_version,
        pending,
    }
}

pub(crate) fn format_status_lines(report: &StatusReport, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("config root: {}", report.config_root));
    lines.push(format!(
        "current version: {}",
        report
            .current_version
            .as_deref()
            .unwrap_or("(no marker, starts at first ledger entry)")
    ));
    lines.push(format!("latest version: {}", report.latest_version));

    if !report.known_version {
        lines.push(render_status_line(
            style,
            "error",
            "current version is not in the ledger; upgrade will fail",
        ));
        return lines;
    }
    if report.up_to_date {
        lines.push(render_status_line(style, "ok", "configuration is up to date"));
        return lines;
    }

    lines.push(render_status_line(
        style,
        "pending",
        &format!("{} upgrade step(s) pending", report.pending.len()),
    ));
    for step in &report.pending {
        lines.push(format!(
            "  {} {} -> {}",
            step.label, step.step, step.resulting_version
        ));
    }
    lines
}

pub(crate) fn format_ledger_lines(ledger: &Ledger, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(header) = render_section_header(style, "ledger") {
        lines.push(header);
    }

    let width = ledger
        .entries()
        .iter()
        .map(|entry| entry.label().len())
        .max()
        .unwrap_or(0);
    for entry in ledger.entries() {
        match entry.step() {
            Some(step) => lines.push(format!(
                "{:<width$}  {} -> {}",
                entry.label(),
                step.name(),
                entry.resulting_version()
            )),
            None => lines.push(format!("{:<width$}  (latest)", entry.label())),
        }
    }

    for warning in ledger.lint() {
        lines.push(render_status_line(style, "warn", &warning));
    }
    lines
}
