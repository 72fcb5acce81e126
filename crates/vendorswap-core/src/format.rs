use crate::report::{Report, ReportEntry};
use crate::severity::Severity;

pub const NO_PROBLEMS_LINE: &str = "No problems detected during the analysis!";

/// Join items for human output: `a`, `a and b`, `a, b, and c`.
pub fn format_sequence<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [one] => one.as_ref().to_string(),
        [first, second] => format!("{} and {}", first.as_ref(), second.as_ref()),
        [head @ .., last] => {
            let head = head.iter().map(|item| item.as_ref()).collect::<Vec<_>>().join(", ");
            format!("{head}, and {}", last.as_ref())
        }
    }
}

pub fn format_entry_line(entry: &ReportEntry) -> String {
    let detail = if entry.title.is_empty() {
        "[No further information given]"
    } else {
        entry.title.as_str()
    };
    format!(
        "({}) {}.{}: {}",
        entry.severity, entry.action_id, entry.diagnostic_id, detail
    )
}

pub fn format_section_heading(severity: Severity) -> String {
    let highlight = "=".repeat(10);
    format!("{highlight} {} {highlight}", severity.summary_header())
}

/// Plain-text summary lines, grouped under severity headings.
///
/// With `include_all` every entry is listed; otherwise only WARNING and
/// worse are shown.
pub fn render_summary_lines(report: &Report, include_all: bool) -> Vec<String> {
    let min = if include_all {
        Severity::Success
    } else {
        Severity::Warning
    };
    let entries = report.entries_at_least(min);
    if entries.is_empty() {
        return vec![NO_PROBLEMS_LINE.to_string()];
    }

    let mut lines = Vec::new();
    let mut last_severity = None;
    for entry in &entries {
        if last_severity != Some(entry.severity) {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format_section_heading(entry.severity));
            last_severity = Some(entry.severity);
        }
        lines.push(format_entry_line(entry));
        if !entry.description.is_empty() {
            lines.push(format!("    {}", entry.description));
        }
    }
    lines
}
