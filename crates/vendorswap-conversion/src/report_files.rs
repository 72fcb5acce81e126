use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use uuid::Uuid;
use vendorswap_backup::StateLayout;
use vendorswap_core::{render_summary_lines, Report};

pub const ASSESSMENT_REPORT: &str = "assessment";
pub const POST_CONVERSION_REPORT: &str = "post-conversion";

/// Write `<stem>.json` (machine-readable) and `<stem>.txt` (summary of every
/// entry) into the state directory.
pub fn write_report_files(
    layout: &StateLayout,
    stem: &str,
    report: &Report,
    run_id: &Uuid,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(layout.root())
        .with_context(|| format!("failed to create {}", layout.root().display()))?;

    let json_path = layout.report_json_path(stem);
    let json = report
        .to_json_pretty()
        .with_context(|| format!("failed to serialize {stem} report"))?;
    fs::write(&json_path, format!("{json}\n"))
        .with_context(|| format!("failed to write report: {}", json_path.display()))?;

    let text_path = layout.report_text_path(stem);
    let mut lines = vec![format!("Run ID: {run_id}"), String::new()];
    lines.extend(render_summary_lines(report, true));
    fs::write(&text_path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("failed to write report: {}", text_path.display()))?;

    Ok((json_path, text_path))
}
