use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use vendorswap_actions::ExecutionObserver;
use vendorswap_conversion::{ConversionOutcome, ConversionState, PlanSummary, PONR_MARKER};
use vendorswap_core::{
    format_section_heading, format_sequence, render_summary_lines, Report, Severity,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn resolve_output_style(stdout_is_tty: bool, _stderr_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::io::stderr().is_terminal(),
    )
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("[{}] {message}", status.to_ascii_uppercase()),
    }
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn severity_style(severity: Severity) -> Style {
    let color = match severity {
        Severity::Success => AnsiColor::Green,
        Severity::Info => AnsiColor::BrightBlue,
        Severity::Warning => AnsiColor::Yellow,
        Severity::Skip => AnsiColor::BrightBlack,
        Severity::Overridable => AnsiColor::Magenta,
        Severity::Error => AnsiColor::Red,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

/// Summary of `report`; in rich mode each severity heading is coloured.
pub fn format_report_lines(report: &Report, style: OutputStyle, include_all: bool) -> Vec<String> {
    let lines = render_summary_lines(report, include_all);
    if style == OutputStyle::Plain {
        return lines;
    }
    lines
        .into_iter()
        .map(|line| {
            match Severity::all()
                .iter()
                .find(|severity| line == format_section_heading(**severity))
            {
                Some(severity) => colorize(severity_style(*severity), &line),
                None => line,
            }
        })
        .collect()
}

pub fn format_plan_lines(plan: &PlanSummary) -> Vec<String> {
    let mut lines = vec!["assessment:".to_string()];
    lines.extend(
        plan.assessment
            .iter()
            .enumerate()
            .map(|(index, id)| format!("  {}. {id}", index + 1)),
    );
    lines.push("destructive steps:".to_string());
    if plan.steps.is_empty() {
        lines.push("  (none)".to_string());
    }
    for step in &plan.steps {
        if step == PONR_MARKER {
            lines.push(format!("  -- {PONR_MARKER} --"));
        } else {
            lines.push(format!("  - {step}"));
        }
    }
    if !plan.post_conversion.is_empty() {
        lines.push(format!(
            "post-conversion: {}",
            format_sequence(&plan.post_conversion)
        ));
    }
    lines
}

pub fn format_outcome_lines(outcome: &ConversionOutcome, style: OutputStyle) -> Vec<String> {
    let code = outcome.exit_code().code();
    let (status, message) = match outcome.state {
        ConversionState::Converted => ("ok", "conversion finished".to_string()),
        ConversionState::Analyzed => {
            ("ok", "analysis passed; the system can be converted".to_string())
        }
        ConversionState::Inhibited => (
            "error",
            format!(
                "conversion inhibited by assessment status {}",
                outcome.assessment.status()
            ),
        ),
        ConversionState::RolledBack => (
            "warn",
            format!(
                "conversion rolled back: {}",
                outcome.failure.as_deref().unwrap_or("unknown failure")
            ),
        ),
        other => ("error", format!("run stopped in state {}", other.as_str())),
    };

    let mut lines = vec![render_status_line(style, status, &message)];
    if let Some(summary) = &outcome.rollback {
        lines.push(render_status_line(
            style,
            "step",
            &format!(
                "restored {} backup(s), retained {}",
                summary.restored.len(),
                summary.retained.len()
            ),
        ));
        for record in &summary.retained {
            lines.push(render_status_line(
                style,
                "warn",
                &format!(
                    "kept past the point of no return: #{} {}",
                    record.seq, record.description
                ),
            ));
        }
        for failure in &summary.failed {
            lines.push(render_status_line(
                style,
                "error",
                &format!(
                    "could not restore {}: {}; manual remediation required",
                    failure.record.description, failure.error
                ),
            ));
        }
    }
    lines.push(render_status_line(
        style,
        "step",
        &format!("run {} exit code {code}", outcome.run_id),
    ));
    lines
}

/// Progress bar over the assessment; silent in plain mode.
pub struct ProgressObserver {
    progress_bar: Option<ProgressBar>,
}

impl ProgressObserver {
    pub fn new(style: OutputStyle, total: usize) -> Self {
        let progress_bar = if style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(total.max(1) as u64);
            if let Ok(template) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<32} [{bar:20.cyan/blue}] {pos:>3}/{len:3}",
            ) {
                progress_bar.set_style(template.progress_chars("=>-"));
            }
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };
        Self { progress_bar }
    }

    pub fn finish(&self) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.finish_and_clear();
        }
    }
}

impl ExecutionObserver for ProgressObserver {
    fn action_started(&self, action_id: &str) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.set_message(action_id.to_string());
        }
    }

    fn action_finished(&self, _action_id: &str, _status: Severity) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.inc(1);
            if progress_bar.length().is_some_and(|length| progress_bar.position() >= length) {
                progress_bar.finish_and_clear();
            }
        }
    }
}
