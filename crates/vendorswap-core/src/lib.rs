mod diagnostic;
mod document;
mod format;
mod ids;
mod report;
mod severity;

pub use diagnostic::{substitute_variables, ActionMessage, ActionResult, Diagnostic};
pub use document::{ReportDocument, ReportFormatError, REPORT_FORMAT_VERSION};
pub use format::{
    format_entry_line, format_section_heading, format_sequence, render_summary_lines,
    NO_PROBLEMS_LINE,
};
pub use ids::is_valid_id;
pub use report::{ActionReport, Report, ReportEntry};
pub use severity::{MessageLevel, ResultLevel, Severity};
