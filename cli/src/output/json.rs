//! JSON output helpers.
//!
//! `--json` prints exactly one document on stdout: the run report on success,
//! or an error object when the run aborts.

use anyhow::{Context, Result};

use crate::domain::report::Report;

/// Machine-readable renderer.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Print the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_report(&self, report: &Report) -> Result<()> {
        println!("{}", format_report(report)?);
        Ok(())
    }
}

/// Serialize a report.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn format_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("JSON serialization failed")
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "...",
///   "report": { ... }
/// }
/// ```
///
/// `report` is present only when the run aborted after recording entries.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str, report: Option<&Report>) -> Result<String> {
    let mut obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    if let Some(report) = report {
        obj["report"] = serde_json::to_value(report).context("JSON serialization failed")?;
    }
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}
