//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;

use crate::domain::report::{Action, Operation, Report};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render a run report: one line per resource, then a summary.
    ///
    /// Failures are printed even in quiet mode.
    pub fn render_report(&self, report: &Report) {
        let styles = &self.ctx.styles;
        if !self.ctx.quiet {
            println!();
            println!(
                "  {}",
                operation_title(report.operation).style(styles.header)
            );
            println!();
        }

        let width = report
            .entries
            .iter()
            .map(|e| e.resource.to_string().len())
            .max()
            .unwrap_or(0);

        for entry in &report.entries {
            let resource = format!("{:<width$}", entry.resource.to_string());
            let label = action_label(&entry.action);
            match &entry.action {
                Action::Failed { .. } => {
                    eprintln!("    {} {resource}  {label}", "✗".style(styles.error));
                }
                _ if self.ctx.quiet => {}
                Action::Created | Action::Attached | Action::Removed | Action::PoweredOn => {
                    println!("    {} {resource}  {label}", "✓".style(styles.success));
                }
                Action::Retained { .. } => {
                    println!("    {} {resource}  {label}", "⚠".style(styles.warning));
                }
                Action::AlreadyExists | Action::AlreadyRunning | Action::AlreadyAbsent => {
                    println!(
                        "    {} {resource}  {}",
                        "•".style(styles.dim),
                        label.style(styles.dim)
                    );
                }
            }
        }

        if !self.ctx.quiet {
            println!();
            self.ctx.kv("Summary:", &summary_line(report));
            println!();
        }
    }
}

// ── Display helpers (used by tests and output layer) ─────────────────────────

/// Title line of a report.
#[must_use]
pub fn operation_title(operation: Operation) -> &'static str {
    match operation {
        Operation::Provision => "Provisioning report",
        Operation::Teardown => "Undo report",
    }
}

/// Short description of an action.
#[must_use]
pub fn action_label(action: &Action) -> String {
    match action {
        Action::Created => "created".to_string(),
        Action::AlreadyExists => "already exists".to_string(),
        Action::Attached => "network attached".to_string(),
        Action::PoweredOn => "powered on".to_string(),
        Action::AlreadyRunning => "already running".to_string(),
        Action::Removed => "removed".to_string(),
        Action::AlreadyAbsent => "already absent".to_string(),
        Action::Retained { reason } => format!("retained: {reason}"),
        Action::Failed { step, error } => format!("failed to {}: {error}", step.as_str()),
    }
}

/// Non-zero counts, e.g. `5 created, 2 powered on, 1 failed`.
#[must_use]
pub fn summary_line(report: &Report) -> String {
    let counts = [
        (report.count(|a| *a == Action::Created), "created"),
        (report.count(|a| *a == Action::AlreadyExists), "already existed"),
        (report.count(|a| *a == Action::Attached), "re-attached"),
        (report.count(|a| *a == Action::PoweredOn), "powered on"),
        (report.count(|a| *a == Action::AlreadyRunning), "already running"),
        (report.count(|a| *a == Action::Removed), "removed"),
        (report.count(|a| *a == Action::AlreadyAbsent), "already absent"),
        (
            report.count(|a| matches!(a, Action::Retained { .. })),
            "retained",
        ),
        (report.count(Action::is_failure), "failed"),
    ];
    let parts: Vec<String> = counts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();
    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}
