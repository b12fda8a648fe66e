//! `TerminalReporter` — Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` and implements the `application::ports::ProgressReporter`
//! trait so application services can emit progress events without depending on
//! any presentation type directly.

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// On an interactive terminal each step replaces the message of a single
/// spinner. Otherwise steps are printed as `"  → {message}"` lines. Nothing
/// is printed when `ctx.quiet` is set.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    spinner: Option<ProgressBar>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        let spinner = ctx.show_progress().then(|| progress::spinner("starting"));
        Self { ctx, spinner }
    }

    /// Reporter that never draws a spinner.
    #[must_use]
    pub fn plain(ctx: &'a OutputContext) -> Self {
        Self { ctx, spinner: None }
    }

    #[must_use]
    pub fn has_spinner(&self) -> bool {
        self.spinner.is_some()
    }

    /// Clear the spinner so the report can be printed on a clean line.
    pub fn finish(&self) {
        if let Some(pb) = &self.spinner {
            pb.finish_and_clear();
        }
    }

    fn print(&self, line: String) {
        match &self.spinner {
            Some(pb) => pb.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        match &self.spinner {
            Some(pb) => pb.set_message(message.to_string()),
            None => println!("  {} {message}", "→".style(self.ctx.styles.info)),
        }
    }

    fn success(&self, message: &str) {
        if !self.ctx.quiet {
            self.print(format!("  {} {message}", "✓".style(self.ctx.styles.success)));
        }
    }

    fn warn(&self, message: &str) {
        if !self.ctx.quiet {
            self.print(format!("  {} {message}", "⚠".style(self.ctx.styles.warning)));
        }
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
