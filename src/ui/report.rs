//! Report printers
//!
//! A run report can be handed to any number of printers; the CLI resolves
//! all registered printers from the service container.

use crate::runner::{Report, TaskStatus, Verbosity};
use colored::{ColoredString, Colorize};
use std::time::Duration;
use tracing::info;

/// A sink for a finished (or aborted) run's report
pub trait ReportPrinter {
    fn print(&self, report: &Report);
}

/// Format a duration as `hh:mm:ss.mmm`
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let seconds = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60,
        millis % 1000
    )
}

fn status_text(status: &TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Executed => status.label().green(),
        TaskStatus::Delegated => status.label().dimmed(),
        TaskStatus::Skipped { .. } => status.label().yellow(),
        TaskStatus::Errored { .. } => status.label().red().bold(),
    }
}

/// Prints the report as a table on stderr
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReportPrinter {
    verbosity: Verbosity,
}

impl ConsoleReportPrinter {
    pub fn new(verbosity: Verbosity) -> Self {
        ConsoleReportPrinter { verbosity }
    }

    /// Render the report table
    pub fn render(&self, report: &Report) -> String {
        let width = report
            .iter()
            .map(|entry| entry.name.len())
            .chain(std::iter::once("Task".len()))
            .max()
            .unwrap_or_default()
            + 4;
        let rule = "-".repeat(width + 28);

        let mut output = String::new();
        output.push_str(&format!("{:<width$}{:<16}{}\n", "Task", "Duration", "Status"));
        output.push_str(&rule);
        output.push('\n');

        for entry in report {
            let line = format!(
                "{:<width$}{:<16}{}",
                entry.name,
                format_duration(entry.duration),
                status_text(&entry.status)
            );
            match &entry.status {
                TaskStatus::Skipped { .. } | TaskStatus::Delegated => {
                    output.push_str(&line.dimmed().to_string())
                }
                _ => output.push_str(&line),
            }
            output.push('\n');

            if self.verbosity >= Verbosity::Verbose {
                if let Some(reason) = entry.skip_reason() {
                    output.push_str(&format!("  {}\n", reason.dimmed()));
                }
            }
            if let Some(message) = entry.error_message() {
                output.push_str(&format!("  {}\n", message.red()));
            }
        }

        output.push_str(&rule);
        output.push('\n');
        output.push_str(&format!(
            "{:<width$}{}\n",
            "Total:",
            format_duration(report.total_duration())
        ));
        output
    }
}

impl ReportPrinter for ConsoleReportPrinter {
    fn print(&self, report: &Report) {
        if self.verbosity < Verbosity::Normal || report.is_empty() {
            return;
        }
        eprintln!();
        eprint!("{}", self.render(report));
    }
}

/// Emits one structured `tracing` event per report entry
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReportPrinter;

impl ReportPrinter for TracingReportPrinter {
    fn print(&self, report: &Report) {
        for entry in report {
            info!(
                task = %entry.name,
                duration_ms = entry.duration.as_millis() as u64,
                status = entry.status.label(),
                "task outcome"
            );
        }
        info!(
            tasks = report.len(),
            total_ms = report.total_duration().as_millis() as u64,
            errors = report.has_errors(),
            "run summary"
        );
    }
}
