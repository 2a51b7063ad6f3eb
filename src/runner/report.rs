//! Run report
//!
//! An ordered, append-only record of what happened to each task of a run.

use std::time::Duration;

/// Outcome of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// The task body ran and succeeded
    Executed,

    /// The task has no body; it only groups its dependencies
    Delegated,

    /// Criteria were not met; nothing was invoked
    Skipped { reason: String },

    /// The task failed
    Errored { message: String },
}

impl TaskStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Executed => "Executed",
            TaskStatus::Delegated => "Delegated",
            TaskStatus::Skipped { .. } => "Skipped",
            TaskStatus::Errored { .. } => "Errored",
        }
    }
}

/// One line of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub name: String,
    pub duration: Duration,
    pub status: TaskStatus,
}

impl ReportEntry {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, TaskStatus::Skipped { .. })
    }

    pub fn skip_reason(&self) -> Option<&str> {
        match &self.status {
            TaskStatus::Skipped { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.status, TaskStatus::Errored { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            TaskStatus::Errored { message } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_executed(&mut self, name: &str, duration: Duration) {
        self.push(name, duration, TaskStatus::Executed);
    }

    pub fn add_delegated(&mut self, name: &str, duration: Duration) {
        self.push(name, duration, TaskStatus::Delegated);
    }

    /// Skipped tasks never run, so they carry no duration
    pub fn add_skipped(&mut self, name: &str, reason: impl Into<String>) {
        self.push(
            name,
            Duration::ZERO,
            TaskStatus::Skipped {
                reason: reason.into(),
            },
        );
    }

    pub fn add_errored(&mut self, name: &str, duration: Duration, message: impl Into<String>) {
        self.push(
            name,
            duration,
            TaskStatus::Errored {
                message: message.into(),
            },
        );
    }

    fn push(&mut self, name: &str, duration: Duration, status: TaskStatus) {
        self.entries.push(ReportEntry {
            name: name.to_string(),
            duration,
            status,
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for a task (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&ReportEntry> {
        let key = crate::graph::task_key(name);
        self.entries
            .iter()
            .find(|e| crate::graph::task_key(&e.name) == key)
    }

    /// Task names in the order they were recorded
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.entries.iter().map(|e| e.duration).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(ReportEntry::is_errored)
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = &'a ReportEntry;
    type IntoIter = std::slice::Iter<'a, ReportEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order() {
        let mut report = Report::new();
        report.add_executed("clean", Duration::from_millis(10));
        report.add_skipped("lint", "CI only");
        report.add_errored("build", Duration::from_millis(30), "boom");

        assert_eq!(report.names(), vec!["clean", "lint", "build"]);
        assert_eq!(report.total_duration(), Duration::from_millis(40));
        assert!(report.has_errors());
    }

    #[test]
    fn test_entry_accessors() {
        let mut report = Report::new();
        report.add_skipped("lint", "CI only");
        report.add_errored("build", Duration::ZERO, "boom");

        let lint = report.get("LINT").unwrap();
        assert!(lint.is_skipped());
        assert_eq!(lint.skip_reason(), Some("CI only"));
        assert!(!lint.is_errored());

        let build = report.get("build").unwrap();
        assert!(build.is_errored());
        assert_eq!(build.error_message(), Some("boom"));
        assert_eq!(build.skip_reason(), None);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(TaskStatus::Delegated.label(), "Delegated");
        assert_eq!(
            TaskStatus::Skipped {
                reason: String::new()
            }
            .label(),
            "Skipped"
        );
    }
}
