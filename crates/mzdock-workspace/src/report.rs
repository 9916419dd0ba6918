use serde::Serialize;

use crate::cache::SummaryTable;

/// Receives user-facing status from workspace operations.
pub trait Reporter {
    fn info(&mut self, message: &str);
    fn success(&mut self, message: &str);
    fn warning(&mut self, message: &str);
    fn error(&mut self, message: &str);
    fn table(&mut self, table: &SummaryTable);

    fn progress_started(&mut self, _label: &str) {}
    fn progress_finished(&mut self, _label: &str) {}
}

/// Shows an "in progress" indicator for as long as it lives.
pub struct ProgressGuard<'a> {
    reporter: &'a mut dyn Reporter,
    label: String,
}

impl<'a> ProgressGuard<'a> {
    pub fn begin(reporter: &'a mut dyn Reporter, label: impl Into<String>) -> Self {
        let label = label.into();
        reporter.progress_started(&label);
        Self { reporter, label }
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.reporter.progress_finished(&self.label);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReportEvent {
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
    Table(SummaryTable),
    ProgressStarted(String),
    ProgressFinished(String),
}

/// Collects events in order; used for JSON output and in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl RecordingReporter {
    pub fn messages(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Info(m)
                | ReportEvent::Success(m)
                | ReportEvent::Warning(m)
                | ReportEvent::Error(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Error(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Progress indicators still open.
    pub fn open_progress(&self) -> usize {
        let started = self
            .events
            .iter()
            .filter(|e| matches!(e, ReportEvent::ProgressStarted(_)))
            .count();
        let finished = self
            .events
            .iter()
            .filter(|e| matches!(e, ReportEvent::ProgressFinished(_)))
            .count();
        started - finished
    }
}

impl Reporter for RecordingReporter {
    fn info(&mut self, message: &str) {
        self.events.push(ReportEvent::Info(message.to_string()));
    }

    fn success(&mut self, message: &str) {
        self.events.push(ReportEvent::Success(message.to_string()));
    }

    fn warning(&mut self, message: &str) {
        self.events.push(ReportEvent::Warning(message.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.events.push(ReportEvent::Error(message.to_string()));
    }

    fn table(&mut self, table: &SummaryTable) {
        self.events.push(ReportEvent::Table(table.clone()));
    }

    fn progress_started(&mut self, label: &str) {
        self.events.push(ReportEvent::ProgressStarted(label.to_string()));
    }

    fn progress_finished(&mut self, label: &str) {
        self.events.push(ReportEvent::ProgressFinished(label.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_guard_clears_on_early_return() {
        fn failing(reporter: &mut dyn Reporter) -> Result<(), String> {
            let _progress = ProgressGuard::begin(reporter, "Parsing the experiment x...");
            Err("boom".to_string())
        }
        let mut reporter = RecordingReporter::default();
        assert!(failing(&mut reporter).is_err());
        assert_eq!(reporter.open_progress(), 0);
        assert_eq!(reporter.events.len(), 2);
    }
}
