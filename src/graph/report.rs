//! Run reports.
//!
//! A workflow run produces one [`StageOutcome`] per executed leaf, in the
//! order the workflow listed them. Concurrent children are merged back in
//! their registration order, never in completion order, so reports are
//! stable across runs.

use std::time::Duration;

use crate::diagnostics::Diagnostic;

/// How a single stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// Ran to completion with a usable result
    Success,
    /// Ran to completion but the result is unusable (lint policy hit,
    /// per-file compile errors)
    Failed,
    /// Aborted by an unrecoverable error
    Fatal(String),
}

impl StageStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StageStatus::Success)
    }
}

/// Result of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    /// Stage name
    pub stage: String,
    pub status: StageStatus,
    /// Files written to the destination tree
    pub files_written: usize,
    /// Wall-clock stage duration
    pub duration: Duration,
    /// Per-file findings
    pub diagnostics: Vec<Diagnostic>,
}

/// Aggregated result of a workflow run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Workflow that was invoked
    pub workflow: String,
    /// Executed stages, in workflow order
    pub outcomes: Vec<StageOutcome>,
    /// Total wall-clock time
    pub duration: Duration,
}

impl RunReport {
    /// True when every executed stage succeeded.
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_success())
    }

    pub fn files_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.files_written).sum()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes
            .iter()
            .flat_map(|o| &o.diagnostics)
            .filter(|d| d.is_error())
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.outcomes
            .iter()
            .flat_map(|o| &o.diagnostics)
            .filter(|d| !d.is_error())
            .count()
    }

    /// Human-readable summary: one line per stage, diagnostics grouped
    /// under the stage that produced them, then a totals line.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            let marker = match &outcome.status {
                StageStatus::Success => "ok",
                StageStatus::Failed => "FAILED",
                StageStatus::Fatal(_) => "FATAL",
            };
            out.push_str(&format!(
                "  {:<20} {:>6}  {} files, {:.1?}\n",
                outcome.stage, marker, outcome.files_written, outcome.duration
            ));
            if let StageStatus::Fatal(message) = &outcome.status {
                out.push_str(&format!("    error: {}\n", message));
            }
            for diag in &outcome.diagnostics {
                out.push_str(&format!("    {}\n", diag));
            }
        }

        let verdict = if self.success() { "succeeded" } else { "failed" };
        out.push_str(&format!(
            "{} {} ({} files, {} errors, {} warnings, {:.1?})\n",
            self.workflow,
            verdict,
            self.files_written(),
            self.error_count(),
            self.warning_count(),
            self.duration
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn outcome(stage: &str, status: StageStatus) -> StageOutcome {
        StageOutcome {
            stage: stage.to_string(),
            status,
            files_written: 2,
            duration: Duration::from_millis(5),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_success_requires_all_stages() {
        let mut report = RunReport {
            workflow: "build".to_string(),
            outcomes: vec![outcome("a", StageStatus::Success)],
            duration: Duration::from_millis(10),
        };
        assert!(report.success());

        report.outcomes.push(outcome("b", StageStatus::Failed));
        assert!(!report.success());
    }

    #[test]
    fn test_counts() {
        let mut o = outcome("lint-scripts", StageStatus::Failed);
        o.diagnostics = vec![
            Diagnostic::error(PathBuf::from("a.js"), "unexpected debugger statement"),
            Diagnostic::warning(PathBuf::from("a.js"), "unresolved TODO"),
        ];
        let report = RunReport {
            workflow: "lint".to_string(),
            outcomes: vec![o],
            duration: Duration::from_millis(3),
        };
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.files_written(), 2);
    }

    #[test]
    fn test_summary_groups_by_stage() {
        let mut o = outcome("lint-scripts", StageStatus::Failed);
        o.diagnostics =
            vec![Diagnostic::error(PathBuf::from("a.js"), "unexpected debugger statement")];
        let report = RunReport {
            workflow: "lint".to_string(),
            outcomes: vec![outcome("lint-styles", StageStatus::Success), o],
            duration: Duration::from_millis(3),
        };

        let summary = report.summary();
        assert!(summary.contains("lint-styles"));
        assert!(summary.contains("lint-scripts"));
        assert!(summary.contains("unexpected debugger statement"));
        assert!(summary.contains("lint failed"));
    }

    #[test]
    fn test_reports_compare_by_value() {
        let make = || RunReport {
            workflow: "lint".to_string(),
            outcomes: vec![StageOutcome {
                stage: "lint-scripts".to_string(),
                status: StageStatus::Failed,
                files_written: 0,
                duration: Duration::from_millis(2),
                diagnostics: vec![Diagnostic::error(PathBuf::from("a.js"), "nope").with_line(1)],
            }],
            duration: Duration::from_millis(2),
        };
        assert_eq!(make(), make());

        let mut other = make();
        other.outcomes[0].status = StageStatus::Success;
        assert_ne!(make(), other);
    }

    #[test]
    fn test_summary_reports_fatal_message() {
        let report = RunReport {
            workflow: "build".to_string(),
            outcomes: vec![outcome("clean", StageStatus::Fatal("disk on fire".to_string()))],
            duration: Duration::from_millis(1),
        };
        assert!(report.summary().contains("disk on fire"));
    }
}
