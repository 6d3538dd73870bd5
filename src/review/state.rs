//! Per-note review state threaded through the orchestrator.

use crate::issue::ReviewIssue;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// One audit-log entry recorded by a pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub iteration: usize,
    pub stage: String,
    pub message: String,
}

/// Mutable record for one note's trip through the review loop.
#[derive(Debug, Clone)]
pub struct ReviewState {
    pub note_path: PathBuf,
    pub original_text: String,
    pub current_text: String,
    pub issues: Vec<ReviewIssue>,
    pub iteration: usize,
    pub max_iterations: usize,
    pub changed: bool,
    pub completed: bool,
    pub requires_human_review: bool,
    pub error: Option<String>,
    pub qa_passed: Option<bool>,
    pub qa_summary: Option<String>,
    /// Raw issue signatures captured per iteration, warnings included.
    pub issue_history: Vec<BTreeSet<String>>,
    pub history: Vec<HistoryEntry>,
    /// Set when the note must be relocated after review.
    pub moved_to: Option<PathBuf>,
}

impl ReviewState {
    pub fn new(note_path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let original_text = text.into();
        ReviewState {
            note_path: note_path.into(),
            current_text: original_text.clone(),
            original_text,
            issues: Vec::new(),
            iteration: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            changed: false,
            completed: false,
            requires_human_review: false,
            error: None,
            qa_passed: None,
            qa_summary: None,
            issue_history: Vec::new(),
            history: Vec::new(),
            moved_to: None,
        }
    }

    pub fn record(&mut self, stage: &str, message: impl Into<String>) {
        self.history.push(HistoryEntry {
            iteration: self.iteration,
            stage: stage.to_string(),
            message: message.into(),
        });
    }

    /// Snapshot the current issues' signatures into the history.
    pub fn record_issue_snapshot(&mut self) {
        let signatures: BTreeSet<String> =
            self.issues.iter().map(|issue| issue.signature()).collect();
        self.issue_history.push(signatures);
    }

    pub fn has_blocking_issues(&self) -> bool {
        self.issues.iter().any(|issue| issue.severity.is_blocking())
    }

    pub fn should_continue(&self) -> bool {
        !self.issues.is_empty()
            && self.iteration < self.max_iterations
            && !self.completed
            && self.error.is_none()
    }
}

/// Outcome of one fixer invocation.
#[derive(Debug, Clone, Default)]
pub struct FixResult {
    pub changes_made: bool,
    pub revised_text: String,
    pub fixes_applied: Vec<String>,
    pub issues_fixed: Vec<String>,
    pub file_moved: bool,
    pub new_file_path: Option<PathBuf>,
}

impl FixResult {
    pub fn unchanged(text: &str) -> Self {
        FixResult {
            revised_text: text.to_string(),
            ..FixResult::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;

    #[test]
    fn test_should_continue_bounds() {
        let mut state = ReviewState::new("/vault/q-a--algorithms--easy.md", "text");
        assert!(!state.should_continue());

        state.issues.push(ReviewIssue::new(Severity::Error, "broken"));
        assert!(state.should_continue());

        state.iteration = state.max_iterations;
        assert!(!state.should_continue());

        state.iteration = 1;
        state.completed = true;
        assert!(!state.should_continue());
    }

    #[test]
    fn test_issue_snapshot_captures_signatures() {
        let mut state = ReviewState::new("/vault/q-a--algorithms--easy.md", "text");
        state.issues.push(ReviewIssue::new(Severity::Error, "broken link"));
        state.issues.push(ReviewIssue::new(Severity::Warning, "style"));
        state.record_issue_snapshot();

        assert_eq!(state.issue_history.len(), 1);
        assert!(state.issue_history[0].contains("ERROR: broken link"));
        assert!(state.issue_history[0].contains("WARNING: style"));
    }
}
