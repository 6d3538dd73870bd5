//! Strict QA gate applied before a note is marked complete.

use super::history::{detect_oscillation, filter_blocking_history};
use crate::issue::{ReviewIssue, Severity};
use std::collections::BTreeSet;

/// Why QA refused to pass a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaBlockingReason {
    /// error | regression | oscillation | timestamp
    pub category: &'static str,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct QaResult {
    pub should_pass: bool,
    pub blocking_reasons: Vec<QaBlockingReason>,
    pub warnings: Vec<String>,
    pub summary: String,
}

/// Iteration count beyond which QA flags complexity (non-blocking).
const HIGH_ITERATION_THRESHOLD: usize = 5;

pub struct StrictQaVerifier;

impl StrictQaVerifier {
    pub fn verify(
        &self,
        current_issues: &[ReviewIssue],
        issue_history: &[BTreeSet<String>],
        iteration: usize,
    ) -> QaResult {
        let mut blocking_reasons = Vec::new();
        let mut warnings = Vec::new();

        // Any remaining ERROR or CRITICAL blocks outright.
        for issue in current_issues {
            if issue.severity.is_blocking() {
                blocking_reasons.push(QaBlockingReason {
                    category: "error",
                    message: format!("ERROR-level issue remains: {}", issue.message),
                });
            }
        }

        // A growing blocking-issue count means fixes are making things worse.
        let blocking_history = filter_blocking_history(issue_history);
        if blocking_history.len() >= 2 {
            let prev = blocking_history[blocking_history.len() - 2].len();
            let curr = blocking_history[blocking_history.len() - 1].len();
            if curr > prev {
                blocking_reasons.push(QaBlockingReason {
                    category: "regression",
                    message: format!(
                        "Issue count increased in last iteration: {prev} -> {curr}"
                    ),
                });
            }
        }

        let (oscillating, explanation) = detect_oscillation(issue_history);
        if oscillating {
            blocking_reasons.push(QaBlockingReason {
                category: "oscillation",
                message: explanation.unwrap_or_default(),
            });
        }

        // Timestamp problems get their own category so reports can call
        // them out separately from generic errors.
        for issue in current_issues {
            if !issue.severity.is_blocking() {
                continue;
            }
            let field = issue.field_name();
            let mentions_timestamp = issue.message.to_lowercase().contains("timestamp")
                || field.contains("created")
                || field.contains("updated");
            if mentions_timestamp {
                blocking_reasons.push(QaBlockingReason {
                    category: "timestamp",
                    message: format!("Invalid timestamp: {}", issue.message),
                });
            }
        }

        let warning_count = current_issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
            .count();
        if warning_count > 0 {
            warnings.push(format!(
                "{warning_count} WARNING-level issue(s) remain (non-blocking)"
            ));
        }
        if iteration > HIGH_ITERATION_THRESHOLD {
            warnings.push(format!(
                "Required {iteration} iterations to complete (may indicate complex issues)"
            ));
        }

        let should_pass = blocking_reasons.is_empty();
        let summary = if should_pass {
            if warnings.is_empty() {
                "QA PASS. Note is ready for completion with no issues.".to_string()
            } else {
                format!(
                    "QA PASS with {} warning(s). Note is acceptable for completion.",
                    warnings.len()
                )
            }
        } else {
            format!(
                "QA FAIL. {} blocking issue(s) prevent completion.",
                blocking_reasons.len()
            )
        };

        QaResult {
            should_pass,
            blocking_reasons,
            warnings,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(signatures: &[&str]) -> BTreeSet<String> {
        signatures.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_issues_passes() {
        let result = StrictQaVerifier.verify(&[], &[], 1);
        assert!(result.should_pass);
        assert!(result.blocking_reasons.is_empty());
        assert!(result.summary.contains("QA PASS"));
    }

    #[test]
    fn test_warnings_and_info_never_block() {
        let issues = vec![
            ReviewIssue::new(Severity::Warning, "style nit"),
            ReviewIssue::new(Severity::Info, "could be nicer"),
        ];
        let result = StrictQaVerifier.verify(&issues, &[], 2);
        assert!(result.should_pass);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("1 WARNING-level issue(s)"));
    }

    #[test]
    fn test_error_blocks_with_reason() {
        let issues = vec![ReviewIssue::new(Severity::Error, "broken wikilink")];
        let result = StrictQaVerifier.verify(&issues, &[], 1);
        assert!(!result.should_pass);
        assert_eq!(result.blocking_reasons[0].category, "error");
        assert!(result.blocking_reasons[0].message.contains("broken wikilink"));
    }

    #[test]
    fn test_timestamp_issue_gets_own_category() {
        let issues =
            vec![ReviewIssue::new(Severity::Error, "created is in the future").with_field("created")];
        let result = StrictQaVerifier.verify(&issues, &[], 1);
        assert!(!result.should_pass);
        assert!(result
            .blocking_reasons
            .iter()
            .any(|r| r.category == "timestamp"));
    }

    #[test]
    fn test_repeated_warning_signatures_never_fail() {
        let issues = vec![ReviewIssue::new(Severity::Warning, "style nit")];
        let history = vec![
            set(&["WARNING: style nit"]),
            set(&["WARNING: style nit"]),
            set(&["WARNING: style nit"]),
            set(&["WARNING: style nit"]),
        ];
        let result = StrictQaVerifier.verify(&issues, &history, 4);
        assert!(result.should_pass);
    }

    #[test]
    fn test_warning_count_growth_is_not_regression() {
        let history = vec![
            set(&["WARNING: one"]),
            set(&["WARNING: one", "WARNING: two", "WARNING: three"]),
        ];
        let result = StrictQaVerifier.verify(&[], &history, 2);
        assert!(result.should_pass);
    }

    #[test]
    fn test_blocking_regression_fails() {
        let history = vec![set(&["ERROR: one"]), set(&["ERROR: one", "ERROR: two"])];
        let issues = vec![];
        let result = StrictQaVerifier.verify(&issues, &history, 2);
        assert!(!result.should_pass);
        assert!(result
            .blocking_reasons
            .iter()
            .any(|r| r.category == "regression"));
    }

    #[test]
    fn test_oscillation_fails_with_issue_text() {
        let history = vec![
            set(&["ERROR: misplaced file"]),
            set(&[]),
            set(&["ERROR: misplaced file"]),
        ];
        let result = StrictQaVerifier.verify(&[], &history, 3);
        assert!(!result.should_pass);
        let reason = result
            .blocking_reasons
            .iter()
            .find(|r| r.category == "oscillation")
            .unwrap();
        assert!(reason.message.contains("ERROR: misplaced file"));
    }

    #[test]
    fn test_high_iteration_count_warns_only() {
        let result = StrictQaVerifier.verify(&[], &[], 7);
        assert!(result.should_pass);
        assert!(result.warnings.iter().any(|w| w.contains("7 iterations")));
    }
}
