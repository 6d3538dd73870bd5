//! Issue-signature history and oscillation detection.
//!
//! The orchestrator snapshots every iteration's issue signatures. Oscillation
//! comparisons only consider blocking severities: a WARNING that comes and
//! goes is a style nuisance, not a reason to stop iterating.

use crate::issue::signature_is_blocking;
use std::collections::BTreeSet;

/// Iterations required before a flap is distinguishable from a one-shot fix.
pub const OSCILLATION_MIN_HISTORY: usize = 3;

/// Copy of the history with WARNING/INFO signatures removed from each set.
pub fn filter_blocking_history(history: &[BTreeSet<String>]) -> Vec<BTreeSet<String>> {
    history
        .iter()
        .map(|iteration| {
            iteration
                .iter()
                .filter(|signature| signature_is_blocking(signature))
                .cloned()
                .collect()
        })
        .collect()
}

/// Look for the present → absent → present flap over the blocking history.
///
/// Returns whether oscillation was found and, when it was, an explanation
/// naming the flapping signatures.
pub fn detect_oscillation(history: &[BTreeSet<String>]) -> (bool, Option<String>) {
    let blocking = filter_blocking_history(history);
    if blocking.len() < OSCILLATION_MIN_HISTORY {
        return (false, None);
    }

    let mut oscillating: BTreeSet<String> = BTreeSet::new();
    for window in blocking.windows(3) {
        let disappeared: BTreeSet<&String> = window[0].difference(&window[1]).collect();
        for signature in disappeared {
            if window[2].contains(signature) {
                oscillating.insert(signature.clone());
            }
        }
    }

    if oscillating.is_empty() {
        (false, None)
    } else {
        let listed: Vec<&str> = oscillating.iter().map(String::as_str).collect();
        let explanation = format!(
            "{} issue(s) oscillating across iterations: {}",
            oscillating.len(),
            listed.join("; ")
        );
        (true, Some(explanation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(signatures: &[&str]) -> BTreeSet<String> {
        signatures.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flap_detected_after_three_iterations() {
        let history = vec![
            set(&["ERROR: broken link"]),
            set(&[]),
            set(&["ERROR: broken link"]),
        ];
        let (oscillating, explanation) = detect_oscillation(&history);
        assert!(oscillating);
        assert!(explanation.unwrap().contains("ERROR: broken link"));
    }

    #[test]
    fn test_two_iterations_never_oscillate() {
        let history = vec![set(&["ERROR: broken link"]), set(&[])];
        assert_eq!(detect_oscillation(&history), (false, None));
    }

    #[test]
    fn test_persistent_issue_is_not_oscillation() {
        let history = vec![
            set(&["ERROR: broken link"]),
            set(&["ERROR: broken link"]),
            set(&["ERROR: broken link"]),
            set(&["ERROR: broken link"]),
        ];
        assert_eq!(detect_oscillation(&history), (false, None));
    }

    #[test]
    fn test_warning_flap_ignored() {
        let history = vec![
            set(&["WARNING: style nit"]),
            set(&[]),
            set(&["WARNING: style nit"]),
            set(&[]),
            set(&["WARNING: style nit"]),
        ];
        assert_eq!(detect_oscillation(&history), (false, None));
    }

    #[test]
    fn test_namespaced_severity_collapsed_in_filter() {
        let history = vec![
            set(&["Severity.WARNING: style nit", "Severity.ERROR: broken"]),
            set(&["Severity.WARNING: style nit"]),
            set(&["Severity.WARNING: style nit", "Severity.ERROR: broken"]),
        ];
        let (oscillating, explanation) = detect_oscillation(&history);
        assert!(oscillating);
        let text = explanation.unwrap();
        assert!(text.contains("Severity.ERROR: broken"));
        assert!(!text.contains("style nit"));
    }

    #[test]
    fn test_unknown_severity_treated_as_blocking() {
        let history = vec![
            set(&["FATAL: mystery"]),
            set(&[]),
            set(&["FATAL: mystery"]),
        ];
        let (oscillating, _) = detect_oscillation(&history);
        assert!(oscillating);
    }
}
