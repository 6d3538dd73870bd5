//! Terminal reporting for batch runs.

use std::path::Path;

use crate::issue::Severity;
use crate::review::ReviewState;
use crate::workflow::{DuplicateReport, NoteOutcome};

fn display_path<'a>(vault_root: &Path, path: &'a Path) -> String {
    path.strip_prefix(vault_root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warn",
        Severity::Error => "ERROR",
        Severity::Critical => "CRIT ",
    }
}

/// Print validation results; returns the process exit code.
///
/// Exit is nonzero when any note failed to process or carries a CRITICAL
/// issue.
pub fn print_validation_report(vault_root: &Path, outcomes: &[NoteOutcome]) -> i32 {
    let mut clean = 0usize;
    let mut critical_notes = 0usize;
    let mut errored = 0usize;

    for outcome in outcomes {
        let name = display_path(vault_root, &outcome.path);
        if let Some(err) = &outcome.error {
            errored += 1;
            println!("  ! {name}: {err}");
            continue;
        }
        if outcome.issues.is_empty() {
            clean += 1;
            continue;
        }
        if outcome.has_critical() {
            critical_notes += 1;
        }
        println!("  {name}");
        for issue in &outcome.issues {
            println!("    [{}] {}", severity_tag(issue.severity), issue.message);
        }
    }

    println!();
    println!(
        "  {} note(s) checked: {} clean, {} with issues, {} unreadable",
        outcomes.len(),
        clean,
        outcomes.len() - clean - errored,
        errored
    );
    if critical_notes > 0 {
        println!("  ! {critical_notes} note(s) carry CRITICAL issues");
    }

    if errored > 0 || critical_notes > 0 {
        1
    } else {
        0
    }
}

/// Print fix results; returns the process exit code.
pub fn print_fix_report(vault_root: &Path, outcomes: &[NoteOutcome], dry_run: bool) -> i32 {
    let mut changed = 0usize;
    let mut errored = 0usize;

    for outcome in outcomes {
        let name = display_path(vault_root, &outcome.path);
        if let Some(err) = &outcome.error {
            errored += 1;
            println!("  ! {name}: {err}");
            continue;
        }
        if outcome.changed {
            changed += 1;
            println!("  + {name}");
            for fix in &outcome.fixes_applied {
                println!("      {fix}");
            }
            let remaining = outcome.issues.iter().filter(|i| i.severity.is_blocking()).count();
            if remaining > 0 {
                println!("      {remaining} blocking issue(s) remain");
            }
        }
    }

    println!();
    let verb = if dry_run { "would change" } else { "changed" };
    println!(
        "  {} note(s) processed, {} {}, {} errored",
        outcomes.len(),
        changed,
        verb,
        errored
    );

    if errored > 0 {
        1
    } else {
        0
    }
}

/// Print review results; returns the process exit code.
pub fn print_review_report(
    vault_root: &Path,
    results: &[anyhow::Result<ReviewState>],
) -> i32 {
    let mut completed = 0usize;
    let mut human = 0usize;
    let mut errored = 0usize;

    for result in results {
        match result {
            Ok(state) => {
                let name = display_path(vault_root, &state.note_path);
                if state.completed && !state.requires_human_review {
                    completed += 1;
                    let summary = state.qa_summary.as_deref().unwrap_or("done");
                    println!("  + {name}: {summary}");
                } else {
                    human += 1;
                    let reason = state
                        .error
                        .as_deref()
                        .unwrap_or("needs human review");
                    println!("  ! {name}: {reason}");
                }
                if let Some(target) = &state.moved_to {
                    println!("      moved to {}", display_path(vault_root, target));
                }
            }
            Err(err) => {
                errored += 1;
                println!("  ! {err}");
            }
        }
    }

    println!();
    println!(
        "  {} note(s) reviewed: {} completed, {} for human review, {} errored",
        results.len(),
        completed,
        human,
        errored
    );

    if errored > 0 || human > 0 {
        1
    } else {
        0
    }
}

/// Print duplicate-check results; returns the process exit code.
pub fn print_duplicate_report(report: &DuplicateReport) -> i32 {
    for slug in &report.duplicates {
        println!("  ! duplicate: {slug}");
    }
    for candidate in &report.retained {
        println!("  + new: {} ({})", candidate.slug, candidate.filename());
    }
    for (path, err) in &report.unreadable {
        println!("  ! unreadable: {}: {err}", path.display());
    }

    println!();
    println!(
        "  {} candidate(s): {} new, {} duplicate, {} unreadable",
        report.retained.len() + report.duplicates.len() + report.unreadable.len(),
        report.retained.len(),
        report.duplicates.len(),
        report.unreadable.len()
    );

    if report.unreadable.is_empty() {
        0
    } else {
        1
    }
}
