//! Drives one note through validate → fix → revalidate until the strict QA
//! gate passes or the loop gives up and hands the note to a human.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::frontmatter;
use crate::issue::ReviewIssue;
use crate::llm::{NoteReviewer, ReviewOutcome};
use crate::review::fixer::DeterministicFixer;
use crate::review::history::detect_oscillation;
use crate::review::oscillation::OscillationFixer;
use crate::review::qa::StrictQaVerifier;
use crate::review::state::{ReviewState, DEFAULT_MAX_ITERATIONS};
use crate::taxonomy::Taxonomy;
use crate::validators::{NoteContext, ValidatorRegistry};
use crate::vault::{read_note, write_note_atomic, NoteIndex};

#[derive(Debug, Clone)]
pub struct ReviewOptions {
    pub max_iterations: usize,
    pub dry_run: bool,
    pub backup: bool,
    /// Run a technical-accuracy pass before the first validation.
    pub technical_review: bool,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        ReviewOptions {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            dry_run: false,
            backup: true,
            technical_review: false,
        }
    }
}

pub struct ReviewOrchestrator<'a, R: NoteReviewer> {
    vault_root: &'a Path,
    taxonomy: &'a Taxonomy,
    index: &'a NoteIndex,
    registry: ValidatorRegistry,
    fixer: DeterministicFixer,
    oscillation_fixer: OscillationFixer,
    qa: StrictQaVerifier,
    reviewer: &'a R,
    options: ReviewOptions,
}

impl<'a, R: NoteReviewer> ReviewOrchestrator<'a, R> {
    pub fn new(
        vault_root: &'a Path,
        taxonomy: &'a Taxonomy,
        index: &'a NoteIndex,
        reviewer: &'a R,
        options: ReviewOptions,
    ) -> Self {
        ReviewOrchestrator {
            vault_root,
            taxonomy,
            index,
            registry: ValidatorRegistry::with_builtin(),
            fixer: DeterministicFixer::new(),
            oscillation_fixer: OscillationFixer::new(vault_root),
            qa: StrictQaVerifier,
            reviewer,
            options,
        }
    }

    /// Run the full review loop for one note and persist the result.
    pub async fn review_note(&self, path: &Path) -> Result<ReviewState> {
        let text = read_note(path)?;
        let mut state = ReviewState::new(path, text);
        state.max_iterations = self.options.max_iterations;

        if self.options.technical_review {
            self.run_technical_review(&mut state).await;
        }

        if state.error.is_none() {
            self.run_fix_loop(&mut state).await;
        }

        self.persist(&mut state)?;
        Ok(state)
    }

    async fn run_technical_review(&self, state: &mut ReviewState) {
        match self.reviewer.technical_review(&state.current_text).await {
            Ok(outcome) => {
                if outcome.changes_made {
                    self.accept_revision(state, outcome, "technical_review");
                } else {
                    state.record("technical_review", "No technical issues found");
                }
            }
            Err(err) => {
                warn!(path = %state.note_path.display(), error = %err, "technical review failed");
                state.error = Some(format!("Technical review failed: {err}"));
                state.requires_human_review = true;
            }
        }
    }

    async fn run_fix_loop(&self, state: &mut ReviewState) {
        loop {
            self.validate(state);

            if !state.has_blocking_issues() {
                let qa = self
                    .qa
                    .verify(&state.issues, &state.issue_history, state.iteration);
                state.qa_passed = Some(qa.should_pass);
                state.qa_summary = Some(qa.summary.clone());
                state.record("qa", qa.summary);
                if qa.should_pass {
                    state.completed = true;
                } else {
                    state.requires_human_review = true;
                    state.completed = true;
                }
                return;
            }

            state.iteration += 1;
            if state.iteration > state.max_iterations {
                state.record(
                    "orchestrator",
                    format!("Gave up after {} iterations", state.max_iterations),
                );
                state.requires_human_review = true;
                return;
            }

            // Deterministic fixer first, then the oscillation fixer whenever
            // its predicate matches, with the LLM only as the last resort.
            if self.fixer.can_fix(&state.issues) && self.apply_deterministic_fix(state) {
                continue;
            }
            if self.oscillation_fixer.can_fix(&state.issues) && self.apply_oscillation_fix(state) {
                continue;
            }

            let (oscillating, explanation) = detect_oscillation(&state.issue_history);
            if oscillating {
                // Flapping with no deterministic fix left means the reviewer
                // keeps undoing itself; another call will not converge.
                let explanation = explanation.unwrap_or_default();
                state.record("oscillation", explanation.clone());
                warn!(path = %state.note_path.display(), "oscillation detected, stopping");
                state.error = Some(format!("Oscillation detected: {explanation}"));
                state.requires_human_review = true;
                return;
            }

            match self
                .reviewer
                .fix_issues(&state.current_text, &state.issues)
                .await
            {
                Ok(outcome) => {
                    if !outcome.changes_made {
                        state.record("llm_fix", "Reviewer made no changes");
                        state.requires_human_review = true;
                        return;
                    }
                    if !self.accept_revision(state, outcome, "llm_fix") {
                        return;
                    }
                }
                Err(err) => {
                    warn!(path = %state.note_path.display(), error = %err, "reviewer call failed");
                    state.error = Some(format!("Reviewer call failed: {err}"));
                    state.requires_human_review = true;
                    return;
                }
            }
        }
    }

    fn validate(&self, state: &mut ReviewState) {
        let (mapping, body) = frontmatter::parse(&state.current_text);
        // Location checks must see the pending destination once a move is queued.
        let effective_path: &Path = state.moved_to.as_deref().unwrap_or(&state.note_path);
        let ctx = NoteContext {
            path: effective_path,
            vault_root: self.vault_root,
            frontmatter: mapping.as_ref(),
            body,
            taxonomy: self.taxonomy,
            index: self.index,
        };
        let summary = self.registry.run_all(&ctx);
        debug!(
            path = %state.note_path.display(),
            iteration = state.iteration,
            issues = summary.issues.len(),
            "validated"
        );
        state.issues = summary.issues;
        state.record_issue_snapshot();
    }

    fn apply_deterministic_fix(&self, state: &mut ReviewState) -> bool {
        let result = self.fixer.fix(&state.current_text, &state.issues);
        if !result.changes_made {
            return false;
        }
        state.current_text = result.revised_text;
        state.changed = true;
        state.record(
            "deterministic_fix",
            format!("Applied: {}", result.fixes_applied.join("; ")),
        );
        true
    }

    fn apply_oscillation_fix(&self, state: &mut ReviewState) -> bool {
        let result = self
            .oscillation_fixer
            .fix(&state.current_text, &state.issues, &state.note_path);
        let mut progressed = false;
        if result.file_moved {
            if let Some(target) = result.new_file_path {
                state.moved_to = Some(target);
                progressed = true;
            }
        }
        if result.changes_made {
            state.current_text = result.revised_text;
            state.changed = true;
            progressed = true;
        }
        if progressed {
            state.record(
                "oscillation_fix",
                format!("Applied: {}", result.fixes_applied.join("; ")),
            );
        }
        progressed
    }

    /// Gate an external revision: the revised text must still carry parseable
    /// frontmatter, otherwise the revision is rejected and the note goes to a
    /// human with its pre-revision text intact.
    fn accept_revision(&self, state: &mut ReviewState, outcome: ReviewOutcome, stage: &str) -> bool {
        let (mapping, _) = frontmatter::parse(&outcome.revised_text);
        if mapping.is_none() {
            state.record(stage, "Rejected revision: frontmatter unparseable after edit");
            state.error = Some(
                "Reviewer revision dropped or corrupted the frontmatter; keeping original text"
                    .to_string(),
            );
            state.requires_human_review = true;
            state.completed = true;
            return false;
        }
        state.current_text = outcome.revised_text;
        state.changed = true;
        let detail = if outcome.issues_found.is_empty() {
            outcome.explanation
        } else {
            outcome.issues_found.join("; ")
        };
        state.record(stage, format!("Revised: {detail}"));
        true
    }

    /// Write the final text back (and perform a queued move) unless dry-run
    /// or the revision was rejected.
    fn persist(&self, state: &mut ReviewState) -> Result<()> {
        if self.options.dry_run || !state.changed || state.error.is_some() {
            return Ok(());
        }
        match state.moved_to.clone() {
            Some(target) => {
                write_note_atomic(&target, &state.current_text, self.options.backup)?;
                if target != state.note_path && state.note_path.exists() {
                    std::fs::remove_file(&state.note_path)?;
                }
                state.record(
                    "persist",
                    format!("Wrote note to {}", relative_display(self.vault_root, &target)),
                );
            }
            None => {
                write_note_atomic(&state.note_path, &state.current_text, self.options.backup)?;
                state.record("persist", "Wrote revised note in place");
            }
        }
        Ok(())
    }
}

fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
