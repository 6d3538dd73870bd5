//! Batch processing over many notes.
//!
//! Validation and deterministic fixing run on a rayon pool; review batches
//! run on tokio with bounded concurrency since each note spends most of its
//! time waiting on the reviewer.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::frontmatter;
use crate::issue::{ReviewIssue, Severity};
use crate::llm::NoteReviewer;
use crate::review::{DeterministicFixer, ReviewOptions, ReviewOrchestrator, ReviewState};
use crate::taxonomy::Taxonomy;
use crate::validators::{NoteContext, ValidatorRegistry};
use crate::vault::{
    extract_question_en, read_note, write_note_atomic, CandidateNote, DuplicateChecker, NoteIndex,
};

/// Result of validating or fixing one note.
#[derive(Debug)]
pub struct NoteOutcome {
    pub path: PathBuf,
    pub issues: Vec<ReviewIssue>,
    pub passed: Vec<String>,
    pub fixes_applied: Vec<String>,
    pub changed: bool,
    pub error: Option<String>,
}

impl NoteOutcome {
    fn failed(path: &Path, err: impl ToString) -> Self {
        NoteOutcome {
            path: path.to_path_buf(),
            issues: Vec::new(),
            passed: Vec::new(),
            fixes_applied: Vec::new(),
            changed: false,
            error: Some(err.to_string()),
        }
    }

    pub fn has_critical(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == Severity::Critical)
    }

    pub fn has_blocking(&self) -> bool {
        self.issues.iter().any(|i| i.severity.is_blocking())
    }
}

/// Shared read-only context for a batch run.
pub struct BatchContext<'a> {
    pub vault_root: &'a Path,
    pub taxonomy: &'a Taxonomy,
    pub index: &'a NoteIndex,
}

impl<'a> BatchContext<'a> {
    fn validate_text(&self, path: &Path, text: &str, registry: &ValidatorRegistry) -> NoteOutcome {
        let (mapping, body) = frontmatter::parse(text);
        let ctx = NoteContext {
            path,
            vault_root: self.vault_root,
            frontmatter: mapping.as_ref(),
            body,
            taxonomy: self.taxonomy,
            index: self.index,
        };
        let summary = registry.run_all(&ctx);
        NoteOutcome {
            path: path.to_path_buf(),
            issues: summary.issues,
            passed: summary.passed,
            fixes_applied: Vec::new(),
            changed: false,
            error: None,
        }
    }
}

/// Validate every target note in parallel.
pub fn validate_batch(ctx: &BatchContext<'_>, targets: &[PathBuf]) -> Vec<NoteOutcome> {
    info!(notes = targets.len(), "validating batch");
    targets
        .par_iter()
        .map(|path| {
            let registry = ValidatorRegistry::with_builtin();
            match read_note(path) {
                Ok(text) => ctx.validate_text(path, &text, &registry),
                Err(err) => NoteOutcome::failed(path, err),
            }
        })
        .collect()
}

/// Apply deterministic fixes to every target note in parallel.
///
/// Each note is validated first so the fixer sees real issue messages, then
/// revalidated after rewriting to report what remains.
pub fn fix_batch(
    ctx: &BatchContext<'_>,
    targets: &[PathBuf],
    dry_run: bool,
    backup: bool,
) -> Vec<NoteOutcome> {
    info!(notes = targets.len(), dry_run, "fixing batch");
    targets
        .par_iter()
        .map(|path| {
            let registry = ValidatorRegistry::with_builtin();
            let fixer = DeterministicFixer::new();
            let text = match read_note(path) {
                Ok(text) => text,
                Err(err) => return NoteOutcome::failed(path, err),
            };

            let before = ctx.validate_text(path, &text, &registry);
            if !fixer.can_fix(&before.issues) {
                return before;
            }

            let result = fixer.fix(&text, &before.issues);
            if !result.changes_made {
                return before;
            }
            if !dry_run {
                if let Err(err) = write_note_atomic(path, &result.revised_text, backup) {
                    return NoteOutcome::failed(path, err);
                }
            }

            let mut after = ctx.validate_text(path, &result.revised_text, &registry);
            after.fixes_applied = result.fixes_applied;
            after.changed = true;
            after
        })
        .collect()
}

/// Run the full review pipeline over the targets with bounded concurrency.
pub async fn review_batch<R: NoteReviewer>(
    ctx: &BatchContext<'_>,
    targets: &[PathBuf],
    reviewer: &R,
    options: ReviewOptions,
    workers: usize,
) -> Vec<Result<ReviewState>> {
    info!(notes = targets.len(), workers, "reviewing batch");
    let orchestrator = ReviewOrchestrator::new(
        ctx.vault_root,
        ctx.taxonomy,
        ctx.index,
        reviewer,
        options,
    );
    stream::iter(targets)
        .map(|path| orchestrator.review_note(path))
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}

/// Classification of candidate files against the existing vault.
#[derive(Debug)]
pub struct DuplicateReport {
    pub retained: Vec<CandidateNote>,
    pub duplicates: Vec<String>,
    pub unreadable: Vec<(PathBuf, String)>,
}

fn candidate_from_file(path: &Path) -> Result<CandidateNote> {
    let text = read_note(path)?;
    let (mapping, _) = frontmatter::parse(&text);
    let field = |key: &str| {
        mapping
            .as_ref()
            .and_then(|fm| frontmatter::get_str(fm, key))
            .unwrap_or_default()
    };
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    // Filenames follow q-<slug>--<topic>--<difficulty>; fall back to
    // frontmatter when the name does not parse.
    let mut parts = stem.splitn(3, "--");
    let slug = parts
        .next()
        .and_then(|p| p.strip_prefix("q-"))
        .unwrap_or(stem)
        .to_string();
    let topic = {
        let from_name = parts.next().unwrap_or_default();
        if from_name.is_empty() {
            field("topic")
        } else {
            from_name.to_string()
        }
    };
    let difficulty = {
        let from_name = parts.next().unwrap_or_default();
        if from_name.is_empty() {
            field("difficulty")
        } else {
            from_name.to_string()
        }
    };
    Ok(CandidateNote {
        slug,
        topic,
        difficulty,
        question_en: extract_question_en(&text).unwrap_or_default(),
    })
}

/// Check candidate note files for duplicate questions against the vault.
pub fn check_duplicates(ctx: &BatchContext<'_>, candidates: &[PathBuf]) -> DuplicateReport {
    let mut parsed = Vec::new();
    let mut unreadable = Vec::new();
    for path in candidates {
        match candidate_from_file(path) {
            Ok(candidate) => parsed.push(candidate),
            Err(err) => unreadable.push((path.clone(), err.to_string())),
        }
    }

    let checker = DuplicateChecker::new(ctx.index);
    let (retained, duplicates) = checker.filter_new(&parsed);
    DuplicateReport {
        retained,
        duplicates,
        unreadable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn note(id: usize, question: &str) -> String {
        format!(
            "---\nid: q-{id}\ntopic: algorithms\ndifficulty: easy\n---\n\n\
             # Вопрос (RU)\n\n> Вопрос?\n\n# Question (EN)\n\n> {question}\n"
        )
    }

    fn seeded_vault() -> TempDir {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("20-Algorithms");
        fs::create_dir_all(&folder).unwrap();
        fs::write(
            folder.join("q-hash-map--algorithms--easy.md"),
            note(1, "What is a hash map?"),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_validate_batch_reports_unreadable_notes() {
        let dir = seeded_vault();
        let taxonomy = Taxonomy::default();
        let index = NoteIndex::build(dir.path());
        let ctx = BatchContext {
            vault_root: dir.path(),
            taxonomy: &taxonomy,
            index: &index,
        };
        let missing = dir.path().join("20-Algorithms/q-ghost--algorithms--easy.md");
        let existing = dir.path().join("20-Algorithms/q-hash-map--algorithms--easy.md");
        let outcomes = validate_batch(&ctx, &[existing, missing]);

        assert_eq!(outcomes.len(), 2);
        let errored: Vec<_> = outcomes.iter().filter(|o| o.error.is_some()).collect();
        assert_eq!(errored.len(), 1);
    }

    #[test]
    fn test_check_duplicates_excludes_matching_question() {
        let dir = seeded_vault();
        let taxonomy = Taxonomy::default();
        let index = NoteIndex::build(dir.path());
        let ctx = BatchContext {
            vault_root: dir.path(),
            taxonomy: &taxonomy,
            index: &index,
        };

        let candidates_dir = TempDir::new().unwrap();
        let duplicate = candidates_dir.path().join("q-hashmap-again--algorithms--easy.md");
        fs::write(&duplicate, note(2, "What is a HASH MAP?")).unwrap();
        let fresh = candidates_dir.path().join("q-binary-search--algorithms--easy.md");
        fs::write(&fresh, note(3, "How does binary search work?")).unwrap();

        let report = check_duplicates(&ctx, &[duplicate, fresh]);
        assert_eq!(report.duplicates, vec!["hashmap-again".to_string()]);
        assert_eq!(report.retained.len(), 1);
        assert_eq!(report.retained[0].slug, "binary-search");
        assert!(report.unreadable.is_empty());
    }

    #[test]
    fn test_fix_batch_clamps_future_dates_on_disk() {
        let dir = seeded_vault();
        let path = dir.path().join("20-Algorithms/q-dates--algorithms--easy.md");
        let text = "---\nid: q-9\ncreated: 2999-01-01\nupdated: 2999-01-01\n---\n\nbody\n";
        fs::write(&path, text).unwrap();
        let taxonomy = Taxonomy::default();
        let index = NoteIndex::build(dir.path());
        let ctx = BatchContext {
            vault_root: dir.path(),
            taxonomy: &taxonomy,
            index: &index,
        };

        let outcomes = fix_batch(&ctx, &[path.clone()], false, false);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].changed, "{:?}", outcomes[0]);
        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(!rewritten.contains("2999-01-01"));
    }
}
