//! Vault filesystem access: note discovery, the note index, locked reads,
//! and atomic writes.
//!
//! # Error Handling
//!
//! Index construction is best-effort: an unreadable note is skipped with a
//! warning rather than failing the whole batch, because one broken file must
//! not stop processing of the rest.

use crate::frontmatter;
use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Filename index plus normalized question text and frontmatter ids for
/// duplicate checks.
///
/// Loaded once per batch and shared read-only across workers.
#[derive(Debug, Clone, Default)]
pub struct NoteIndex {
    /// Every Markdown filename in the vault (e.g. `q-binary-search--algorithms--easy.md`).
    filenames: BTreeSet<String>,
    /// Normalized EN question text of every `q-*.md` note.
    questions: BTreeSet<String>,
    /// Frontmatter `id` value to the filenames declaring it.
    ids: BTreeMap<String, BTreeSet<String>>,
}

impl NoteIndex {
    pub fn build(vault_root: &Path) -> NoteIndex {
        let mut index = NoteIndex::default();
        for entry in WalkDir::new(vault_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if !name.ends_with(".md") {
                continue;
            }
            index.filenames.insert(name.to_string());

            let text = match fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(err) => {
                    warn!(path = %entry.path().display(), %err, "unreadable note skipped while indexing");
                    continue;
                }
            };
            if name.starts_with("q-") {
                if let Some(question) = extract_question_en(&text) {
                    index.questions.insert(normalize_question(&question));
                }
            }
            let (mapping, _) = frontmatter::parse(&text);
            if let Some(id) = mapping
                .as_ref()
                .and_then(|fm| frontmatter::get_str(fm, "id"))
                .filter(|id| !id.is_empty())
            {
                index.ids.entry(id).or_default().insert(name.to_string());
            }
        }
        debug!(
            notes = index.filenames.len(),
            questions = index.questions.len(),
            ids = index.ids.len(),
            "note index built"
        );
        index
    }

    /// True when `note_id` (with or without `.md`) names an existing note.
    pub fn contains(&self, note_id: &str) -> bool {
        if note_id.ends_with(".md") {
            self.filenames.contains(note_id)
        } else {
            self.filenames.contains(&format!("{note_id}.md"))
        }
    }

    pub fn has_question(&self, question_en: &str) -> bool {
        !question_en.is_empty() && self.questions.contains(&normalize_question(question_en))
    }

    /// Filenames other than `own_filename` that declare the given id.
    pub fn id_conflicts(&self, id: &str, own_filename: &str) -> Vec<&str> {
        self.ids
            .get(id)
            .map(|holders| {
                holders
                    .iter()
                    .map(String::as_str)
                    .filter(|name| *name != own_filename)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }
}

/// Lowercase, strip punctuation, collapse whitespace. Latin and Cyrillic
/// letters survive so bilingual questions compare cleanly.
pub fn normalize_question(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for ch in text.trim().chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_space = false;
        } else if ch.is_whitespace() && !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Pull the blockquoted EN question out of a note body.
pub fn extract_question_en(text: &str) -> Option<String> {
    let pattern = Regex::new(r"# Question \(EN\)\s*\n+\s*>\s*(.+)").expect("static regex");
    pattern
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|q| !q.is_empty())
}

/// A new note proposed for the vault, checked against the index before intake.
#[derive(Debug, Clone)]
pub struct CandidateNote {
    pub slug: String,
    pub topic: String,
    pub difficulty: String,
    pub question_en: String,
}

impl CandidateNote {
    pub fn filename(&self) -> String {
        format!("q-{}--{}--{}.md", self.slug, self.topic, self.difficulty)
    }
}

/// Duplicate detection against existing vault questions and filenames.
pub struct DuplicateChecker<'a> {
    index: &'a NoteIndex,
}

impl<'a> DuplicateChecker<'a> {
    pub fn new(index: &'a NoteIndex) -> Self {
        DuplicateChecker { index }
    }

    pub fn is_duplicate_question(&self, question_en: &str) -> bool {
        self.index.has_question(question_en)
    }

    /// Partition candidates into (retained, duplicate slugs).
    ///
    /// A candidate is a duplicate when its normalized question text matches an
    /// existing note, repeats within the batch, or its filename is taken.
    pub fn filter_new(&self, candidates: &[CandidateNote]) -> (Vec<CandidateNote>, Vec<String>) {
        let mut retained = Vec::new();
        let mut duplicates = Vec::new();
        let mut seen_questions = BTreeSet::new();

        for candidate in candidates {
            let normalized = normalize_question(&candidate.question_en);
            if self.index.questions.contains(&normalized) {
                debug!(slug = %candidate.slug, "skipping duplicate of existing note");
                duplicates.push(candidate.slug.clone());
                continue;
            }
            if seen_questions.contains(&normalized) {
                debug!(slug = %candidate.slug, "skipping duplicate within batch");
                duplicates.push(candidate.slug.clone());
                continue;
            }
            if self.index.filenames.contains(&candidate.filename()) {
                debug!(filename = %candidate.filename(), "skipping candidate with taken filename");
                duplicates.push(candidate.slug.clone());
                continue;
            }
            seen_questions.insert(normalized);
            retained.push(candidate.clone());
        }

        (retained, duplicates)
    }
}

/// Read a note under a shared advisory lock so a concurrent atomic rename is
/// never observed mid-write.
pub fn read_note(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("opening note {}", path.display()))?;
    file.lock_shared()
        .with_context(|| format!("locking note {}", path.display()))?;
    let mut text = String::new();
    let result = file.read_to_string(&mut text);
    let _ = fs2::FileExt::unlock(&file);
    result.with_context(|| format!("reading note {}", path.display()))?;
    Ok(text)
}

/// Write a note atomically: temp file in the same directory, then rename.
///
/// With `backup` set, the previous content is preserved next to the note as
/// `<name>.bak` before the rename.
pub fn write_note_atomic(path: &Path, content: &str, backup: bool) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("note path {} has no parent directory", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    if backup && path.exists() {
        let backup_path = path.with_extension("md.bak");
        fs::copy(path, &backup_path)
            .with_context(|| format!("backing up {}", path.display()))?;
    }

    let tmp_path = path.with_extension("md.tmp");
    let mut tmp = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .with_context(|| format!("creating temp file {}", tmp_path.display()))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("writing temp file {}", tmp_path.display()))?;
    tmp.sync_all().ok();
    drop(tmp);

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(anyhow!("renaming {} into place: {}", path.display(), err));
    }
    Ok(())
}

/// Expand glob patterns (relative to the vault root) into note paths.
///
/// With no patterns, every Markdown note under the root is selected.
pub fn collect_targets(vault_root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut targets = Vec::new();

    if patterns.is_empty() {
        for entry in WalkDir::new(vault_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if entry.path().extension().is_some_and(|ext| ext == "md") {
                targets.push(entry.path().to_path_buf());
            }
        }
    } else {
        for pattern in patterns {
            let absolute = vault_root.join(pattern);
            let pattern_str = absolute
                .to_str()
                .ok_or_else(|| anyhow!("pattern is not valid UTF-8: {}", absolute.display()))?;
            for path in glob::glob(pattern_str)
                .with_context(|| format!("invalid glob pattern '{pattern}'"))?
                .filter_map(|p| p.ok())
            {
                if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                    targets.push(path);
                }
            }
        }
    }

    targets.sort();
    targets.dedup();
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn question_note(question: &str) -> String {
        format!("---\nid: algo-001\n---\n\n# Question (EN)\n\n> {question}\n")
    }

    #[test]
    fn test_normalize_question() {
        assert_eq!(
            normalize_question("What is a Hash Map?"),
            "what is a hash map"
        );
        assert_eq!(
            normalize_question("  What   is a hash-map?! "),
            "what is a hashmap"
        );
        assert_eq!(normalize_question("Что такое хеш-таблица?"), "что такое хештаблица");
    }

    #[test]
    fn test_extract_question_en() {
        let text = question_note("What is a hash map?");
        assert_eq!(
            extract_question_en(&text).as_deref(),
            Some("What is a hash map?")
        );
        assert_eq!(extract_question_en("no question here"), None);
    }

    #[test]
    fn test_duplicate_checker_excludes_matching_question() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("20-Algorithms");
        fs::create_dir_all(&folder).unwrap();
        fs::write(
            folder.join("q-hash-map--algorithms--easy.md"),
            question_note("What is a hash map?"),
        )
        .unwrap();

        let index = NoteIndex::build(dir.path());
        let checker = DuplicateChecker::new(&index);

        let candidates = vec![
            CandidateNote {
                slug: "hash-map-basics".into(),
                topic: "algorithms".into(),
                difficulty: "easy".into(),
                // Same question once case and punctuation are ignored.
                question_en: "what is a HASH MAP".into(),
            },
            CandidateNote {
                slug: "binary-search".into(),
                topic: "algorithms".into(),
                difficulty: "easy".into(),
                question_en: "How does binary search work?".into(),
            },
        ];

        let (retained, duplicates) = checker.filter_new(&candidates);
        assert_eq!(duplicates, vec!["hash-map-basics".to_string()]);
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].slug, "binary-search");
    }

    #[test]
    fn test_duplicate_checker_catches_in_batch_repeat_and_taken_filename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("q-old--algorithms--easy.md"),
            question_note("An old question?"),
        )
        .unwrap();
        let index = NoteIndex::build(dir.path());
        let checker = DuplicateChecker::new(&index);

        let candidates = vec![
            CandidateNote {
                slug: "fresh".into(),
                topic: "algorithms".into(),
                difficulty: "easy".into(),
                question_en: "A new question?".into(),
            },
            CandidateNote {
                slug: "fresh-again".into(),
                topic: "algorithms".into(),
                difficulty: "easy".into(),
                question_en: "A NEW question".into(),
            },
            CandidateNote {
                slug: "old".into(),
                topic: "algorithms".into(),
                difficulty: "easy".into(),
                question_en: "Another distinct question?".into(),
            },
        ];

        let (retained, duplicates) = checker.filter_new(&candidates);
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].slug, "fresh");
        assert_eq!(duplicates, vec!["fresh-again".to_string(), "old".to_string()]);
    }

    #[test]
    fn test_index_reports_id_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("q-one--algorithms--easy.md"),
            "---\nid: algo-001\n---\nbody\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("q-two--algorithms--easy.md"),
            "---\nid: algo-001\n---\nbody\n",
        )
        .unwrap();
        fs::write(dir.path().join("c-distinct.md"), "---\nid: algo-002\n---\nbody\n").unwrap();

        let index = NoteIndex::build(dir.path());
        assert_eq!(
            index.id_conflicts("algo-001", "q-one--algorithms--easy.md"),
            vec!["q-two--algorithms--easy.md"]
        );
        assert!(index.id_conflicts("algo-002", "c-distinct.md").is_empty());
        assert!(index.id_conflicts("algo-404", "q-one--algorithms--easy.md").is_empty());
    }

    #[test]
    fn test_atomic_write_and_locked_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q-sample--algorithms--easy.md");
        write_note_atomic(&path, "first\n", false).unwrap();
        assert_eq!(read_note(&path).unwrap(), "first\n");

        write_note_atomic(&path, "second\n", true).unwrap();
        assert_eq!(read_note(&path).unwrap(), "second\n");
        assert_eq!(
            fs::read_to_string(path.with_extension("md.bak")).unwrap(),
            "first\n"
        );
        assert!(!path.with_extension("md.tmp").exists());
    }

    #[test]
    fn test_collect_targets_with_and_without_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let algos = dir.path().join("20-Algorithms");
        fs::create_dir_all(&algos).unwrap();
        fs::write(algos.join("q-a--algorithms--easy.md"), "x").unwrap();
        fs::write(algos.join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("c-concept.md"), "x").unwrap();

        let all = collect_targets(dir.path(), &[]).unwrap();
        assert_eq!(all.len(), 2);

        let only_questions =
            collect_targets(dir.path(), &["**/q-*.md".to_string()]).unwrap();
        assert_eq!(only_questions.len(), 1);
    }
}
