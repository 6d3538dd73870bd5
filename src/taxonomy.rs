//! Controlled vocabularies for the vault.
//!
//! Topics and Android subtopics live in `TAXONOMY.md` / `ANDROID-SUBTOPICS.md`
//! under the vault's administration folder, inside fenced YAML blocks. The
//! loader parses those once per run; the result is an immutable snapshot
//! passed explicitly into validators and the review loop.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONCEPTS_FOLDER: &str = "10-Concepts";
pub const MOCS_FOLDER: &str = "90-MOCs";

pub const QUESTION_PREFIX: &str = "q-";
pub const CONCEPT_PREFIX: &str = "c-";
pub const MOC_PREFIX: &str = "moc-";

/// Mapping from a note's `topic` to the folder it belongs in.
pub const TOPIC_TO_FOLDER: &[(&str, &str)] = &[
    ("algorithms", "20-Algorithms"),
    ("system-design", "30-System-Design"),
    ("android", "40-Android"),
    ("backend", "50-Backend"),
    ("cs", "60-CompSci"),
    ("kotlin", "70-Kotlin"),
    ("tools", "80-Tools"),
    ("behavioral", "00-Behavioural"),
];

/// Mapping from a note's `topic` to the MOC note it should reference.
pub const TOPIC_TO_MOC: &[(&str, &str)] = &[
    ("algorithms", "moc-algorithms"),
    ("data-structures", "moc-algorithms"),
    ("system-design", "moc-system-design"),
    ("distributed-systems", "moc-system-design"),
    ("android", "moc-android"),
    ("kotlin", "moc-kotlin"),
    ("programming-languages", "moc-kotlin"),
    ("databases", "moc-backend"),
    ("networking", "moc-backend"),
    ("os", "moc-cs"),
    ("operating-systems", "moc-cs"),
    ("concurrency", "moc-cs"),
    ("cs", "moc-cs"),
    ("tools", "moc-tools"),
    ("debugging", "moc-tools"),
];

pub fn folder_for_topic(topic: &str) -> Option<&'static str> {
    TOPIC_TO_FOLDER
        .iter()
        .find(|(t, _)| *t == topic)
        .map(|(_, folder)| *folder)
}

pub fn moc_for_topic(topic: &str) -> Option<&'static str> {
    TOPIC_TO_MOC
        .iter()
        .find(|(t, _)| *t == topic)
        .map(|(_, moc)| *moc)
}

/// Immutable vocabulary snapshot loaded from the vault's rule documents.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    pub topics: BTreeSet<String>,
    pub android_subtopics: BTreeSet<String>,
}

impl Taxonomy {
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.contains(topic)
    }

    pub fn has_android_subtopic(&self, subtopic: &str) -> bool {
        self.android_subtopics.is_empty() || self.android_subtopics.contains(subtopic)
    }
}

/// Parses `TAXONOMY.md` and `ANDROID-SUBTOPICS.md` into a [`Taxonomy`].
pub struct TaxonomyLoader {
    taxonomy_path: PathBuf,
    android_subtopics_path: PathBuf,
}

impl TaxonomyLoader {
    pub fn new(vault_root: &Path) -> Self {
        let rules = vault_root.join("00-Administration").join("Vault-Rules");
        TaxonomyLoader {
            taxonomy_path: rules.join("TAXONOMY.md"),
            android_subtopics_path: rules.join("ANDROID-SUBTOPICS.md"),
        }
    }

    /// Load both documents. Missing files produce an empty vocabulary, which
    /// validators treat as "accept anything" rather than an error.
    pub fn load(&self) -> Result<Taxonomy> {
        let mut taxonomy = Taxonomy::default();

        if self.taxonomy_path.exists() {
            let text = fs::read_to_string(&self.taxonomy_path)
                .with_context(|| format!("reading {}", self.taxonomy_path.display()))?;
            taxonomy.topics = parse_topics(&text);
        }

        if self.android_subtopics_path.exists() {
            let text = fs::read_to_string(&self.android_subtopics_path)
                .with_context(|| format!("reading {}", self.android_subtopics_path.display()))?;
            taxonomy.android_subtopics = parse_android_subtopics(&text);
        }

        Ok(taxonomy)
    }
}

fn parse_topics(text: &str) -> BTreeSet<String> {
    let pattern = Regex::new(r"(?s)### Valid Topics.*?```yaml(.*?)```").expect("static regex");
    let Some(captures) = pattern.captures(text) else {
        return BTreeSet::new();
    };
    parse_block_tokens(&captures[1])
}

fn parse_android_subtopics(text: &str) -> BTreeSet<String> {
    let pattern = Regex::new(r"(?s)```yaml(.*?)```").expect("static regex");
    let mut values = BTreeSet::new();
    for captures in pattern.captures_iter(text) {
        for token in parse_block_tokens(&captures[1]) {
            // Skip key/value lines; the subtopic lists are bare tokens.
            if !token.contains(':') {
                values.insert(token);
            }
        }
    }
    values
}

fn parse_block_tokens(block: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let token = line.split('#').next().unwrap_or("").trim();
        let token = token.trim_start_matches("- ").trim();
        if !token.is_empty() {
            tokens.insert(token.to_string());
        }
    }
    tokens
}
