//! Last-resort fixes for the two issue shapes known to flap: wrong-folder
//! placement and heading order. Runs only after oscillation is detected.

use super::state::FixResult;
use crate::frontmatter;
use crate::issue::ReviewIssue;
use crate::validators::structure::{OPTIONAL_HEADINGS, QUESTION_HEADINGS};
use regex::Regex;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

fn file_location_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)File should be located in folder '([^']+)' for topic '([^']+)'")
            .expect("static regex")
    })
}

fn heading_order_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Headings appear out of expected order").expect("static regex"))
}

pub struct OscillationFixer {
    vault_root: PathBuf,
}

impl OscillationFixer {
    pub fn new(vault_root: impl Into<PathBuf>) -> Self {
        OscillationFixer {
            vault_root: vault_root.into(),
        }
    }

    /// True when at least one issue matches a pattern this fixer handles.
    pub fn can_fix(&self, issues: &[ReviewIssue]) -> bool {
        issues.iter().any(|issue| matches_any(&issue.message))
    }

    pub fn get_fixable_issue_count(&self, issues: &[ReviewIssue]) -> usize {
        issues
            .iter()
            .filter(|issue| matches_any(&issue.message))
            .count()
    }

    pub fn get_summary(&self, issues: &[ReviewIssue]) -> String {
        let fixable = self.get_fixable_issue_count(issues);
        let total = issues.len();
        if fixable == 0 {
            format!("No oscillation issues detected (0/{total})")
        } else if fixable == total {
            format!("All {total} issue(s) are oscillation-prone and can be fixed")
        } else {
            format!("{fixable}/{total} oscillation-prone issue(s) can be fixed")
        }
    }

    pub fn fix(&self, note_text: &str, issues: &[ReviewIssue], note_path: &Path) -> FixResult {
        let (mapping, body) = frontmatter::parse(note_text);
        let Some(mapping) = mapping else {
            debug!("no frontmatter, skipping oscillation fixes");
            return FixResult::unchanged(note_text);
        };
        let mut body = body.to_string();
        let mut result = FixResult::unchanged(note_text);

        for issue in issues {
            if let Some(captures) = file_location_pattern().captures(&issue.message) {
                let expected_folder = &captures[1];
                let topic = &captures[2];
                info!(expected_folder, topic, "note placement issue flagged for move");
                // The caller performs the actual move; report the target.
                let filename = note_path
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_default();
                result.new_file_path = Some(self.vault_root.join(expected_folder).join(filename));
                result.file_moved = true;
                result.fixes_applied.push(format!(
                    "Identified file should be moved to {expected_folder}/ (will be handled by workflow)"
                ));
                result.issues_fixed.push(issue.signature());
                result.changes_made = true;
            }
        }

        for issue in issues {
            if heading_order_pattern().is_match(&issue.message) {
                if let Some(reordered) = reorder_headings(&body) {
                    if reordered != body {
                        body = reordered;
                        result.fixes_applied.push(
                            "Reordered headings to correct sequence (RU Q -> EN Q -> RU A -> EN A)"
                                .to_string(),
                        );
                        result.issues_fixed.push(issue.signature());
                        result.changes_made = true;
                        info!("fixed heading order deterministically");
                    }
                } else {
                    debug!("could not reorder headings, sections may be missing");
                }
            }
        }

        if result.changes_made {
            result.revised_text = frontmatter::dump(&mapping, &body);
        }
        result
    }
}

fn matches_any(message: &str) -> bool {
    file_location_pattern().is_match(message) || heading_order_pattern().is_match(message)
}

/// Rebuild the body with the known sections in canonical order, each block
/// carried verbatim. Returns None when a core section is missing.
fn reorder_headings(body: &str) -> Option<String> {
    let expected: Vec<&str> = QUESTION_HEADINGS
        .iter()
        .chain(OPTIONAL_HEADINGS.iter())
        .copied()
        .collect();
    let lines: Vec<&str> = body.split('\n').collect();
    let sections = extract_sections(&lines, &expected);

    for core in QUESTION_HEADINGS {
        if !sections.contains_key(*core) {
            return None;
        }
    }

    let mut reordered: Vec<&str> = Vec::new();
    for heading in &expected {
        if let Some(range) = sections.get(*heading) {
            if reordered.last().is_some_and(|l| !l.trim().is_empty()) {
                reordered.push("");
            }
            reordered.extend(&lines[range.clone()]);
        }
    }

    // Lines outside every captured block keep their original order.
    let mut remaining: Vec<&str> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !sections.values().any(|range| range.contains(&idx)) {
            remaining.push(line);
        }
    }
    let remaining = remaining.join("\n");
    let remaining = remaining.trim();
    if !remaining.is_empty() {
        if reordered.last().is_some_and(|l| !l.trim().is_empty()) {
            reordered.push("");
        }
        reordered.push(remaining);
    }

    Some(format!("{}\n", reordered.join("\n").trim()))
}

/// Map each expected heading to the line-index range of its block: the
/// heading line through the line before the next same-or-higher-level
/// heading.
fn extract_sections<'a>(lines: &[&str], expected: &[&'a str]) -> BTreeMap<&'a str, Range<usize>> {
    let mut sections: BTreeMap<&'a str, Range<usize>> = BTreeMap::new();
    let mut current: Option<(&'a str, usize)> = None;

    for (idx, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        if let Some(heading) = expected.iter().find(|h| stripped == **h) {
            if let Some((open, start)) = current.take() {
                sections.insert(open, start..idx);
            }
            current = Some((*heading, idx));
            continue;
        }

        if stripped.starts_with('#') {
            if let Some((open, start)) = current {
                let level = stripped.chars().take_while(|c| *c == '#').count();
                let open_level = open.chars().take_while(|c| *c == '#').count();
                if level <= open_level {
                    sections.insert(open, start..idx);
                    current = None;
                }
            }
        }
    }

    if let Some((open, start)) = current {
        sections.insert(open, start..lines.len());
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;
    use std::path::Path;

    fn fixer() -> OscillationFixer {
        OscillationFixer::new("/vault")
    }

    fn issue(message: &str) -> ReviewIssue {
        ReviewIssue::new(Severity::Error, message)
    }

    fn scrambled_note() -> String {
        "---\nid: algo-001\ntopic: algorithms\n---\n\n\
         # Вопрос (RU)\n\n> Вопрос?\n\n\
         ## Answer (EN)\n\nThe answer.\n\n\
         # Question (EN)\n\n> Question?\n\n\
         ## Ответ (RU)\n\nОтвет.\n"
            .to_string()
    }

    #[test]
    fn test_can_fix_recognizes_both_patterns() {
        let f = fixer();
        assert!(f.can_fix(&[issue(
            "File should be located in folder '20-Algorithms' for topic 'algorithms'"
        )]));
        assert!(f.can_fix(&[issue("Headings appear out of expected order")]));
        assert!(!f.can_fix(&[issue("something else entirely")]));
        assert_eq!(
            f.get_fixable_issue_count(&[
                issue("Headings appear out of expected order"),
                issue("unrelated"),
            ]),
            1
        );
    }

    #[test]
    fn test_file_location_reports_target_without_moving() {
        let f = fixer();
        let text = "---\ntopic: algorithms\n---\nbody\n";
        let issues = vec![issue(
            "File should be located in folder '20-Algorithms' for topic 'algorithms'",
        )];
        let result = f.fix(
            text,
            &issues,
            Path::new("/vault/70-Kotlin/q-a--algorithms--easy.md"),
        );
        assert!(result.changes_made);
        assert!(result.file_moved);
        assert_eq!(
            result.new_file_path.as_deref(),
            Some(Path::new("/vault/20-Algorithms/q-a--algorithms--easy.md"))
        );
    }

    #[test]
    fn test_heading_order_restored_with_content_intact() {
        let f = fixer();
        let issues = vec![issue("Headings appear out of expected order")];
        let result = f.fix(
            &scrambled_note(),
            &issues,
            Path::new("/vault/20-Algorithms/q-a--algorithms--easy.md"),
        );
        assert!(result.changes_made);
        let text = result.revised_text;
        let ru_q = text.find("# Вопрос (RU)").unwrap();
        let en_q = text.find("# Question (EN)").unwrap();
        let ru_a = text.find("## Ответ (RU)").unwrap();
        let en_a = text.find("## Answer (EN)").unwrap();
        assert!(ru_q < en_q && en_q < ru_a && ru_a < en_a);
        assert!(text.contains("The answer."));
        assert!(text.contains("Ответ."));
    }

    #[test]
    fn test_reorder_keeps_repeated_lines_outside_sections() {
        let f = fixer();
        // The trailing section repeats a sentence from Answer (EN) verbatim.
        let text = format!("{}\n## Notes\n\nThe answer.\n", scrambled_note());
        let issues = vec![issue("Headings appear out of expected order")];
        let result = f.fix(
            &text,
            &issues,
            Path::new("/vault/20-Algorithms/q-a--algorithms--easy.md"),
        );
        assert!(result.changes_made);
        let revised = result.revised_text;
        assert_eq!(revised.matches("The answer.").count(), 2);
        let notes = revised.find("## Notes").unwrap();
        assert!(revised[notes..].contains("The answer."));
    }

    #[test]
    fn test_missing_core_section_leaves_body_alone() {
        let f = fixer();
        let text = "---\nid: algo-001\n---\n\n# Вопрос (RU)\n\n> Вопрос?\n";
        let issues = vec![issue("Headings appear out of expected order")];
        let result = f.fix(text, &issues, Path::new("/vault/q-a--algorithms--easy.md"));
        assert!(!result.changes_made);
        assert_eq!(result.revised_text, text);
    }

    #[test]
    fn test_unmatched_issues_noop() {
        let f = fixer();
        let text = "---\nid: algo-001\n---\nbody\n";
        let result = f.fix(
            text,
            &[issue("unrelated problem")],
            Path::new("/vault/q-a--algorithms--easy.md"),
        );
        assert!(!result.changes_made);
        assert!(result.fixes_applied.is_empty());
        assert!(result.issues_fixed.is_empty());
    }
}
