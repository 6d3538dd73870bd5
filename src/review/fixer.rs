//! Rule-based fixes applied before any LLM involvement.
//!
//! Handles the unambiguous issue signatures that never need reasoning:
//! timestamp repair, bare type names, and heading-variant normalization.

use super::state::FixResult;
use crate::frontmatter;
use crate::issue::ReviewIssue;
use crate::validators::code_format::{code_segments, is_heading_line, masked_spans, type_variants};
use chrono::{Local, NaiveDate};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;
use tracing::debug;

fn future_timestamp_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)in the future").expect("static regex"))
}

fn timestamp_order_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)'created'.*after.*'updated'|temporal logic").expect("static regex")
    })
}

fn missing_timestamp_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Missing.*(?:created|updated)").expect("static regex"))
}

fn type_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Type name '([^']+)' found without backticks").expect("static regex")
    })
}

/// Canonical text for each optional-version heading, with the synonyms it
/// absorbs (matched case-insensitively at level 2 or 3).
const HEADING_VARIANTS: &[(&str, &[&str])] = &[
    (
        "## Краткая Версия",
        &["краткая версия", "краткий вариант", "краткий ответ"],
    ),
    (
        "## Подробная Версия",
        &["подробная версия", "подробный вариант", "подробный ответ"],
    ),
    ("## Short Version", &["short version", "short answer"]),
    (
        "## Detailed Version",
        &["detailed version", "detailed answer", "long version"],
    ),
];

pub struct DeterministicFixer {
    today: NaiveDate,
}

impl Default for DeterministicFixer {
    fn default() -> Self {
        DeterministicFixer::new()
    }
}

impl DeterministicFixer {
    pub fn new() -> Self {
        DeterministicFixer {
            today: Local::now().date_naive(),
        }
    }

    #[cfg(test)]
    fn with_today(today: NaiveDate) -> Self {
        DeterministicFixer { today }
    }

    pub fn can_fix(&self, issues: &[ReviewIssue]) -> bool {
        issues.iter().any(|issue| matches_any_rule(&issue.message))
    }

    pub fn get_fixable_issue_count(&self, issues: &[ReviewIssue]) -> usize {
        issues
            .iter()
            .filter(|issue| matches_any_rule(&issue.message))
            .count()
    }

    pub fn get_summary(&self, issues: &[ReviewIssue]) -> String {
        let fixable = self.get_fixable_issue_count(issues);
        let total = issues.len();
        if fixable == 0 {
            format!("No issues can be fixed deterministically (0/{total})")
        } else if fixable == total {
            format!("All {total} issue(s) can be fixed deterministically")
        } else {
            format!("{fixable}/{total} issue(s) can be fixed deterministically")
        }
    }

    pub fn fix(&self, note_text: &str, issues: &[ReviewIssue]) -> FixResult {
        let (mapping, body) = frontmatter::parse(note_text);
        let Some(mut mapping) = mapping else {
            debug!("no frontmatter, skipping deterministic fixes");
            return FixResult::unchanged(note_text);
        };
        let mut body = body.to_string();
        let mut result = FixResult::unchanged(note_text);

        self.fix_timestamp_order(&mut mapping, issues, &mut result);
        self.fix_missing_timestamps(&mut mapping, issues, &mut result);
        self.fix_future_timestamps(&mut mapping, issues, &mut result);
        normalize_heading_variants(&mut body, &mut result);
        wrap_reported_type_names(&mut body, issues, &mut result);

        if result.changes_made {
            result.revised_text = frontmatter::dump(&mapping, &body);
            debug!(
                fixes = result.fixes_applied.len(),
                issues = result.issues_fixed.len(),
                "deterministic fixer applied changes"
            );
        }
        result
    }

    fn fix_timestamp_order(
        &self,
        mapping: &mut Mapping,
        issues: &[ReviewIssue],
        result: &mut FixResult,
    ) {
        for issue in issues {
            if !timestamp_order_pattern().is_match(&issue.message) {
                continue;
            }
            let created = date_field(mapping, "created");
            let updated = date_field(mapping, "updated");
            if let (Some(created), Some(updated)) = (created, updated) {
                if created > updated {
                    let today = self.today.format("%Y-%m-%d").to_string();
                    frontmatter::set_str(mapping, "updated", &today);
                    result
                        .fixes_applied
                        .push(format!("Fixed timestamp ordering: set updated to {today}"));
                    result.issues_fixed.push(issue.signature());
                    result.changes_made = true;
                }
            }
        }
    }

    fn fix_missing_timestamps(
        &self,
        mapping: &mut Mapping,
        issues: &[ReviewIssue],
        result: &mut FixResult,
    ) {
        for issue in issues {
            if !missing_timestamp_pattern().is_match(&issue.message) {
                continue;
            }
            let today = self.today.format("%Y-%m-%d").to_string();
            let mut added = Vec::new();
            for field in ["created", "updated"] {
                if !frontmatter::has_key(mapping, field) {
                    frontmatter::set_str(mapping, field, &today);
                    added.push(field);
                }
            }
            if !added.is_empty() {
                result
                    .fixes_applied
                    .push(format!("Added missing timestamps: {}", added.join(", ")));
                result.issues_fixed.push(issue.signature());
                result.changes_made = true;
            }
        }
    }

    fn fix_future_timestamps(
        &self,
        mapping: &mut Mapping,
        issues: &[ReviewIssue],
        result: &mut FixResult,
    ) {
        let matching: Vec<&ReviewIssue> = issues
            .iter()
            .filter(|issue| future_timestamp_pattern().is_match(&issue.message))
            .collect();
        if matching.is_empty() {
            return;
        }

        let today = self.today.format("%Y-%m-%d").to_string();
        let mut updates = Vec::new();
        for field in ["created", "updated"] {
            // Clamp only the fields the issues actually name.
            let named = matching.iter().any(|issue| {
                issue.field_name().contains(field) || issue.message.contains(field)
            });
            if !named {
                continue;
            }
            if let Some(value) = date_field(mapping, field) {
                if value > self.today {
                    frontmatter::set_str(mapping, field, &today);
                    updates.push(format!("{field}={value}->{today}"));
                }
            }
        }

        // Clamping can invert the ordering; keep created <= updated.
        if let (Some(created), Some(updated)) =
            (date_field(mapping, "created"), date_field(mapping, "updated"))
        {
            if created > updated {
                let aligned = updated.format("%Y-%m-%d").to_string();
                frontmatter::set_str(mapping, "created", &aligned);
                updates.push(format!("created aligned to {aligned} for ordering"));
            }
        }

        if !updates.is_empty() {
            result
                .fixes_applied
                .push(format!("Corrected future timestamps: {}", updates.join(", ")));
            for issue in matching {
                result.issues_fixed.push(issue.signature());
            }
            result.changes_made = true;
        }
    }
}

fn matches_any_rule(message: &str) -> bool {
    future_timestamp_pattern().is_match(message)
        || timestamp_order_pattern().is_match(message)
        || missing_timestamp_pattern().is_match(message)
        || type_name_pattern().is_match(message)
}

fn date_field(mapping: &Mapping, key: &str) -> Option<NaiveDate> {
    let raw = mapping.get(Value::String(key.to_string()))?;
    let text = match raw {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other).ok()?.trim().to_string(),
    };
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").ok()
}

fn normalize_heading_variants(body: &mut String, result: &mut FixResult) {
    let mut normalized = false;
    for (canonical, synonyms) in HEADING_VARIANTS {
        let canonical_text = canonical.trim_start_matches(['#', ' ']);
        let mut variants: Vec<String> = synonyms.iter().map(|s| regex::escape(s)).collect();
        variants.push(regex::escape(canonical_text));
        variants.sort_by_key(|v| std::cmp::Reverse(v.len()));

        let pattern = Regex::new(&format!(
            r"(?mi)^(?:##|###)[ \t]+(?:{})[ \t]*$",
            variants.join("|")
        ))
        .expect("heading variant regex");

        let mut changed = false;
        let replaced = pattern.replace_all(body, |caps: &regex::Captures<'_>| {
            let original = &caps[0];
            if original == *canonical {
                original.to_string()
            } else {
                changed = true;
                canonical.to_string()
            }
        });
        if changed {
            *body = replaced.into_owned();
            normalized = true;
        }
    }

    if normalized {
        result
            .fixes_applied
            .push("Normalized optional version headings to canonical format".to_string());
        result.changes_made = true;
    }
}

fn wrap_reported_type_names(body: &mut String, issues: &[ReviewIssue], result: &mut FixResult) {
    let mut processed: Vec<String> = Vec::new();
    for issue in issues {
        let Some(captures) = type_name_pattern().captures(&issue.message) else {
            continue;
        };
        let type_name = captures[1].to_string();
        if processed.contains(&type_name) {
            continue;
        }
        let (updated, wrapped) = wrap_type_name(body, &type_name);
        if wrapped {
            *body = updated;
            result
                .fixes_applied
                .push(format!("Wrapped type name `{type_name}` in backticks"));
            result.issues_fixed.push(issue.signature());
            result.changes_made = true;
        } else {
            debug!(type_name, "no occurrences found for deterministic wrapping");
        }
        processed.push(type_name);
    }
}

/// Wrap bare prose occurrences of `type_name` (and plural variants) in
/// backticks. Headings, URLs, code spans, and fenced blocks are left alone.
fn wrap_type_name(body: &str, type_name: &str) -> (String, bool) {
    let variants = type_variants(type_name);
    let alternation: Vec<String> = variants.iter().map(|v| regex::escape(v)).collect();
    let Ok(pattern) = Regex::new(&format!(r"\b(?:{})\b", alternation.join("|"))) else {
        return (body.to_string(), false);
    };

    let mut out = String::with_capacity(body.len() + 16);
    let mut wrapped = false;

    for (range, is_code) in code_segments(body) {
        let segment = &body[range];
        if is_code {
            out.push_str(segment);
            continue;
        }
        let lines: Vec<&str> = segment.split_inclusive('\n').collect();
        for (idx, line) in lines.iter().enumerate() {
            let next = lines.get(idx + 1).copied();
            if is_heading_line(line, next) {
                out.push_str(line);
                continue;
            }
            let spans = masked_spans(line);
            let mut cursor = 0;
            for found in pattern.find_iter(line) {
                let overlaps = spans
                    .iter()
                    .any(|s| found.start() < s.end && s.start < found.end());
                let before = line[..found.start()].chars().next_back();
                let after = line[found.end()..].chars().next();
                if overlaps || before == Some('`') || after == Some('`') {
                    continue;
                }
                out.push_str(&line[cursor..found.start()]);
                out.push('`');
                out.push_str(found.as_str());
                out.push('`');
                cursor = found.end();
                wrapped = true;
            }
            out.push_str(&line[cursor..]);
        }
    }

    (out, wrapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;

    fn fixer() -> DeterministicFixer {
        DeterministicFixer::with_today(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
    }

    fn issue(message: &str) -> ReviewIssue {
        ReviewIssue::new(Severity::Error, message)
    }

    #[test]
    fn test_future_created_clamped() {
        let text = "---\ncreated: 2999-01-01\nupdated: 2024-05-01\n---\nbody\n";
        let issues = vec![issue("'created' timestamp is in the future").with_field("created")];
        let result = fixer().fix(text, &issues);
        assert!(result.changes_made);
        assert!(result.revised_text.contains("created: 2024-05-01"));
        assert!(result.revised_text.contains("updated: 2024-05-01"));
        assert!(result.fixes_applied[0].contains("Corrected future timestamps"));
        assert_eq!(result.issues_fixed.len(), 1);
    }

    #[test]
    fn test_future_fix_only_touches_named_field() {
        let text = "---\ncreated: 2024-01-01\nupdated: 2999-01-01\n---\nbody\n";
        let issues = vec![issue("'updated' timestamp is in the future").with_field("updated")];
        let result = fixer().fix(text, &issues);
        assert!(result.revised_text.contains("created: 2024-01-01"));
        assert!(result.revised_text.contains("updated: 2025-06-01"));
    }

    #[test]
    fn test_type_name_wrapped_but_heading_untouched() {
        let text = "---\nid: kotlin-001\n---\n## Short Version\n\nIn Kotlin, Short is a 16-bit signed integer.\n";
        let issues = vec![issue("Type name 'Short' found without backticks")];
        let result = fixer().fix(text, &issues);
        assert!(result.changes_made);
        assert!(result.revised_text.contains("`Short` is a 16-bit"));
        assert!(result.revised_text.contains("## Short Version\n"));
    }

    #[test]
    fn test_plural_variant_wrapped() {
        let text = "---\nid: kotlin-001\n---\nPrefer Strings over chars here.\n";
        let issues = vec![issue("Type name 'String' found without backticks")];
        let result = fixer().fix(text, &issues);
        assert!(result.revised_text.contains("Prefer `Strings` over"));
    }

    #[test]
    fn test_code_span_and_url_left_alone() {
        let text = "---\nid: kotlin-001\n---\nSee `String` docs at https://example.com/String plus a bare String.\n";
        let issues = vec![issue("Type name 'String' found without backticks")];
        let result = fixer().fix(text, &issues);
        assert!(result
            .revised_text
            .contains("See `String` docs at https://example.com/String plus a bare `String`."));
    }

    #[test]
    fn test_heading_synonym_normalized() {
        let text = "---\nid: sys-001\n---\n### Краткий ответ\n\ntext\n\n## short version\n\nmore\n";
        let result = fixer().fix(text, &[]);
        assert!(result.changes_made);
        assert!(result.revised_text.contains("## Краткая Версия\n"));
        assert!(result.revised_text.contains("## Short Version\n"));
    }

    #[test]
    fn test_missing_timestamps_added() {
        let text = "---\nid: algo-001\n---\nbody\n";
        let issues = vec![issue("Missing required field 'created' timestamp")];
        let result = fixer().fix(text, &issues);
        assert!(result.revised_text.contains("created: 2025-06-01"));
        assert!(result.revised_text.contains("updated: 2025-06-01"));
    }

    #[test]
    fn test_timestamp_order_repaired() {
        let text = "---\ncreated: 2025-03-01\nupdated: 2024-01-01\n---\nbody\n";
        let issues = vec![issue("'created' is after 'updated' (temporal logic violation)")];
        let result = fixer().fix(text, &issues);
        assert!(result.revised_text.contains("updated: 2025-06-01"));
        assert!(result.revised_text.contains("created: 2025-03-01"));
    }

    #[test]
    fn test_unmatched_issues_leave_text_unchanged() {
        let text = "---\nid: algo-001\n---\nbody\n";
        let issues = vec![issue("something the fixer does not know")];
        let result = fixer().fix(text, &issues);
        assert!(!result.changes_made);
        assert_eq!(result.revised_text, text);
        assert!(result.fixes_applied.is_empty());
        assert!(result.issues_fixed.is_empty());
    }

    #[test]
    fn test_fix_is_idempotent() {
        let text = "---\ncreated: 2999-01-01\nupdated: 2024-05-01\n---\nIn Kotlin, Short is small.\n";
        let issues = vec![
            issue("'created' timestamp is in the future"),
            issue("Type name 'Short' found without backticks"),
        ];
        let first = fixer().fix(text, &issues);
        assert!(first.changes_made);
        let second = fixer().fix(&first.revised_text, &issues);
        assert!(!second.changes_made);
        assert_eq!(second.revised_text, first.revised_text);
    }

    #[test]
    fn test_summary_counts() {
        let issues = vec![
            issue("Type name 'Short' found without backticks"),
            issue("unrelated"),
        ];
        let f = fixer();
        assert!(f.can_fix(&issues));
        assert_eq!(f.get_fixable_issue_count(&issues), 1);
        assert_eq!(f.get_summary(&issues), "1/2 issue(s) can be fixed deterministically");
    }
}
