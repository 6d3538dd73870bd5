//! Inline code formatting checks for type names and generics.
//!
//! The scanning helpers here (fenced-block segmentation, heading detection,
//! inline-span masking) are shared with the deterministic fixer so the two
//! never disagree about what counts as prose.

use super::{NoteContext, ValidationSummary, Validator};
use crate::issue::{ReviewIssue, Severity};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Type names commonly written bare in prose. Overly generic words with a
/// natural-language meaning (Context, Flow, Coroutine) are deliberately
/// excluded to keep stylistic issues from flapping.
pub const COMMON_TYPE_NAMES: &[&str] = &[
    "String",
    "Int",
    "Long",
    "Float",
    "Double",
    "Boolean",
    "Char",
    "Byte",
    "Short",
    "List",
    "ArrayList",
    "LinkedList",
    "Set",
    "HashSet",
    "TreeSet",
    "Map",
    "HashMap",
    "TreeMap",
    "LinkedHashMap",
    "Queue",
    "Deque",
    "Stack",
    "Activity",
    "Fragment",
    "View",
    "ViewGroup",
    "Intent",
    "Bundle",
    "Application",
    "Service",
    "BroadcastReceiver",
    "ContentProvider",
    "ViewModel",
    "LiveData",
    "MutableLiveData",
    "StateFlow",
    "SharedFlow",
    "Parcelable",
    "Serializable",
    "Observable",
    "Disposable",
    "Callback",
    "Listener",
];

fn fenced_block_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[\s\S]*?```").expect("static regex"))
}

fn generic_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][A-Za-z0-9]*<[^<>\n]+>").expect("static regex"))
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s)]+").expect("static regex"))
}

fn setext_underline_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(=+|-+)\s*$").expect("static regex"))
}

/// Byte ranges of `content`, each flagged true when it is a fenced code block.
pub fn code_segments(content: &str) -> Vec<(Range<usize>, bool)> {
    let mut parts = Vec::new();
    let mut last_end = 0;
    for found in fenced_block_pattern().find_iter(content) {
        if found.start() > last_end {
            parts.push((last_end..found.start(), false));
        }
        parts.push((found.range(), true));
        last_end = found.end();
    }
    if last_end < content.len() {
        parts.push((last_end..content.len(), false));
    }
    if parts.is_empty() {
        parts.push((0..content.len(), false));
    }
    parts
}

/// Line text without leading spaces or blockquote markers.
fn strip_heading_prefix(line: &str) -> &str {
    let mut stripped = line.trim_start();
    while let Some(rest) = stripped.strip_prefix('>') {
        stripped = rest.trim_start();
    }
    stripped
}

/// ATX heading, or the title line of a Setext title+underline pair.
pub fn is_heading_line(line: &str, next_line: Option<&str>) -> bool {
    if strip_heading_prefix(line).starts_with('#') {
        return true;
    }
    let current = strip_heading_prefix(line);
    if current.trim().is_empty() {
        return false;
    }
    next_line
        .map(strip_heading_prefix)
        .map(|next| {
            let next = next.trim();
            !next.is_empty() && setext_underline_pattern().is_match(next)
        })
        .unwrap_or(false)
}

/// Byte ranges within `line` that must not be rewritten: inline code spans
/// (balanced backtick pairs) and URLs.
pub fn masked_spans(line: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let ticks: Vec<usize> = line.match_indices('`').map(|(i, _)| i).collect();
    for pair in ticks.chunks_exact(2) {
        spans.push(pair[0]..pair[1] + 1);
    }
    for found in url_pattern().find_iter(line) {
        spans.push(found.range());
    }
    spans.sort_by_key(|r| r.start);
    spans
}

fn in_spans(spans: &[Range<usize>], range: &Range<usize>) -> bool {
    spans.iter().any(|s| range.start < s.end && s.start < range.end)
}

fn backtick_adjacent(text: &str, range: &Range<usize>) -> bool {
    let before = text[..range.start].chars().next_back();
    let after = text[range.end..].chars().next();
    before == Some('`') || after == Some('`')
}

/// Plural variants a validator report on `name` should also cover,
/// longest first so alternation matching prefers them.
pub fn type_variants(name: &str) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    let last = name.chars().next_back();
    let penultimate = name.chars().rev().nth(1);
    if last == Some('y') && penultimate.is_some_and(|c| !"aeiou".contains(c)) {
        variants.push(format!("{}ies", &name[..name.len() - 1]));
    } else {
        if last != Some('s') {
            variants.push(format!("{name}s"));
        }
        if name.ends_with('s')
            || name.ends_with('x')
            || name.ends_with('z')
            || name.ends_with("ch")
            || name.ends_with("sh")
        {
            variants.push(format!("{name}es"));
        }
    }
    variants.sort_by_key(|v| std::cmp::Reverse(v.len()));
    variants
}

fn line_number_at(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

pub struct CodeFormatValidator;

impl Validator for CodeFormatValidator {
    fn name(&self) -> &'static str {
        "code_format"
    }

    fn validate(&self, ctx: &NoteContext<'_>) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        if ctx.body.is_empty() {
            return summary;
        }
        check_generics(ctx.body, &mut summary);
        check_type_names(ctx.body, &mut summary);
        summary
    }
}

fn check_generics(content: &str, summary: &mut ValidationSummary) {
    let mut reported: Vec<&str> = Vec::new();

    for (range, is_code) in code_segments(content) {
        if is_code {
            continue;
        }
        let segment = &content[range.clone()];
        for found in generic_pattern().find_iter(segment) {
            let absolute = range.start + found.start()..range.start + found.end();
            if backtick_adjacent(content, &absolute) {
                continue;
            }
            let text = found.as_str();
            if reported.contains(&text) {
                continue;
            }
            let line = line_number_at(content, absolute.start);
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Error,
                    format!(
                        "Generic type '{text}' not wrapped in backticks \
                         (will be interpreted as HTML tag). Use: `{text}`"
                    ),
                )
                .with_line(line),
            );
            reported.push(text);
        }
    }

    if reported.is_empty() {
        summary.add_passed("No unescaped generic types found");
    }
}

fn check_type_names(content: &str, summary: &mut ValidationSummary) {
    let mut reported = false;

    for type_name in COMMON_TYPE_NAMES {
        if let Some(line) = first_bare_occurrence(content, type_name) {
            reported = true;
            summary.add_issue(ReviewIssue::new(
                Severity::Warning,
                format!(
                    "Type name '{type_name}' found without backticks (line ~{line}). \
                     Consider wrapping in backticks: `{type_name}`"
                ),
            ));
        }
    }

    if !reported {
        summary.add_passed("Common type names appear properly formatted");
    }
}

/// Line number of the first bare prose occurrence of `type_name`, if any.
fn first_bare_occurrence(content: &str, type_name: &str) -> Option<usize> {
    let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(type_name))).ok()?;

    for (range, is_code) in code_segments(content) {
        if is_code {
            continue;
        }
        let segment = &content[range.clone()];
        let mut line_offset = range.start;
        let lines: Vec<&str> = segment.split_inclusive('\n').collect();
        for (idx, line) in lines.iter().enumerate() {
            let next = lines.get(idx + 1).copied();
            if is_heading_line(line, next) {
                line_offset += line.len();
                continue;
            }
            let spans = masked_spans(line);
            for found in pattern.find_iter(line) {
                if in_spans(&spans, &found.range()) {
                    continue;
                }
                let absolute = line_offset + found.start()..line_offset + found.end();
                if backtick_adjacent(content, &absolute) {
                    continue;
                }
                return Some(line_number_at(content, absolute.start));
            }
            line_offset += line.len();
        }
    }
    None
}
