//! Frontmatter field validation.

use super::{NoteContext, ValidationSummary, Validator};
use crate::issue::{ReviewIssue, Severity};
use crate::taxonomy;
use chrono::{Local, NaiveDate};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

pub const REQUIRED_FIELDS: &[&str] = &[
    "id",
    "title",
    "aliases",
    "topic",
    "subtopics",
    "question_kind",
    "difficulty",
    "original_language",
    "language_tags",
    "status",
    "moc",
    "related",
    "created",
    "updated",
    "tags",
];

const ALLOWED_DIFFICULTIES: &[&str] = &["easy", "hard", "medium"];
const ALLOWED_LANGUAGES: &[&str] = &["en", "ru"];
const ALLOWED_QUESTION_KINDS: &[&str] = &["android", "coding", "system-design", "theory"];
const ALLOWED_STATUSES: &[&str] = &["draft", "ready", "retired", "reviewed"];

fn id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]+-\d+$").expect("static regex"))
}

fn get<'a>(fm: &'a Mapping, key: &str) -> Option<&'a Value> {
    fm.get(Value::String(key.to_string()))
}

fn get_str<'a>(fm: &'a Mapping, key: &str) -> Option<&'a str> {
    get(fm, key).and_then(Value::as_str)
}

fn str_list(value: &Value) -> Option<Vec<String>> {
    value.as_sequence().map(|seq| {
        seq.iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            })
            .collect()
    })
}

pub struct YamlValidator;

impl Validator for YamlValidator {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn validate(&self, ctx: &NoteContext<'_>) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        let Some(fm) = ctx.frontmatter else {
            summary.add_issue(ReviewIssue::new(
                Severity::Critical,
                "Missing YAML frontmatter",
            ));
            return summary;
        };

        check_required_fields(fm, &mut summary);
        check_id(ctx, fm, &mut summary);
        check_title(fm, &mut summary);
        check_aliases(fm, &mut summary);
        check_topic(ctx, fm, &mut summary);
        check_subtopics(fm, &mut summary);
        check_question_kind(fm, &mut summary);
        check_difficulty(fm, &mut summary);
        check_languages(fm, &mut summary);
        check_status(fm, &mut summary);
        check_moc(fm, &mut summary);
        check_related(fm, &mut summary);
        check_dates(fm, &mut summary);
        check_tags(fm, &mut summary);
        summary
    }
}

fn check_required_fields(fm: &Mapping, summary: &mut ValidationSummary) {
    let mut missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| get(fm, field).is_none())
        .collect();
    if missing.is_empty() {
        summary.add_passed("All required YAML fields present");
    } else {
        missing.sort_unstable();
        summary.add_issue(ReviewIssue::new(
            Severity::Critical,
            format!("Missing required YAML fields: {}", missing.join(", ")),
        ));
    }
}

fn check_id(ctx: &NoteContext<'_>, fm: &Mapping, summary: &mut ValidationSummary) {
    let Some(id) = get_str(fm, "id").filter(|s| !s.is_empty()) else {
        return;
    };
    if id_pattern().is_match(id) {
        summary.add_passed("id format valid");
    } else {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Error,
                "id must follow pattern <subject>-<serial> (e.g., algo-001, android-134)",
            )
            .with_field("id"),
        );
    }

    let conflicts = ctx.index.id_conflicts(id, ctx.filename());
    if conflicts.is_empty() {
        summary.add_passed("id unique in vault");
    } else {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Error,
                format!("id '{id}' is already used by: {}", conflicts.join(", ")),
            )
            .with_field("id"),
        );
    }
}

fn check_title(fm: &Mapping, summary: &mut ValidationSummary) {
    let Some(title) = get_str(fm, "title").filter(|s| !s.is_empty()) else {
        summary.add_issue(ReviewIssue::new(Severity::Error, "title missing").with_field("title"));
        return;
    };
    if title.contains(" / ") {
        summary.add_passed("Bilingual title format valid");
    } else {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Warning,
                "title should contain both EN and RU titles separated by ' / '",
            )
            .with_field("title"),
        );
    }
}

fn check_aliases(fm: &Mapping, summary: &mut ValidationSummary) {
    let aliases = get(fm, "aliases").and_then(str_list);
    match aliases {
        None => {
            summary.add_issue(
                ReviewIssue::new(Severity::Error, "aliases must be a list").with_field("aliases"),
            );
        }
        Some(list) if list.len() < 2 => {
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Warning,
                    "aliases should include both EN and RU variants",
                )
                .with_field("aliases"),
            );
        }
        Some(_) => summary.add_passed("aliases list present"),
    }
}

fn check_topic(ctx: &NoteContext<'_>, fm: &Mapping, summary: &mut ValidationSummary) {
    let Some(topic) = get_str(fm, "topic").filter(|s| !s.is_empty()) else {
        summary.add_issue(ReviewIssue::new(Severity::Error, "topic missing").with_field("topic"));
        return;
    };
    if ctx.taxonomy.has_topic(topic) {
        summary.add_passed("topic value valid");
    } else {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Critical,
                format!("topic '{topic}' not present in TAXONOMY.md"),
            )
            .with_field("topic"),
        );
    }
}

fn check_subtopics(fm: &Mapping, summary: &mut ValidationSummary) {
    let Some(value) = get(fm, "subtopics") else {
        summary.add_issue(
            ReviewIssue::new(Severity::Error, "subtopics list missing").with_field("subtopics"),
        );
        return;
    };
    match str_list(value) {
        Some(list) if !list.is_empty() => {
            if list.len() > 3 {
                summary.add_issue(
                    ReviewIssue::new(
                        Severity::Warning,
                        "subtopics should contain at most three values",
                    )
                    .with_field("subtopics"),
                );
            } else {
                summary.add_passed("subtopics count valid");
            }
        }
        _ => {
            summary.add_issue(
                ReviewIssue::new(Severity::Error, "subtopics must be a non-empty list")
                    .with_field("subtopics"),
            );
        }
    }
}

fn check_question_kind(fm: &Mapping, summary: &mut ValidationSummary) {
    match get_str(fm, "question_kind") {
        Some(kind) if ALLOWED_QUESTION_KINDS.contains(&kind) => {
            summary.add_passed("question_kind valid");
        }
        _ => {
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Error,
                    format!(
                        "question_kind must be one of [{}]",
                        ALLOWED_QUESTION_KINDS.join(", ")
                    ),
                )
                .with_field("question_kind"),
            );
        }
    }
}

fn check_difficulty(fm: &Mapping, summary: &mut ValidationSummary) {
    match get_str(fm, "difficulty") {
        Some(level) if ALLOWED_DIFFICULTIES.contains(&level) => {
            summary.add_passed("difficulty value valid");
        }
        _ => {
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Error,
                    format!(
                        "difficulty must be one of [{}]",
                        ALLOWED_DIFFICULTIES.join(", ")
                    ),
                )
                .with_field("difficulty"),
            );
        }
    }
}

fn check_languages(fm: &Mapping, summary: &mut ValidationSummary) {
    let original = get_str(fm, "original_language");
    if !matches!(original, Some(lang) if ALLOWED_LANGUAGES.contains(&lang)) {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Error,
                format!(
                    "original_language must be one of [{}]",
                    ALLOWED_LANGUAGES.join(", ")
                ),
            )
            .with_field("original_language"),
        );
    }

    let Some(tags) = get(fm, "language_tags").and_then(str_list).filter(|l| !l.is_empty()) else {
        summary.add_issue(
            ReviewIssue::new(Severity::Error, "language_tags must be a list")
                .with_field("language_tags"),
        );
        return;
    };

    let mut invalid: Vec<&str> = tags
        .iter()
        .map(String::as_str)
        .filter(|tag| !ALLOWED_LANGUAGES.contains(tag))
        .collect();
    if invalid.is_empty() {
        summary.add_passed("language tags valid");
    } else {
        invalid.sort_unstable();
        summary.add_issue(
            ReviewIssue::new(
                Severity::Error,
                format!(
                    "language_tags contain invalid values: {}",
                    invalid.join(", ")
                ),
            )
            .with_field("language_tags"),
        );
    }

    if let Some(original) = original {
        if !tags.iter().any(|t| t == original) {
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Warning,
                    "language_tags should include original_language",
                )
                .with_field("language_tags"),
            );
        }
    }
}

fn check_status(fm: &Mapping, summary: &mut ValidationSummary) {
    match get_str(fm, "status") {
        Some(status) if ALLOWED_STATUSES.contains(&status) => {
            summary.add_passed("status value valid");
        }
        _ => {
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Error,
                    format!("status must be one of: {}", ALLOWED_STATUSES.join(", ")),
                )
                .with_field("status"),
            );
        }
    }
}

fn check_moc(fm: &Mapping, summary: &mut ValidationSummary) {
    let Some(moc) = get_str(fm, "moc").filter(|s| !s.is_empty()) else {
        summary.add_issue(ReviewIssue::new(Severity::Error, "moc missing").with_field("moc"));
        return;
    };
    if moc.contains('[') || moc.contains(']') {
        summary.add_issue(
            ReviewIssue::new(Severity::Error, "moc must not contain brackets").with_field("moc"),
        );
        return;
    }

    let topic = get_str(fm, "topic");
    match topic.and_then(taxonomy::moc_for_topic) {
        Some(expected) => {
            if moc == expected {
                summary.add_passed("moc matches topic");
            } else {
                summary.add_issue(
                    ReviewIssue::new(
                        Severity::Warning,
                        format!(
                            "moc should match topic: expected '{}' for topic '{}'",
                            expected,
                            topic.unwrap_or_default()
                        ),
                    )
                    .with_field("moc"),
                );
            }
        }
        None => {
            if moc.starts_with(taxonomy::MOC_PREFIX) {
                summary.add_passed("moc format valid");
            } else {
                summary.add_issue(
                    ReviewIssue::new(
                        Severity::Warning,
                        format!("moc format should start with 'moc-' (current: '{moc}')"),
                    )
                    .with_field("moc"),
                );
            }
        }
    }
}

fn check_related(fm: &Mapping, summary: &mut ValidationSummary) {
    let Some(value) = get(fm, "related") else {
        summary.add_issue(
            ReviewIssue::new(Severity::Error, "related field missing").with_field("related"),
        );
        return;
    };
    let Some(related) = str_list(value) else {
        summary.add_issue(
            ReviewIssue::new(Severity::Error, "related must be a list of note ids")
                .with_field("related"),
        );
        return;
    };
    if related.is_empty() {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Warning,
                "related list is empty; add concept/question links",
            )
            .with_field("related"),
        );
        return;
    }
    if related.iter().any(|item| item.contains("[[")) {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Error,
                "related list must not contain double brackets",
            )
            .with_field("related"),
        );
    } else {
        summary.add_passed("related list format valid");
    }
}

fn check_dates(fm: &Mapping, summary: &mut ValidationSummary) {
    let today = Local::now().date_naive();
    let mut parsed: [Option<NaiveDate>; 2] = [None, None];
    for (slot, field) in ["created", "updated"].into_iter().enumerate() {
        parsed[slot] = check_date_field(fm, field, today, summary);
    }
    // The fixer keys on these exact phrasings.
    if let (Some(created), Some(updated)) = (parsed[0], parsed[1]) {
        if created > updated {
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Error,
                    format!(
                        "'created' ({created}) is after 'updated' ({updated}) - \
                         this violates temporal logic"
                    ),
                )
                .with_field("created"),
            );
        } else {
            summary.add_passed("created/updated ordering valid");
        }
    }
}

fn check_date_field(
    fm: &Mapping,
    field: &str,
    today: NaiveDate,
    summary: &mut ValidationSummary,
) -> Option<NaiveDate> {
    let Some(value) = get(fm, field) else {
        // Lenient with existing notes that predate the timestamp rules.
        summary.add_issue(
            ReviewIssue::new(
                Severity::Warning,
                format!("{field} missing (recommended for new notes)"),
            )
            .with_field(field),
        );
        return None;
    };
    match value {
        Value::String(text) => match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            Ok(date) => {
                if date > today {
                    summary.add_issue(
                        ReviewIssue::new(
                            Severity::Error,
                            format!("'{field}' date {date} is in the future (today is {today})"),
                        )
                        .with_field(field),
                    );
                } else {
                    summary.add_passed(format!("{field} date format valid"));
                }
                Some(date)
            }
            Err(_) => {
                summary.add_issue(
                    ReviewIssue::new(Severity::Error, format!("{field} must follow YYYY-MM-DD"))
                        .with_field(field),
                );
                None
            }
        },
        Value::Null => {
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Warning,
                    format!("{field} missing (recommended for new notes)"),
                )
                .with_field(field),
            );
            None
        }
        _ => {
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Error,
                    format!("{field} must be a date string (YYYY-MM-DD)"),
                )
                .with_field(field),
            );
            None
        }
    }
}

fn check_tags(fm: &Mapping, summary: &mut ValidationSummary) {
    let Some(tags) = get(fm, "tags").and_then(str_list).filter(|l| !l.is_empty()) else {
        summary.add_issue(
            ReviewIssue::new(Severity::Error, "tags must be a non-empty list").with_field("tags"),
        );
        return;
    };

    let non_ascii: Vec<&str> = tags
        .iter()
        .map(String::as_str)
        .filter(|tag| !tag.is_ascii())
        .collect();
    if non_ascii.is_empty() {
        summary.add_passed("tags contain only ASCII characters");
    } else {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Error,
                format!("tags must be ASCII/English only: {}", non_ascii.join(", ")),
            )
            .with_field("tags"),
        );
    }

    if let Some(difficulty) = get_str(fm, "difficulty").filter(|s| !s.is_empty()) {
        let expected = format!("difficulty/{difficulty}");
        if tags.iter().any(|t| *t == expected) {
            summary.add_passed("difficulty tag present");
        } else {
            summary.add_issue(
                ReviewIssue::new(Severity::Error, format!("tags must include '{expected}'"))
                    .with_field("tags"),
            );
        }
    }
}
