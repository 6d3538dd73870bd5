//! Android-topic taxonomy checks.

use super::{NoteContext, ValidationSummary, Validator};
use crate::frontmatter;
use crate::issue::{ReviewIssue, Severity};
use crate::taxonomy::CONCEPT_PREFIX;

pub struct AndroidValidator;

impl Validator for AndroidValidator {
    fn name(&self) -> &'static str {
        "android"
    }

    fn validate(&self, ctx: &NoteContext<'_>) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        let Some(fm) = ctx.frontmatter else {
            return summary;
        };
        if frontmatter::get_str(fm, "topic").as_deref() != Some("android") {
            return summary;
        }
        if ctx.filename().starts_with(CONCEPT_PREFIX) {
            return summary;
        }

        let subtopics = frontmatter::get_str_list(fm, "subtopics").unwrap_or_default();
        let tags = frontmatter::get_str_list(fm, "tags").unwrap_or_default();

        check_subtopics(ctx, &subtopics, &mut summary);
        check_tag_mirroring(&subtopics, &tags, &mut summary);
        check_moc(fm, &mut summary);
        summary
    }
}

fn check_subtopics(ctx: &NoteContext<'_>, subtopics: &[String], summary: &mut ValidationSummary) {
    let invalid: Vec<&str> = subtopics
        .iter()
        .map(String::as_str)
        .filter(|s| !ctx.taxonomy.has_android_subtopic(s))
        .collect();
    if invalid.is_empty() {
        summary.add_passed("Android subtopics valid");
    } else {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Error,
                format!("Invalid Android subtopics: {}", invalid.join(", ")),
            )
            .with_field("subtopics"),
        );
    }
}

fn check_tag_mirroring(subtopics: &[String], tags: &[String], summary: &mut ValidationSummary) {
    let missing: Vec<String> = subtopics
        .iter()
        .map(|sub| format!("android/{sub}"))
        .filter(|expected| !tags.iter().any(|t| t == expected))
        .collect();
    if missing.is_empty() {
        summary.add_passed("Android tags mirror subtopics");
    } else {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Error,
                format!("Android tags must mirror subtopics: missing {}", missing.join(", ")),
            )
            .with_field("tags"),
        );
    }
}

fn check_moc(fm: &serde_yaml::Mapping, summary: &mut ValidationSummary) {
    if frontmatter::get_str(fm, "moc").as_deref() != Some("moc-android") {
        summary.add_issue(
            ReviewIssue::new(Severity::Error, "Android notes must use moc-android")
                .with_field("moc"),
        );
    }
}
