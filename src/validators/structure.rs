//! Body structure: required bilingual headings and their order.

use super::{NoteContext, ValidationSummary, Validator};
use crate::issue::{ReviewIssue, Severity};
use crate::taxonomy::{CONCEPT_PREFIX, MOC_PREFIX, QUESTION_PREFIX};

/// Canonical question-note headings, in the order the body must present them.
pub const QUESTION_HEADINGS: &[&str] = &[
    "# Вопрос (RU)",
    "# Question (EN)",
    "## Ответ (RU)",
    "## Answer (EN)",
];

/// Optional trailing sections, allowed only after the required four.
pub const OPTIONAL_HEADINGS: &[&str] = &["## Follow-ups", "## References", "## Related Questions"];

pub const CONCEPT_HEADINGS: &[&str] = &["# Summary (EN)", "## Summary (RU)"];

pub struct StructureValidator;

impl Validator for StructureValidator {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn validate(&self, ctx: &NoteContext<'_>) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        let filename = ctx.filename();
        if filename.starts_with(MOC_PREFIX) {
            return summary;
        }
        let required: &[&str] = if filename.starts_with(CONCEPT_PREFIX) {
            CONCEPT_HEADINGS
        } else if filename.starts_with(QUESTION_PREFIX) {
            QUESTION_HEADINGS
        } else {
            return summary;
        };

        let headings = heading_lines(ctx.body);
        check_required(required, &headings, &mut summary);
        check_order(required, &headings, &mut summary);
        summary
    }
}

/// Heading lines outside fenced code blocks, trimmed of trailing whitespace.
pub fn heading_lines(body: &str) -> Vec<String> {
    let mut in_fence = false;
    let mut headings = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence && trimmed.starts_with('#') {
            headings.push(trimmed.to_string());
        }
    }
    headings
}

fn check_required(required: &[&str], headings: &[String], summary: &mut ValidationSummary) {
    let mut missing = Vec::new();
    for heading in required {
        if !headings.iter().any(|h| h == heading) {
            missing.push(*heading);
        }
    }
    if missing.is_empty() {
        summary.add_passed("All required headings present");
    } else {
        for heading in missing {
            summary.add_issue(ReviewIssue::new(
                Severity::Error,
                format!("Missing required heading '{heading}'"),
            ));
        }
    }
}

fn check_order(required: &[&str], headings: &[String], summary: &mut ValidationSummary) {
    let positions: Vec<usize> = required
        .iter()
        .filter_map(|heading| headings.iter().position(|h| h == heading))
        .collect();
    if positions.len() < required.len() {
        // Order is meaningless while headings are missing.
        return;
    }
    if positions.windows(2).all(|w| w[0] < w[1]) {
        summary.add_passed("Headings follow canonical order");
    } else {
        // The oscillation fixer matches this message; keep it stable.
        summary.add_issue(ReviewIssue::new(
            Severity::Error,
            "Headings appear out of expected order",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::test_support::{has_message_containing, NoteFixture};

    fn question_body(order: &[&str]) -> String {
        let mut text = String::from("---\ntopic: algorithms\n---\n");
        for heading in order {
            text.push_str(&format!("\n{heading}\n\ncontent\n"));
        }
        text
    }

    #[test]
    fn test_canonical_order_passes() {
        let body = question_body(QUESTION_HEADINGS);
        let fixture = NoteFixture::new("/vault/q-a--algorithms--easy.md", &body);
        let summary = StructureValidator.validate(&fixture.context());
        assert!(summary.issues.is_empty(), "unexpected: {:?}", summary.issues);
    }

    #[test]
    fn test_swapped_answers_flagged_as_order_issue() {
        let body = question_body(&[
            "# Вопрос (RU)",
            "# Question (EN)",
            "## Answer (EN)",
            "## Ответ (RU)",
        ]);
        let fixture = NoteFixture::new("/vault/q-a--algorithms--easy.md", &body);
        let summary = StructureValidator.validate(&fixture.context());
        assert!(has_message_containing(
            &summary,
            "Headings appear out of expected order"
        ));
    }

    #[test]
    fn test_missing_heading_reported_without_order_issue() {
        let body = question_body(&["# Вопрос (RU)", "# Question (EN)", "## Ответ (RU)"]);
        let fixture = NoteFixture::new("/vault/q-a--algorithms--easy.md", &body);
        let summary = StructureValidator.validate(&fixture.context());
        assert!(has_message_containing(
            &summary,
            "Missing required heading '## Answer (EN)'"
        ));
        assert!(!has_message_containing(&summary, "out of expected order"));
    }

    #[test]
    fn test_fenced_headings_ignored() {
        let mut body = question_body(QUESTION_HEADINGS);
        body.push_str("\n```markdown\n## Ответ (RU)\n```\n");
        let fixture = NoteFixture::new("/vault/q-a--algorithms--easy.md", &body);
        let summary = StructureValidator.validate(&fixture.context());
        assert!(summary.issues.is_empty());
    }

    #[test]
    fn test_moc_notes_skipped() {
        let fixture = NoteFixture::new("/vault/90-MOCs/moc-algorithms.md", "---\ntopic: x\n---\n");
        let summary = StructureValidator.validate(&fixture.context());
        assert!(summary.issues.is_empty());
        assert!(summary.passed.is_empty());
    }
}
