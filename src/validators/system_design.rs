//! System-design note conventions: versioned answers, requirements,
//! architecture sections.

use super::{NoteContext, ValidationSummary, Validator};
use crate::frontmatter;
use crate::issue::{ReviewIssue, Severity};

const SHORT_VERSION_EN: &str = "## Short Version";
const SHORT_VERSION_RU: &str = "## Краткая Версия";
const REQUIREMENTS_EN: &str = "### Requirements";
const REQUIREMENTS_RU: &str = "### Требования";
const ARCHITECTURE_EN: &str = "### Architecture";
const ARCHITECTURE_RU: &str = "### Архитектура";

pub struct SystemDesignValidator;

impl Validator for SystemDesignValidator {
    fn name(&self) -> &'static str {
        "system_design"
    }

    fn validate(&self, ctx: &NoteContext<'_>) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        let Some(fm) = ctx.frontmatter else {
            return summary;
        };
        let question_kind = frontmatter::get_str(fm, "question_kind").unwrap_or_default();
        let difficulty = frontmatter::get_str(fm, "difficulty").unwrap_or_default();
        let topic = frontmatter::get_str(fm, "topic").unwrap_or_default();

        let applies = question_kind == "system-design"
            || (topic == "android" && difficulty == "hard" && question_kind == "android");
        if !applies {
            return summary;
        }

        check_versions(ctx.body, &difficulty, &mut summary);
        check_bilingual_section(
            ctx.body,
            REQUIREMENTS_RU,
            REQUIREMENTS_EN,
            "Requirements",
            "System design answers should include '### Requirements' section \
             (Functional/Non-functional requirements)",
            &mut summary,
        );
        check_bilingual_section(
            ctx.body,
            ARCHITECTURE_RU,
            ARCHITECTURE_EN,
            "Architecture",
            "System design answers should include '### Architecture' section \
             (High-level system design, components, data flow)",
            &mut summary,
        );
        summary
    }
}

fn check_versions(body: &str, difficulty: &str, summary: &mut ValidationSummary) {
    let has_versions = body.contains(SHORT_VERSION_EN) || body.contains(SHORT_VERSION_RU);
    if has_versions {
        summary.add_passed("Question includes multiple complexity versions (Short/Detailed)");
    } else if difficulty == "hard" {
        summary.add_issue(ReviewIssue::new(
            Severity::Info,
            "Consider adding '## Short Version' and '## Detailed Version' subsections \
             for complex system design questions (provides flexibility for different \
             interview depths)",
        ));
    }
}

fn check_bilingual_section(
    body: &str,
    ru: &str,
    en: &str,
    label: &str,
    advice: &str,
    summary: &mut ValidationSummary,
) {
    match (body.contains(ru), body.contains(en)) {
        (true, true) => summary.add_passed(format!("Answer includes {label} sections")),
        (true, false) | (false, true) => {
            summary.add_issue(ReviewIssue::new(
                Severity::Warning,
                format!("{label} section present in one language but missing in the other"),
            ));
        }
        (false, false) => {
            summary.add_issue(ReviewIssue::new(Severity::Info, advice));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::test_support::{has_message_containing, NoteFixture};

    fn note(question_kind: &str, difficulty: &str, body: &str) -> String {
        format!(
            "---\ntopic: system-design\nquestion_kind: {question_kind}\ndifficulty: {difficulty}\n---\n{body}"
        )
    }

    #[test]
    fn test_non_system_design_skipped() {
        let text = note("coding", "hard", "no sections at all");
        let fixture = NoteFixture::new("/vault/q-a--system-design--hard.md", &text);
        let summary = SystemDesignValidator.validate(&fixture.context());
        assert!(summary.issues.is_empty());
        assert!(summary.passed.is_empty());
    }

    #[test]
    fn test_complete_note_passes() {
        let body = "## Short Version\n\n### Требования\n\n### Requirements\n\n\
                    ### Архитектура\n\n### Architecture\n";
        let text = note("system-design", "hard", body);
        let fixture = NoteFixture::new("/vault/q-a--system-design--hard.md", &text);
        let summary = SystemDesignValidator.validate(&fixture.context());
        assert!(summary.issues.is_empty(), "unexpected: {:?}", summary.issues);
        assert_eq!(summary.passed.len(), 3);
    }

    #[test]
    fn test_one_language_missing_is_warning() {
        let body = "### Requirements\n\n### Архитектура\n\n### Architecture\n";
        let text = note("system-design", "medium", body);
        let fixture = NoteFixture::new("/vault/q-a--system-design--medium.md", &text);
        let summary = SystemDesignValidator.validate(&fixture.context());
        let issue = summary
            .issues
            .iter()
            .find(|i| i.message.contains("Requirements section present in one language"))
            .unwrap();
        assert_eq!(issue.severity, Severity::Warning);
    }

    #[test]
    fn test_hard_android_question_included() {
        let text = "---\ntopic: android\nquestion_kind: android\ndifficulty: hard\n---\nbare body\n";
        let fixture = NoteFixture::new("/vault/q-a--android--hard.md", text);
        let summary = SystemDesignValidator.validate(&fixture.context());
        assert!(has_message_containing(&summary, "Short Version"));
    }
}
