//! Wikilink and related-field resolution against the note index.

use super::{NoteContext, ValidationSummary, Validator};
use crate::frontmatter;
use crate::issue::{ReviewIssue, Severity};
use crate::taxonomy::{CONCEPT_PREFIX, QUESTION_PREFIX};
use regex::Regex;
use std::sync::OnceLock;

const RELATED_MIN_RECOMMENDED: usize = 2;
const RELATED_MAX_RECOMMENDED: usize = 5;

fn wikilink_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("static regex"))
}

pub struct LinkValidator;

impl Validator for LinkValidator {
    fn name(&self) -> &'static str {
        "links"
    }

    fn validate(&self, ctx: &NoteContext<'_>) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        check_moc_resolves(ctx, &mut summary);
        check_related_resolve(ctx, &mut summary);
        check_related_quality(ctx, &mut summary);
        check_wikilinks(ctx, &mut summary);
        check_concept_link_presence(ctx, &mut summary);
        summary
    }
}

fn check_moc_resolves(ctx: &NoteContext<'_>, summary: &mut ValidationSummary) {
    let Some(moc) = ctx
        .frontmatter
        .and_then(|fm| frontmatter::get_str(fm, "moc"))
        .filter(|m| !m.is_empty())
    else {
        return;
    };
    if ctx.index.contains(&moc) {
        summary.add_passed("moc link resolves");
    } else {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Error,
                format!("moc '{moc}' does not match any note filename"),
            )
            .with_field("moc"),
        );
    }
}

fn related_list(ctx: &NoteContext<'_>) -> Vec<String> {
    ctx.frontmatter
        .and_then(|fm| frontmatter::get_str_list(fm, "related"))
        .unwrap_or_default()
}

fn check_related_resolve(ctx: &NoteContext<'_>, summary: &mut ValidationSummary) {
    for item in related_list(ctx) {
        if !ctx.index.contains(&item) {
            summary.add_issue(
                ReviewIssue::new(
                    Severity::Error,
                    format!("related link '{item}' cannot be resolved"),
                )
                .with_field("related"),
            );
        }
    }
}

fn check_related_quality(ctx: &NoteContext<'_>, summary: &mut ValidationSummary) {
    let related = related_list(ctx);

    if related.len() < RELATED_MIN_RECOMMENDED {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Warning,
                format!(
                    "Related field has {} item(s). Recommended: {}-{} items \
                     (mix of concept links c-... and question links q-...)",
                    related.len(),
                    RELATED_MIN_RECOMMENDED,
                    RELATED_MAX_RECOMMENDED
                ),
            )
            .with_field("related"),
        );
    } else if related.len() > RELATED_MAX_RECOMMENDED {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Info,
                format!(
                    "Related field has {} items. Recommended: {}-{} items \
                     for focused cross-referencing",
                    related.len(),
                    RELATED_MIN_RECOMMENDED,
                    RELATED_MAX_RECOMMENDED
                ),
            )
            .with_field("related"),
        );
    } else {
        summary.add_passed(format!("Related field has {} items (optimal range)", related.len()));
    }

    let concept_links = related
        .iter()
        .filter(|r| r.starts_with(CONCEPT_PREFIX))
        .count();
    let question_links = related
        .iter()
        .filter(|r| r.starts_with(QUESTION_PREFIX))
        .count();

    if concept_links == 0 {
        summary.add_issue(
            ReviewIssue::new(
                Severity::Warning,
                "Related field should include at least 1 concept link (c-...) \
                 for foundational knowledge",
            )
            .with_field("related"),
        );
    } else {
        summary.add_passed(format!("Related field includes {concept_links} concept link(s)"));
    }
    if question_links > 0 {
        summary.add_passed(format!("Related field includes {question_links} question link(s)"));
    }
}

fn check_wikilinks(ctx: &NoteContext<'_>, summary: &mut ValidationSummary) {
    for captures in wikilink_pattern().captures_iter(ctx.body) {
        let mut target = captures[1].trim();
        if let Some((id, _alias)) = target.split_once('|') {
            target = id.trim();
        }
        if !ctx.index.contains(target) {
            summary.add_issue(ReviewIssue::new(
                Severity::Error,
                format!("Wikilink [[{target}]] does not match any note filename"),
            ));
        }
    }
}

fn check_concept_link_presence(ctx: &NoteContext<'_>, summary: &mut ValidationSummary) {
    if ctx.body.is_empty() {
        return;
    }
    if !ctx.body.contains("[[c-") {
        summary.add_issue(ReviewIssue::new(
            Severity::Warning,
            "Note should include at least one concept link ([[c-...]]) in content body",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::test_support::{has_message_containing, NoteFixture};
    use crate::vault::NoteIndex;
    use std::fs;

    fn indexed_fixture(text: &str) -> NoteFixture {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "moc-algorithms.md",
            "c-binary-search.md",
            "q-related--algorithms--easy.md",
        ] {
            fs::write(dir.path().join(name), "stub").unwrap();
        }
        let mut fixture = NoteFixture::new("/vault/q-a--algorithms--easy.md", text);
        fixture.index = NoteIndex::build(dir.path());
        fixture
    }

    #[test]
    fn test_resolving_links_pass() {
        let text = "---\nmoc: moc-algorithms\nrelated: [c-binary-search, q-related--algorithms--easy]\n---\n\
                    See [[c-binary-search]] and [[c-binary-search|поиск]].\n";
        let fixture = indexed_fixture(text);
        let summary = LinkValidator.validate(&fixture.context());
        assert!(summary.issues.is_empty(), "unexpected: {:?}", summary.issues);
    }

    #[test]
    fn test_unresolved_links_reported() {
        let text = "---\nmoc: moc-missing\nrelated: [c-binary-search, c-missing]\n---\n\
                    See [[q-ghost--algorithms--easy]].\n";
        let fixture = indexed_fixture(text);
        let summary = LinkValidator.validate(&fixture.context());
        assert!(has_message_containing(&summary, "moc 'moc-missing' does not match"));
        assert!(has_message_containing(&summary, "related link 'c-missing' cannot be resolved"));
        assert!(has_message_containing(
            &summary,
            "Wikilink [[q-ghost--algorithms--easy]] does not match"
        ));
    }

    #[test]
    fn test_related_quality_warnings() {
        let text = "---\nrelated: [q-related--algorithms--easy]\n---\nbody without concept links\n";
        let fixture = indexed_fixture(text);
        let summary = LinkValidator.validate(&fixture.context());
        assert!(has_message_containing(&summary, "Related field has 1 item(s)"));
        assert!(has_message_containing(&summary, "at least 1 concept link"));
        assert!(has_message_containing(&summary, "concept link ([[c-...]])"));
    }
}
