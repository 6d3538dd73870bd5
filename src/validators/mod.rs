//! Note validators and the registry that runs them.
//!
//! Each validator inspects one note (body, frontmatter, path) against the
//! vault conventions and reports [`ReviewIssue`]s plus passed-check notes.
//! Validators are pure: they never mutate the note.

pub mod android;
pub mod code_format;
pub mod format;
pub mod links;
pub mod structure;
pub mod system_design;
pub mod yaml;

use crate::issue::ReviewIssue;
use crate::taxonomy::Taxonomy;
use crate::vault::NoteIndex;
use serde_yaml::Mapping;
use std::path::Path;

/// Everything a validator may look at for one note.
pub struct NoteContext<'a> {
    pub path: &'a Path,
    pub vault_root: &'a Path,
    pub frontmatter: Option<&'a Mapping>,
    pub body: &'a str,
    pub taxonomy: &'a Taxonomy,
    pub index: &'a NoteIndex,
}

impl<'a> NoteContext<'a> {
    pub fn filename(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Issues and passed checks collected by one validator run.
#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub issues: Vec<ReviewIssue>,
    pub passed: Vec<String>,
}

impl ValidationSummary {
    pub fn add_issue(&mut self, issue: ReviewIssue) {
        self.issues.push(issue);
    }

    pub fn add_passed(&mut self, message: impl Into<String>) {
        self.passed.push(message.into());
    }
}

pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(&self, ctx: &NoteContext<'_>) -> ValidationSummary;
}

/// Ordered collection of validators applied to every note.
pub struct ValidatorRegistry {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorRegistry {
    /// Registry with every built-in validator, in reporting order.
    pub fn with_builtin() -> Self {
        ValidatorRegistry {
            validators: vec![
                Box::new(yaml::YamlValidator),
                Box::new(format::FormatValidator),
                Box::new(structure::StructureValidator),
                Box::new(links::LinkValidator),
                Box::new(code_format::CodeFormatValidator),
                Box::new(system_design::SystemDesignValidator),
                Box::new(android::AndroidValidator),
            ],
        }
    }

    pub fn empty() -> Self {
        ValidatorRegistry {
            validators: Vec::new(),
        }
    }

    /// Add a validator; re-registering a name is a no-op.
    pub fn register(&mut self, validator: Box<dyn Validator>) {
        if self.validators.iter().any(|v| v.name() == validator.name()) {
            return;
        }
        self.validators.push(validator);
    }

    pub fn clear(&mut self) {
        self.validators.clear();
    }

    pub fn validators(&self) -> &[Box<dyn Validator>] {
        &self.validators
    }

    /// Run every validator and merge their summaries.
    pub fn run_all(&self, ctx: &NoteContext<'_>) -> ValidationSummary {
        let mut merged = ValidationSummary::default();
        for validator in &self.validators {
            let summary = validator.validate(ctx);
            merged.issues.extend(summary.issues);
            merged.passed.extend(summary.passed);
        }
        merged
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;
    use test_support::NoteFixture;

    struct DummyValidator;

    impl Validator for DummyValidator {
        fn name(&self) -> &'static str {
            "dummy"
        }

        fn validate(&self, _ctx: &NoteContext<'_>) -> ValidationSummary {
            let mut summary = ValidationSummary::default();
            summary.add_issue(ReviewIssue::new(Severity::Info, "dummy ran"));
            summary
        }
    }

    #[test]
    fn test_register_is_idempotent_by_name() {
        let mut registry = ValidatorRegistry::empty();
        registry.register(Box::new(DummyValidator));
        registry.register(Box::new(DummyValidator));
        assert_eq!(registry.validators().len(), 1);
    }

    #[test]
    fn test_clear_then_substitute() {
        let mut registry = ValidatorRegistry::with_builtin();
        registry.clear();
        registry.register(Box::new(DummyValidator));

        let fixture = NoteFixture::new("/vault/q-a--algorithms--easy.md", "body only");
        let summary = registry.run_all(&fixture.context());
        assert_eq!(summary.issues.len(), 1);
        assert_eq!(summary.issues[0].message, "dummy ran");
    }

    #[test]
    fn test_builtin_order_is_stable() {
        let registry = ValidatorRegistry::with_builtin();
        let names: Vec<&str> = registry.validators().iter().map(|v| v.name()).collect();
        assert_eq!(
            names,
            [
                "yaml",
                "format",
                "structure",
                "links",
                "code_format",
                "system_design",
                "android"
            ]
        );
    }
}
