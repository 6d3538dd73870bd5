//! vaultkit library crate
//!
//! Automation for a bilingual interview-question Markdown vault: validators,
//! deterministic and LLM-assisted fixing, duplicate detection, and the
//! review pipeline behind the `vaultkit` CLI.

pub mod config;
pub mod frontmatter;
pub mod issue;
pub mod llm;
pub mod report;
pub mod review;
pub mod taxonomy;
pub mod validators;
pub mod vault;
pub mod workflow;
