//! Note reviewer trait and the OpenRouter-backed implementation.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::future::Future;

use crate::issue::ReviewIssue;
use crate::llm::{
    create_http_client, parse_structured_content, send_with_retry, ChatRequest, ChatResponse,
    Message, ResponseFormat, RetryPolicy, OPENROUTER_URL, REQUEST_TIMEOUT_SECS,
};

const MAX_RESPONSE_TOKENS: u32 = 16384;

const TECHNICAL_REVIEW_PROMPT: &str = r#"You are the technical accuracy reviewer for bilingual (EN/RU) Markdown interview notes.

GOALS
- Validate every technical statement, algorithm explanation, complexity analysis, and code example.
- Keep changes surgical; preserve formatting, bilingual ordering (RU first), and author voice.
- When an issue is found, update the minimal fragment in both languages so they stay aligned.
- If correctness cannot be confirmed with high confidence, flag the concern instead of guessing.

NEVER
- Modify or regenerate YAML frontmatter, aliases, tags, or metadata formatting.
- Reorder headings, lists, code blocks, or sections.
- Rewrite sections merely for style.

Respond only with a JSON object:
{
  "has_issues": bool,
  "issues_found": list of strings,
  "revised_text": string (the full note text, identical to the input when no corrections are needed),
  "changes_made": bool,
  "explanation": string
}"#;

// Quoted RU headings below contain `"#`, so this literal needs the wider
// raw-string delimiter.
const ISSUE_FIX_PROMPT: &str = r###"You are an expert at fixing formatting and structural issues in bilingual (EN/RU) Markdown notes with YAML frontmatter.

You will receive the current note text and a list of validation issues. Fix ALL the reported issues with targeted, minimal changes:
- Fix only what is broken; do not rewrite working content.
- Add missing sections if required, preserving all existing content.
- moc: plain name, no brackets. related: flat list, no double brackets. Tags English-only.
- Required question headings, in order: "# Вопрос (RU)", "# Question (EN)", "## Ответ (RU)", "## Answer (EN)".
- Never invent links to files that were not already referenced.

Respond only with a JSON object:
{
  "revised_text": string (the full corrected note text),
  "fixes_applied": list of strings,
  "changes_made": bool
}"###;

/// Structured result of an external review pass.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub revised_text: String,
    pub issues_found: Vec<String>,
    pub changes_made: bool,
    pub explanation: String,
}

impl ReviewOutcome {
    pub fn unchanged(text: &str) -> Self {
        ReviewOutcome {
            revised_text: text.to_string(),
            issues_found: Vec::new(),
            changes_made: false,
            explanation: String::new(),
        }
    }
}

#[derive(Deserialize)]
struct TechnicalReviewPayload {
    #[serde(default)]
    issues_found: Vec<String>,
    revised_text: String,
    #[serde(default)]
    changes_made: bool,
    #[serde(default)]
    explanation: String,
}

#[derive(Deserialize)]
struct IssueFixPayload {
    revised_text: String,
    #[serde(default)]
    fixes_applied: Vec<String>,
    #[serde(default)]
    changes_made: bool,
}

/// External reviewer seam. The production implementation calls OpenRouter;
/// tests substitute scripted stubs.
pub trait NoteReviewer: Send + Sync {
    /// Review the note for factual/technical problems and return a
    /// (possibly revised) full text.
    fn technical_review(
        &self,
        note_text: &str,
    ) -> impl Future<Output = Result<ReviewOutcome>> + Send;

    /// Fix the given validation issues in the note text.
    fn fix_issues(
        &self,
        note_text: &str,
        issues: &[ReviewIssue],
    ) -> impl Future<Output = Result<ReviewOutcome>> + Send;
}

/// OpenRouter chat-completions reviewer.
pub struct LlmReviewer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    policy: RetryPolicy,
}

impl LlmReviewer {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Ok(LlmReviewer {
            client: create_http_client(REQUEST_TIMEOUT_SECS)?,
            api_key,
            model,
            policy: RetryPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn chat(&self, system_prompt: &str, user_content: String) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_content,
                },
            ],
            max_tokens: MAX_RESPONSE_TOKENS,
            stream: false,
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            user: crate::llm::openrouter_user(),
        };

        let body =
            send_with_retry(&self.client, OPENROUTER_URL, &self.api_key, &request, &self.policy)
                .await?;

        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse API response: {}", e))?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("API response contained no choices"))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(anyhow!("Model refused the request: {}", refusal));
        }
        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(anyhow!("API response contained empty content")),
        }
    }
}

fn format_issue_list(issues: &[ReviewIssue]) -> String {
    issues
        .iter()
        .map(|issue| {
            let mut line = format!("- [{}] {}", issue.severity, issue.message);
            if !issue.field_name().is_empty() {
                line.push_str(&format!(" (field: {})", issue.field_name()));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl NoteReviewer for LlmReviewer {
    async fn technical_review(&self, note_text: &str) -> Result<ReviewOutcome> {
        let user = format!("Review this note:\n\n{note_text}");
        let content = self.chat(TECHNICAL_REVIEW_PROMPT, user).await?;
        let payload: TechnicalReviewPayload = parse_structured_content(&content)?;
        if payload.revised_text.trim().is_empty() {
            return Err(anyhow!("Reviewer returned empty revised text"));
        }
        Ok(ReviewOutcome {
            revised_text: payload.revised_text,
            issues_found: payload.issues_found,
            changes_made: payload.changes_made,
            explanation: payload.explanation,
        })
    }

    async fn fix_issues(&self, note_text: &str, issues: &[ReviewIssue]) -> Result<ReviewOutcome> {
        let user = format!(
            "Issues to fix:\n{}\n\nNote text:\n\n{}",
            format_issue_list(issues),
            note_text
        );
        let content = self.chat(ISSUE_FIX_PROMPT, user).await?;
        let payload: IssueFixPayload = parse_structured_content(&content)?;
        if payload.revised_text.trim().is_empty() {
            return Err(anyhow!("Reviewer returned empty revised text"));
        }
        Ok(ReviewOutcome {
            revised_text: payload.revised_text,
            issues_found: payload.fixes_applied,
            changes_made: payload.changes_made,
            explanation: String::new(),
        })
    }
}
