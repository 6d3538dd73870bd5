//! OpenRouter chat-completions client with retry and salvage parsing.

pub mod reviewer;

pub use reviewer::{LlmReviewer, NoteReviewer, ReviewOutcome};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub(crate) const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Maximum length for error content in error messages
const MAX_ERROR_CONTENT_LEN: usize = 200;

/// Explicit retry policy for external calls: bounded attempts, exponential
/// backoff, rate-limit hints honored as a minimum delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_backoff_ms: 2000,
            backoff_multiplier: 2,
            max_backoff_secs: 60,
        }
    }
}

impl RetryPolicy {
    pub fn backoff_secs(&self, retry_count: u32) -> u64 {
        let factor = self
            .backoff_multiplier
            .saturating_pow(retry_count.saturating_sub(1));
        let ms = self.initial_backoff_ms.saturating_mul(factor);
        let secs = ms / 1000;
        secs.clamp(1, self.max_backoff_secs)
    }
}

fn truncate_str(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Sanitize API response content for error messages to prevent credential leakage.
fn sanitize_api_response(content: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "api_key", "apikey", "secret", "password", "credential", "bearer", "sk-",
    ];

    let truncated = truncate_str(content, MAX_ERROR_CONTENT_LEN);
    let lower = truncated.to_lowercase();
    for pattern in SECRET_PATTERNS {
        if lower.contains(pattern) {
            return "(response details redacted - may contain sensitive data)".to_string();
        }
    }
    truncated.to_string()
}

/// Extract retry-after hint from a rate-limit response body, if present.
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    let after_retry = &text_lower[pos..];
    for word in after_retry.split_whitespace().skip(1).take(5) {
        if let Ok(secs) = word.trim_matches(|c: char| !c.is_numeric()).parse::<u64>() {
            if secs > 0 && secs < 300 {
                return Some(secs);
            }
        }
    }
    None
}

pub(crate) fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn push_unique_candidate(candidates: &mut Vec<String>, candidate: impl Into<String>) {
    let candidate = candidate.into();
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return;
    }
    if !candidates.iter().any(|existing| existing == trimmed) {
        candidates.push(trimmed.to_string());
    }
}

fn strip_markdown_fences(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return None;
    }
    let without_open = trimmed.strip_prefix("```")?;
    let after_header = if let Some(newline_idx) = without_open.find('\n') {
        &without_open[newline_idx + 1..]
    } else {
        without_open
    };
    let end_idx = after_header.rfind("```")?;
    Some(after_header[..end_idx].trim().to_string())
}

fn extract_balanced_json_from(content: &str, start: usize) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
                continue;
            }
            if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    let end = start + offset + ch.len_utf8();
                    return Some(content[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn extract_json_candidates(content: &str, max_candidates: usize) -> Vec<String> {
    let mut out = Vec::new();
    if max_candidates == 0 {
        return out;
    }
    for (idx, ch) in content.char_indices() {
        if ch == '{' || ch == '[' {
            if let Some(candidate) = extract_balanced_json_from(content, idx) {
                push_unique_candidate(&mut out, candidate);
                if out.len() >= max_candidates {
                    break;
                }
            }
        }
    }
    out
}

/// Parse a structured payload out of free-form model output. Tries the raw
/// content, then a fence-stripped version, then balanced-JSON salvage.
pub(crate) fn parse_structured_content<T>(content: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let mut candidates = Vec::new();
    push_unique_candidate(&mut candidates, content);
    if let Some(stripped) = strip_markdown_fences(content) {
        push_unique_candidate(&mut candidates, stripped);
    }

    let mut idx = 0usize;
    while idx < candidates.len() {
        let current = candidates[idx].clone();
        for extracted in extract_json_candidates(&current, 4) {
            push_unique_candidate(&mut candidates, extracted);
        }
        idx += 1;
    }

    let mut last_err: Option<String> = None;
    for candidate in candidates {
        match serde_json::from_str::<T>(&candidate) {
            Ok(data) => return Ok(data),
            Err(err) => last_err = Some(err.to_string()),
        }
    }

    Err(anyhow!(
        "Failed to parse structured response: {}\nContent: {}",
        last_err.unwrap_or_else(|| "unknown parse error".to_string()),
        sanitize_api_response(content)
    ))
}

#[derive(Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// Anonymous user id OpenRouter uses for routing stickiness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Stable anonymous identifier for OpenRouter's `user` field, persisted in
/// config so the same installation gets consistent routing.
pub(crate) fn openrouter_user() -> Option<String> {
    let mut config = crate::config::Config::load();
    if let Some(id) = config.openrouter_user_id.clone() {
        return Some(id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    config.openrouter_user_id = Some(id.clone());
    let _ = config.save();
    Some(id)
}

#[derive(Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub(crate) struct Choice {
    pub message: MessageContent,
}

#[derive(Deserialize)]
pub(crate) struct MessageContent {
    /// Null in some responses (refusals, upstream errors).
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    code: Option<u16>,
}

pub(crate) fn create_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))
}

/// POST with the retry loop made explicit: try, classify the failure,
/// sleep, retry. Rate-limit hints override the computed backoff.
pub(crate) async fn send_with_retry<T: Serialize>(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    request_body: &T,
    policy: &RetryPolicy,
) -> Result<String> {
    let mut last_error = String::new();
    let mut retry_count = 0;

    while retry_count <= policy.max_retries {
        let response = match client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {api_key}"))
            .json(request_body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                last_error = err.to_string();
                if is_retryable_network_error(&err) && retry_count < policy.max_retries {
                    retry_count += 1;
                    let delay = policy.backoff_secs(retry_count);
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    continue;
                }
                return Err(err.into());
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                last_error = err.to_string();
                if is_retryable_network_error(&err) && retry_count < policy.max_retries {
                    retry_count += 1;
                    let delay = policy.backoff_secs(retry_count);
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    continue;
                }
                return Err(err.into());
            }
        };

        if status.is_success() {
            // Some gateways return errors with 200 status (upstream provider issues).
            if let Ok(err_resp) = serde_json::from_str::<ApiError>(&text) {
                let is_retryable = err_resp
                    .error
                    .code
                    .map(|c| c >= 500 || c == 429)
                    .unwrap_or(true);
                if is_retryable && retry_count < policy.max_retries {
                    retry_count += 1;
                    let delay = policy.backoff_secs(retry_count);
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    continue;
                }
                return Err(anyhow!(
                    "API error: {}",
                    truncate_str(&err_resp.error.message, MAX_ERROR_CONTENT_LEN)
                ));
            }
            return Ok(text);
        }

        last_error = text.clone();

        if status.as_u16() == 429 && retry_count < policy.max_retries {
            retry_count += 1;
            let delay = parse_retry_after(&text)
                .unwrap_or_else(|| policy.backoff_secs(retry_count))
                .min(policy.max_backoff_secs);
            tokio::time::sleep(Duration::from_secs(delay)).await;
            continue;
        }

        if status.is_server_error() && retry_count < policy.max_retries {
            retry_count += 1;
            let delay = policy.backoff_secs(retry_count);
            tokio::time::sleep(Duration::from_secs(delay)).await;
            continue;
        }

        let error_msg = match status.as_u16() {
            401 => "Invalid API key. Run 'vaultkit setup' to update it.".to_string(),
            429 => format!("Rate limited after {retry_count} retries. Try again in a few minutes."),
            500..=599 => format!(
                "Server error ({status}). The service may be temporarily unavailable."
            ),
            _ => format!("API error {}: {}", status, sanitize_api_response(&text)),
        };
        return Err(anyhow!("{}", error_msg));
    }

    Err(anyhow!("{}", last_error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Sample {
        value: String,
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_secs(1), 2);
        assert_eq!(policy.backoff_secs(2), 4);
        assert_eq!(policy.backoff_secs(3), 8);
        let capped = RetryPolicy {
            max_backoff_secs: 5,
            ..RetryPolicy::default()
        };
        assert_eq!(capped.backoff_secs(4), 5);
    }

    #[test]
    fn test_parse_retry_after_hint() {
        assert_eq!(parse_retry_after("please retry after 30 seconds"), Some(30));
        assert_eq!(parse_retry_after("no hint here"), None);
        // Out-of-range hints are ignored.
        assert_eq!(parse_retry_after("retry after 10000 seconds"), None);
    }

    #[test]
    fn test_parse_structured_content_plain_and_fenced() {
        let parsed: Sample = parse_structured_content(r#"{"value": "ok"}"#).unwrap();
        assert_eq!(parsed.value, "ok");

        let fenced = "```json\n{\"value\": \"fenced\"}\n```";
        let parsed: Sample = parse_structured_content(fenced).unwrap();
        assert_eq!(parsed.value, "fenced");
    }

    #[test]
    fn test_parse_structured_content_salvages_prose_wrapper() {
        let noisy = "Here is the result you asked for:\n{\"value\": \"salvaged\"}\nHope that helps!";
        let parsed: Sample = parse_structured_content(noisy).unwrap();
        assert_eq!(parsed.value, "salvaged");
    }

    #[test]
    fn test_parse_structured_content_failure_is_sanitized() {
        let err = parse_structured_content::<Sample>("api_key=sk-123 not json").unwrap_err();
        assert!(err.to_string().contains("redacted"));
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_api_response(&long).len(), MAX_ERROR_CONTENT_LEN);
    }
}
