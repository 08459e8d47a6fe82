//! LLM client abstraction: the four fixed operations the ingest pipeline and
//! maintenance jobs need (extract, classify, check conflict, summarize).
//!
//! Prompts are reproduced verbatim from the original implementation and must
//! not be altered — callers format them with the exact field substitutions
//! below.

pub mod remote;

pub use remote::OpenAiCompatibleClient;

use crate::{Error, Result};
use std::time::Duration;

/// A single extracted fact, as returned by [`LlmProvider::extract_facts`].
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ExtractedFact {
    /// The entity the fact is about.
    pub subject: String,
    /// The relationship or property name.
    pub predicate: String,
    /// The value or related entity.
    pub object: String,
    /// One of the six fixed categories, if the model supplied one.
    #[serde(default)]
    pub category: Option<String>,
    /// Confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    0.8
}

#[derive(Debug, serde::Deserialize)]
struct FactsResponse {
    #[serde(default)]
    facts: Vec<ExtractedFact>,
}

/// The six fixed classification categories, in the order the fixed prompts
/// present them.
pub const CATEGORIES: &[&str] = &["preferences", "facts", "events", "relationships", "skills", "goals"];

/// A provider of the four LLM-backed pipeline operations.
///
/// All operations are fallible by the same rule: a missing key, a network
/// error, or an unparseable response is reported to the caller rather than
/// panicking; callers decide whether to fall back to a rule-based path.
pub trait LlmProvider: Send + Sync {
    /// Provider identifier, e.g. `openai`.
    fn name(&self) -> &'static str;

    /// Extracts atomic facts from raw text via the fixed extraction prompt.
    /// A malformed or empty response is tolerated and yields an empty list
    /// rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error only on transport failure (network, auth, timeout).
    fn extract_facts(&self, text: &str) -> Result<Vec<ExtractedFact>>;

    /// Classifies a fact into one of [`CATEGORIES`] via the fixed
    /// classification prompt.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure. An unrecognized answer is
    /// returned as `Ok(None)`, leaving the rule-based fallback to the caller.
    fn classify(&self, subject: &str, predicate: &str, object: &str) -> Result<Option<String>>;

    /// Asks whether two same-subject-predicate facts conflict, via the fixed
    /// conflict-check prompt.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    fn check_conflict(
        &self,
        subject1: &str,
        predicate1: &str,
        object1: &str,
        subject2: &str,
        predicate2: &str,
        object2: &str,
    ) -> Result<bool>;

    /// Summarizes a category's facts into a short third-person paragraph via
    /// the fixed summary prompt.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    fn summarize_category(&self, category: &str, facts: &[String]) -> Result<String>;
}

/// HTTP client configuration for LLM requests.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self { timeout_ms: 60_000, connect_timeout_ms: 5_000 }
    }
}

impl LlmHttpConfig {
    /// Builds HTTP client configuration from a [`crate::config::LlmSettings`].
    #[must_use]
    pub fn from_settings(settings: &crate::config::LlmSettings) -> Self {
        Self { timeout_ms: settings.timeout_secs * 1_000, connect_timeout_ms: 5_000 }
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }
    builder.build().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to build LLM HTTP client with configured timeouts, using default");
        reqwest::blocking::Client::new()
    })
}

const MAX_ERROR_RESPONSE_CHARS: usize = 200;

/// Truncates a raw LLM response for inclusion in an error message, so a
/// pathological response body never blows up a log line.
#[must_use]
pub fn sanitize_llm_response_for_error(response: &str) -> String {
    if response.chars().count() > MAX_ERROR_RESPONSE_CHARS {
        let truncated: String = response.chars().take(MAX_ERROR_RESPONSE_CHARS).collect();
        format!("{truncated}...(truncated)")
    } else {
        response.to_string()
    }
}

/// Extracts JSON from an LLM response, handling markdown code fences and
/// stray prose around the payload.
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some((json_start, end)) = trimmed.find("```json").and_then(|start| {
        let json_start = start + 7;
        trimmed[json_start..].find("```").map(|end| (json_start, end))
    }) {
        return trimmed[json_start..json_start + end].trim();
    }

    if let Some((json_start, end)) = trimmed.find("```").and_then(|start| {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker.find('{').map_or(content_start, |pos| content_start + pos);
        trimmed[json_start..].find("```").map(|end| (json_start, end))
    }) {
        return trimmed[json_start..json_start + end].trim();
    }

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if trimmed[..start].trim().is_empty() || trimmed.starts_with('[') {
            return &trimmed[start..=end];
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        return &trimmed[start..=end];
    }

    trimmed
}

/// Parses a facts-extraction response. Tolerates both a bare JSON array and
/// a `{"facts": [...]}` wrapper; any parse failure yields an empty list
/// rather than an error, per the extraction step's tolerant-parse contract.
#[must_use]
pub fn parse_facts_response(response: &str) -> Vec<ExtractedFact> {
    let json_str = extract_json_from_response(response);
    if let Ok(wrapped) = serde_json::from_str::<FactsResponse>(json_str) {
        return wrapped.facts;
    }
    serde_json::from_str::<Vec<ExtractedFact>>(json_str).unwrap_or_default()
}

/// Validates and lowercases a raw classification answer against
/// [`CATEGORIES`], returning `None` for anything else.
#[must_use]
pub fn parse_category_response(response: &str) -> Option<String> {
    let candidate = response.trim().trim_matches('"').to_ascii_lowercase();
    CATEGORIES.iter().find(|c| **c == candidate).map(|c| (*c).to_string())
}

/// Parses a YES/NO conflict-check answer.
#[must_use]
pub fn parse_conflict_response(response: &str) -> bool {
    response.trim().trim_matches('"').eq_ignore_ascii_case("yes")
}

fn extraction_prompt(text: &str) -> String {
    format!(
        "Extract atomic facts from the following text.\n\n\
         For each fact, identify:\n\
         - subject: The entity the fact is about\n\
         - predicate: The relationship or property\n\
         - object: The value or related entity\n\
         - category: One of [preferences, facts, events, relationships, skills, goals]\n\
         - confidence: 0.0-1.0 based on certainty\n\n\
         Return JSON array of facts. Only extract clear, verifiable facts.\n\
         If no facts can be extracted, return empty array.\n\n\
         Text:\n\
         {text}\n\n\
         Return only valid JSON:"
    )
}

fn classification_prompt(subject: &str, predicate: &str, object: &str) -> String {
    format!(
        "Classify the following fact into one of these categories:\n\n\
         Categories:\n\
         {categories}\n\n\
         Fact:\n\
         - Subject: {subject}\n\
         - Predicate: {predicate}\n\
         - Object: {object}\n\n\
         Return only the category name, nothing else.",
        categories = CATEGORIES.join(", ")
    )
}

fn conflict_prompt(s1: &str, p1: &str, o1: &str, s2: &str, p2: &str, o2: &str) -> String {
    format!(
        "Do these two facts conflict with each other?\n\n\
         Fact 1:\n\
         - Subject: {s1}\n\
         - Predicate: {p1}\n\
         - Object: {o1}\n\n\
         Fact 2:\n\
         - Subject: {s2}\n\
         - Predicate: {p2}\n\
         - Object: {o2}\n\n\
         Answer only YES or NO."
    )
}

fn summary_prompt(category: &str, facts: &[String]) -> String {
    format!(
        "Summarize the following facts about a user into a concise paragraph.\n\
         Focus on the most important and recent information.\n\
         Write in third person.\n\n\
         Category: {category}\n\n\
         Facts:\n\
         {facts}\n\n\
         Summary (2-4 sentences):",
        facts = facts.join("\n")
    )
}

fn missing_key_error(provider: &str) -> Error {
    Error::ExternalProviderUnavailable(format!("{provider}: no API key configured"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_from_response_handles_markdown_fence() {
        let raw = "```json\n{\"facts\": []}\n```";
        assert_eq!(extract_json_from_response(raw), "{\"facts\": []}");
    }

    #[test]
    fn extract_json_from_response_handles_raw_object() {
        let raw = "Sure, here you go: {\"facts\": []} thanks";
        assert_eq!(extract_json_from_response(raw), "{\"facts\": []}");
    }

    #[test]
    fn parse_facts_response_tolerates_malformed_input() {
        assert!(parse_facts_response("not json at all").is_empty());
    }

    #[test]
    fn parse_facts_response_accepts_wrapped_and_bare_arrays() {
        let wrapped = r#"{"facts":[{"subject":"user","predicate":"prefers","object":"dark_mode","category":"preferences","confidence":0.9}]}"#;
        assert_eq!(parse_facts_response(wrapped).len(), 1);
        let bare = r#"[{"subject":"user","predicate":"prefers","object":"dark_mode"}]"#;
        let facts = parse_facts_response(bare);
        assert_eq!(facts.len(), 1);
        assert!((facts[0].confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn parse_category_response_validates_against_fixed_list() {
        assert_eq!(parse_category_response("Preferences"), Some("preferences".to_string()));
        assert_eq!(parse_category_response("not-a-category"), None);
    }

    #[test]
    fn parse_conflict_response_reads_yes_no() {
        assert!(parse_conflict_response("YES"));
        assert!(!parse_conflict_response("no"));
        assert!(!parse_conflict_response("maybe"));
    }

    #[test]
    fn sanitize_truncates_long_responses() {
        let long = "x".repeat(500);
        let sanitized = sanitize_llm_response_for_error(&long);
        assert!(sanitized.len() < long.len());
        assert!(sanitized.ends_with("...(truncated)"));
    }

    #[test]
    fn prompts_match_fixed_text_exactly() {
        let p = extraction_prompt("hello");
        assert!(p.starts_with("Extract atomic facts from the following text."));
        assert!(p.ends_with("Return only valid JSON:"));
        let c = classification_prompt("user", "prefers", "dark_mode");
        assert!(c.contains("preferences, facts, events, relationships, skills, goals"));
        let k = conflict_prompt("user", "prefers", "a", "user", "prefers", "b");
        assert!(k.ends_with("Answer only YES or NO."));
    }
}
