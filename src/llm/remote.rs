//! `OpenAI`-compatible chat-completions client implementing [`LlmProvider`].

use super::{
    LlmProvider, build_http_client, classification_prompt, conflict_prompt, extraction_prompt,
    missing_key_error, parse_category_response, parse_conflict_response, parse_facts_response,
    sanitize_llm_response_for_error, summary_prompt,
};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// A chat-completions client talking to any `OpenAI`-compatible endpoint.
pub struct OpenAiCompatibleClient {
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OpenAiCompatibleClient {
    /// Builds a client from resolved [`crate::config::LlmSettings`].
    #[must_use]
    pub fn from_settings(settings: &crate::config::LlmSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            client: build_http_client(super::LlmHttpConfig::from_settings(settings)),
        }
    }

    fn complete(&self, system_prompt: &str, user_prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let api_key = self.api_key.as_ref().ok_or_else(|| missing_key_error("openai"))?;

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: user_prompt.to_string() },
            ],
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key.expose_secret()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .map_err(|err| {
                tracing::warn!(provider = "openai", error = %err, "LLM request failed");
                Error::ExternalProviderUnavailable(format!("openai request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::ExternalProviderUnavailable(format!(
                "openai returned {status}: {}",
                sanitize_llm_response_for_error(&body)
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|err| Error::ExternalProviderUnavailable(format!("failed to parse openai response: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::ExternalProviderUnavailable("openai response had no choices".to_string()))
    }
}

const EXTRACTION_SYSTEM_PROMPT: &str = "You extract structured facts from text. Return only valid JSON.";
const GENERIC_SYSTEM_PROMPT: &str = "You are a precise fact-classification assistant. Follow instructions exactly.";

impl LlmProvider for OpenAiCompatibleClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn extract_facts(&self, text: &str) -> Result<Vec<super::ExtractedFact>> {
        let response = self.complete(EXTRACTION_SYSTEM_PROMPT, &extraction_prompt(text), 0.1, 1024)?;
        Ok(parse_facts_response(&response))
    }

    fn classify(&self, subject: &str, predicate: &str, object: &str) -> Result<Option<String>> {
        let response = self.complete(GENERIC_SYSTEM_PROMPT, &classification_prompt(subject, predicate, object), 0.0, 20)?;
        Ok(parse_category_response(&response))
    }

    fn check_conflict(
        &self,
        subject1: &str,
        predicate1: &str,
        object1: &str,
        subject2: &str,
        predicate2: &str,
        object2: &str,
    ) -> Result<bool> {
        let response = self.complete(
            GENERIC_SYSTEM_PROMPT,
            &conflict_prompt(subject1, predicate1, object1, subject2, predicate2, object2),
            0.0,
            5,
        )?;
        Ok(parse_conflict_response(&response))
    }

    fn summarize_category(&self, category: &str, facts: &[String]) -> Result<String> {
        let response = self.complete(GENERIC_SYSTEM_PROMPT, &summary_prompt(category, facts), 0.3, 200)?;
        Ok(response.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: Option<&str>) -> crate::config::LlmSettings {
        crate::config::LlmSettings {
            endpoint: "https://example.invalid/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: api_key.map(|k| SecretString::from(k.to_string())),
            timeout_secs: 1,
            use_llm: true,
        }
    }

    #[test]
    fn client_without_api_key_errors_on_any_operation() {
        let client = OpenAiCompatibleClient::from_settings(&settings(None));
        assert!(client.extract_facts("hello").is_err());
        assert!(client.classify("user", "prefers", "dark_mode").is_err());
        assert!(client.check_conflict("user", "prefers", "a", "user", "prefers", "b").is_err());
        assert!(client.summarize_category("preferences", &["user prefers dark mode".to_string()]).is_err());
    }

    #[test]
    fn name_is_openai() {
        let client = OpenAiCompatibleClient::from_settings(&settings(Some("sk-test")));
        assert_eq!(client.name(), "openai");
    }
}
