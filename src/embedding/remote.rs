//! Remote embedding provider: an OpenAI-compatible `/embeddings` HTTP call.

use super::Embedder;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Calls an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbedder {
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    dimensions: usize,
    client: reqwest::blocking::Client,
}

impl RemoteEmbedder {
    /// Builds a remote embedder from resolved [`crate::config::EmbeddingSettings`].
    #[must_use]
    pub fn from_settings(settings: &crate::config::EmbeddingSettings) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            api_key: settings.api_key.clone(),
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            dimensions: settings.native_dimensions,
            client,
        }
    }
}

impl Embedder for RemoteEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::ExternalProviderUnavailable("embedding provider: no API key configured".to_string()))?;

        let request = EmbeddingRequest { model: self.model.clone(), input: text.to_string() };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key.expose_secret()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .map_err(|err| {
                tracing::warn!(provider = "embedding-remote", error = %err, "embedding request failed");
                Error::ExternalProviderUnavailable(format!("embedding request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::ExternalProviderUnavailable(format!(
                "embedding endpoint returned {status}: {}",
                crate::llm::sanitize_llm_response_for_error(&body)
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|err| Error::ExternalProviderUnavailable(format!("failed to parse embedding response: {err}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| Error::ExternalProviderUnavailable("embedding response had no data".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_without_api_key_errors() {
        let settings = crate::config::EmbeddingSettings {
            provider: crate::config::EmbeddingProviderKind::Remote,
            model: "text-embedding-3-small".to_string(),
            native_dimensions: 1536,
            storage_dimensions: 1536,
            endpoint: "https://example.invalid/v1/embeddings".to_string(),
            api_key: None,
            timeout_secs: 1,
        };
        let embedder = RemoteEmbedder::from_settings(&settings);
        assert!(embedder.embed("hello").is_err());
    }

    #[test]
    fn dimensions_reflect_configured_native_dimensions() {
        let settings = crate::config::EmbeddingSettings {
            provider: crate::config::EmbeddingProviderKind::Remote,
            model: "text-embedding-3-small".to_string(),
            native_dimensions: 1536,
            storage_dimensions: 768,
            endpoint: "https://example.invalid/v1/embeddings".to_string(),
            api_key: None,
            timeout_secs: 1,
        };
        let embedder = RemoteEmbedder::from_settings(&settings);
        assert_eq!(embedder.dimensions(), 1536);
    }
}
