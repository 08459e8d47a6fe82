//! Embedding generation: a remote (OpenAI-compatible HTTP) provider and a
//! deterministic local fallback, plus the item-to-text and
//! dimension-adaptation helpers shared by both.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

pub mod local;
pub mod remote;

pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

use crate::{Error, Result};

/// Trait for embedding generators.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions this provider natively produces.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Builds the embeddable text for an item: `Subject: … | Predicate: … |
/// Object: … | Category: …`, omitting any part whose field is absent.
#[must_use]
pub fn build_text_for_item(
    subject: Option<&str>,
    predicate: Option<&str>,
    object: Option<&str>,
    category: Option<&str>,
) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(subject) = subject {
        parts.push(format!("Subject: {subject}"));
    }
    if let Some(predicate) = predicate {
        parts.push(format!("Predicate: {predicate}"));
    }
    if let Some(object) = object {
        parts.push(format!("Object: {object}"));
    }
    if let Some(category) = category {
        parts.push(format!("Category: {category}"));
    }
    parts.join(" | ")
}

/// Adapts a vector to a target dimensionality: truncates if longer, zero-pads
/// if shorter, returns unchanged if equal.
#[must_use]
pub fn adapt_vector(vector: Vec<f32>, target_dim: usize) -> Vec<f32> {
    match vector.len().cmp(&target_dim) {
        std::cmp::Ordering::Greater => {
            let mut truncated = vector;
            truncated.truncate(target_dim);
            truncated
        },
        std::cmp::Ordering::Less => {
            let mut padded = vector;
            padded.resize(target_dim, 0.0);
            padded
        },
        std::cmp::Ordering::Equal => vector,
    }
}

/// Builds the configured embedding provider from resolved settings.
///
/// # Errors
///
/// Returns an error if the configured provider kind cannot be constructed.
pub fn build_embedder(settings: &crate::config::EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    match settings.provider {
        crate::config::EmbeddingProviderKind::Remote => Ok(Box::new(RemoteEmbedder::from_settings(settings))),
        crate::config::EmbeddingProviderKind::Local => Ok(Box::new(LocalEmbedder::new(settings.native_dimensions))),
    }
}

/// Generates an embedding for an item's text and adapts it to the
/// configured storage dimensionality.
///
/// # Errors
///
/// Returns an error if the underlying provider call fails or the text is
/// empty.
pub fn generate_embedding(embedder: &dyn Embedder, text: &str, storage_dimensions: usize) -> Result<Vec<f32>> {
    if text.trim().is_empty() {
        return Err(Error::ValidationError("cannot embed empty text".to_string()));
    }
    let raw = embedder.embed(text)?;
    Ok(adapt_vector(raw, storage_dimensions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_text_for_item_omits_absent_parts() {
        let text = build_text_for_item(Some("user"), Some("prefers"), None, Some("preferences"));
        assert_eq!(text, "Subject: user | Predicate: prefers | Category: preferences");
    }

    #[test]
    fn build_text_for_item_handles_meta_facts_with_no_subject() {
        let text = build_text_for_item(None, Some("has_source"), Some("gpt-4o-mini"), Some("meta"));
        assert_eq!(text, "Predicate: has_source | Object: gpt-4o-mini | Category: meta");
    }

    #[test]
    fn adapt_vector_truncates_and_pads() {
        assert_eq!(adapt_vector(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
        assert_eq!(adapt_vector(vec![1.0], 3), vec![1.0, 0.0, 0.0]);
        assert_eq!(adapt_vector(vec![1.0, 2.0], 2), vec![1.0, 2.0]);
    }

    #[test]
    fn generate_embedding_rejects_empty_text() {
        let embedder = LocalEmbedder::new(8);
        let result = generate_embedding(&embedder, "   ", 8);
        assert!(result.is_err());
    }

    #[test]
    fn generate_embedding_adapts_to_storage_dimensions() {
        let embedder = LocalEmbedder::new(16);
        let vector = generate_embedding(&embedder, "user prefers dark mode", 4).expect("embedding");
        assert_eq!(vector.len(), 4);
    }
}
