//! Deterministic, hash-based local embedder.
//!
//! Used when no remote embedding provider is configured. Unlike a pure
//! stub, this produces an actual unit vector from a SHA-256 hash of the
//! input text, so semantic search degrades to "bag of hashed n-grams"
//! rather than being unavailable outright.

use super::Embedder;
use crate::Result;
use sha2::{Digest, Sha256};

/// A local embedder that hashes whitespace-separated tokens into a
/// fixed-dimensional vector.
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    /// Creates a local embedder producing vectors of `dimensions` length.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Embedder for LocalEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions.max(1)];
        if self.dimensions == 0 {
            return Ok(Vec::new());
        }

        for token in text.split_whitespace() {
            let mut hasher = Sha256::new();
            hasher.update(token.as_bytes());
            let digest = hasher.finalize();

            // Fold the 32-byte digest into four-byte chunks, each voting
            // (with sign) for one bucket of the vector.
            for chunk in digest.chunks_exact(4) {
                let bytes: [u8; 4] = chunk.try_into().unwrap_or([0; 4]);
                let raw = u32::from_le_bytes(bytes);
                let bucket = (raw as usize) % self.dimensions;
                let sign = if raw & 1 == 0 { 1.0 } else { -1.0 };
                vector[bucket] += sign;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_returns_requested_dimensions() {
        let embedder = LocalEmbedder::new(32);
        let vector = embedder.embed("user prefers dark mode").expect("embed");
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn embed_is_deterministic() {
        let embedder = LocalEmbedder::new(16);
        let a = embedder.embed("hello world").expect("embed");
        let b = embedder.embed("hello world").expect("embed");
        assert_eq!(a, b);
    }

    #[test]
    fn embed_differs_for_different_text() {
        let embedder = LocalEmbedder::new(16);
        let a = embedder.embed("hello world").expect("embed");
        let b = embedder.embed("goodbye moon").expect("embed");
        assert_ne!(a, b);
    }

    #[test]
    fn embed_produces_unit_vector_when_nonempty() {
        let embedder = LocalEmbedder::new(16);
        let vector = embedder.embed("user prefers dark mode").expect("embed");
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn zero_dimension_embedder_returns_empty_vector() {
        let embedder = LocalEmbedder::new(0);
        let vector = embedder.embed("anything").expect("embed");
        assert!(vector.is_empty());
    }
}
