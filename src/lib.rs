//! # mnemograph
//!
//! A tiered-retrieval memory service for AI agents.
//!
//! mnemograph ingests raw conversational text, distills it into atomic
//! subject-predicate-object facts, organizes those facts by category, links
//! them in a knowledge graph, and serves intent-aware retrieval queries that
//! feed context back into downstream agents.
//!
//! ## Features
//!
//! - Tiered retrieval: entity lookup, temporal filtering, aspect filtering,
//!   and semantic vector search behind one intent classifier.
//! - A knowledge graph of canonical subject-predicate-object edges with
//!   bounded-depth path search.
//! - Conflict detection and supersession between facts that disagree.
//! - Three maintenance pipelines (nightly, weekly, monthly) that decay,
//!   propagate, compress, and re-index memory over time.
//! - Pluggable storage (SQLite or an embedded document/graph store) and
//!   embedding providers (remote HTTP or local deterministic fallback).

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod api;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod entity;
pub mod graph;
pub mod intent_classifier;
pub mod jobs;
pub mod llm;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod priority;
pub mod storage;

pub use config::Settings;
pub use embedding::Embedder;
pub use llm::LlmProvider;
pub use models::{
    Category, CategoryAccess, GraphEdge, Intent, Item, ItemStatus, Resource,
};
pub use storage::{UnitOfWork, UnitOfWorkFactory};

/// Error type for mnemograph operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `NotFound` | A GET/lookup by id finds no matching row |
/// | `ValidationError` | Malformed payload: range violations, empty required strings |
/// | `BackendError` | A storage call fails (SQLite error, I/O error, lock poisoned) |
/// | `ExternalProviderUnavailable` | LLM or embedding provider call failed |
/// | `MalformedLlmOutput` | Extractor/classifier output could not be parsed |
/// | `TransactionAbort` | A Unit-of-Work scope exited abnormally and rolled back |
/// | `Config` | Startup configuration failed validation |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Input failed validation (range or required-field checks).
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// A storage backend operation failed.
    #[error("backend error in '{operation}': {cause}")]
    BackendError {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// An external LLM or embedding provider is unavailable.
    ///
    /// Callers are expected to degrade gracefully rather than propagate this
    /// to the end user wherever §7 names a fallback.
    #[error("external provider unavailable: {0}")]
    ExternalProviderUnavailable(String),

    /// LLM output could not be parsed into the expected shape.
    #[error("malformed LLM output: {0}")]
    MalformedLlmOutput(String),

    /// A Unit-of-Work transaction was aborted and rolled back.
    #[error("transaction aborted: {0}")]
    TransactionAbort(String),

    /// Startup configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for mnemograph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every module shares one implementation and one fallback
/// behavior for a clock set before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("item abc".to_string());
        assert_eq!(err.to_string(), "not found: item abc");

        let err = Error::BackendError {
            operation: "insert".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "backend error in 'insert': disk full");

        let err = Error::ValidationError("confidence out of range".to_string());
        assert_eq!(err.to_string(), "validation failed: confidence out of range");
    }

    #[test]
    fn test_current_timestamp_reasonable() {
        let ts = current_timestamp();
        assert!(ts > 1_700_000_000);
    }
}
