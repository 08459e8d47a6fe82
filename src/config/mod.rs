//! Configuration management: a single [`Settings`] struct constructed once
//! at process startup from the environment.

use crate::{Error, Result};
use secrecy::SecretString;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Expands `${VAR_NAME}` references in a string against the process
/// environment. A missing variable leaves the placeholder untouched rather
/// than panicking or erroring.
///
/// Uses `Cow<str>` to avoid allocation when no expansion is needed.
#[must_use]
pub fn expand_env_vars(input: &str) -> Cow<'_, str> {
    if !input.contains("${") {
        return Cow::Borrowed(input);
    }

    let mut result = input.to_string();
    let mut start = 0;

    while let Some(var_start) = result[start..].find("${") {
        let var_start = start + var_start;
        if let Some(var_end) = result[var_start..].find('}') {
            let var_end = var_start + var_end;
            let var_name = &result[var_start + 2..var_end];
            if let Ok(value) = std::env::var(var_name) {
                result.replace_range(var_start..=var_end, &value);
                start = var_start + value.len();
            } else {
                start = var_end + 1;
            }
        } else {
            break;
        }
    }

    Cow::Owned(result)
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    /// SQLite-backed relational storage.
    Relational,
    /// In-process, file-backed document/graph storage (feature-gated).
    Embedded,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "relational" => Ok(Self::Relational),
            "embedded" => Ok(Self::Embedded),
            other => Err(Error::ValidationError(format!(
                "unknown storage backend '{other}', expected 'relational' or 'embedded'"
            ))),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Which backend to construct.
    pub backend: StorageBackendKind,
    /// Relational backend connection string (a `sqlite://` path or `:memory:`).
    pub connection_string: String,
    /// Embedded backend data directory, created on startup if missing.
    pub data_dir: PathBuf,
}

/// Embedding provider selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProviderKind {
    /// Remote OpenAI-compatible HTTP endpoint.
    Remote,
    /// Local, deterministic, hash-based embedding (no network required).
    Local,
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            other => Err(Error::ValidationError(format!(
                "unknown embedding provider '{other}', expected 'remote' or 'local'"
            ))),
        }
    }
}

/// Embedding settings.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    /// Which provider to construct.
    pub provider: EmbeddingProviderKind,
    /// Model name passed to the provider.
    pub model: String,
    /// Native dimensionality the provider produces.
    pub native_dimensions: usize,
    /// Dimensionality stored in the index; vectors are adapted to this size.
    pub storage_dimensions: usize,
    /// Endpoint for the remote provider.
    pub endpoint: String,
    /// API key for the remote provider, if any.
    pub api_key: Option<SecretString>,
    /// Per-call timeout.
    pub timeout_secs: u64,
}

/// LLM provider settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Endpoint for the OpenAI-compatible chat completions API.
    pub endpoint: String,
    /// Model name.
    pub model: String,
    /// API key, if any.
    pub api_key: Option<SecretString>,
    /// Per-call timeout.
    pub timeout_secs: u64,
    /// Whether to use the LLM for classification/conflict checks at all;
    /// when `false`, the rule-based fallbacks are used exclusively.
    pub use_llm: bool,
}

/// Conflict-resolution strategy (§4.4 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    /// The newer item wins.
    Recency,
    /// The higher-confidence item wins; ties favor the newer item.
    Confidence,
}

impl std::str::FromStr for ConflictStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "recency" => Ok(Self::Recency),
            "confidence" => Ok(Self::Confidence),
            other => Err(Error::ValidationError(format!(
                "unknown conflict strategy '{other}', expected 'recency' or 'confidence'"
            ))),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Bind address, e.g. `127.0.0.1`.
    pub bind_address: String,
    /// Bind port.
    pub port: u16,
}

/// Pipeline limits shared across maintenance jobs and batch endpoints.
#[derive(Debug, Clone, Copy)]
pub struct PipelineLimits {
    /// Hard cap on items processed per pipeline invocation.
    pub max_items_per_run: usize,
    /// Category-access retention window used by weekly cleanup.
    pub category_access_retention_days: i64,
}

/// Top-level settings, constructed once at process startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Storage settings.
    pub storage: StorageSettings,
    /// Embedding settings.
    pub embedding: EmbeddingSettings,
    /// LLM settings.
    pub llm: LlmSettings,
    /// Conflict-resolution strategy.
    pub conflict_strategy: ConflictStrategy,
    /// Whether debug-level logging is enabled.
    pub debug: bool,
    /// `tracing` log level filter, e.g. `info`, `debug`.
    pub log_level: String,
    /// Whether to emit JSON-formatted logs.
    pub log_json: bool,
    /// HTTP server settings.
    pub http: HttpSettings,
    /// Pipeline limits.
    pub limits: PipelineLimits,
    /// Which fields were set from the environment, for `config show`/`status`.
    pub sources: BTreeMap<String, &'static str>,
}

const ENV_STORAGE_BACKEND: &str = "MNEMOGRAPH_STORAGE_BACKEND";
const ENV_STORAGE_CONNECTION: &str = "MNEMOGRAPH_STORAGE_CONNECTION";
const ENV_STORAGE_DATA_DIR: &str = "MNEMOGRAPH_DATA_DIR";
const ENV_EMBEDDING_PROVIDER: &str = "MNEMOGRAPH_EMBEDDING_PROVIDER";
const ENV_EMBEDDING_MODEL: &str = "MNEMOGRAPH_EMBEDDING_MODEL";
const ENV_EMBEDDING_NATIVE_DIMS: &str = "MNEMOGRAPH_EMBEDDING_NATIVE_DIMS";
const ENV_EMBEDDING_STORAGE_DIMS: &str = "MNEMOGRAPH_EMBEDDING_STORAGE_DIMS";
const ENV_EMBEDDING_ENDPOINT: &str = "MNEMOGRAPH_EMBEDDING_ENDPOINT";
const ENV_EMBEDDING_API_KEY: &str = "MNEMOGRAPH_EMBEDDING_API_KEY";
const ENV_LLM_ENDPOINT: &str = "MNEMOGRAPH_LLM_ENDPOINT";
const ENV_LLM_MODEL: &str = "MNEMOGRAPH_LLM_MODEL";
const ENV_LLM_API_KEY: &str = "MNEMOGRAPH_LLM_API_KEY";
const ENV_LLM_USE: &str = "MNEMOGRAPH_USE_LLM";
const ENV_CONFLICT_STRATEGY: &str = "MNEMOGRAPH_CONFLICT_STRATEGY";
const ENV_DEBUG: &str = "MNEMOGRAPH_DEBUG";
const ENV_LOG_LEVEL: &str = "MNEMOGRAPH_LOG_LEVEL";
const ENV_LOG_JSON: &str = "MNEMOGRAPH_LOG_JSON";
const ENV_HTTP_BIND: &str = "MNEMOGRAPH_HTTP_BIND";
const ENV_HTTP_PORT: &str = "MNEMOGRAPH_HTTP_PORT";
const ENV_MAX_ITEMS_PER_RUN: &str = "MNEMOGRAPH_MAX_ITEMS_PER_RUN";
const ENV_ACCESS_RETENTION_DAYS: &str = "MNEMOGRAPH_ACCESS_RETENTION_DAYS";

impl Settings {
    /// Builds settings from the process environment, applying `${VAR}`
    /// expansion to string fields and validating the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if any field fails validation
    /// (unknown enum selector, out-of-range numeric value).
    pub fn from_env() -> Result<Self> {
        let mut sources = BTreeMap::new();
        let mut note = |key: &str, env_name: &'static str| {
            if std::env::var(env_name).is_ok() {
                sources.insert(key.to_string(), env_name);
            }
        };

        note("storage.backend", ENV_STORAGE_BACKEND);
        note("storage.connection_string", ENV_STORAGE_CONNECTION);
        note("storage.data_dir", ENV_STORAGE_DATA_DIR);
        note("embedding.provider", ENV_EMBEDDING_PROVIDER);
        note("embedding.model", ENV_EMBEDDING_MODEL);
        note("embedding.native_dimensions", ENV_EMBEDDING_NATIVE_DIMS);
        note("embedding.storage_dimensions", ENV_EMBEDDING_STORAGE_DIMS);
        note("embedding.endpoint", ENV_EMBEDDING_ENDPOINT);
        note("embedding.api_key", ENV_EMBEDDING_API_KEY);
        note("llm.endpoint", ENV_LLM_ENDPOINT);
        note("llm.model", ENV_LLM_MODEL);
        note("llm.api_key", ENV_LLM_API_KEY);
        note("llm.use_llm", ENV_LLM_USE);
        note("conflict_strategy", ENV_CONFLICT_STRATEGY);
        note("debug", ENV_DEBUG);
        note("log_level", ENV_LOG_LEVEL);
        note("log_json", ENV_LOG_JSON);
        note("http.bind_address", ENV_HTTP_BIND);
        note("http.port", ENV_HTTP_PORT);
        note("limits.max_items_per_run", ENV_MAX_ITEMS_PER_RUN);
        note("limits.category_access_retention_days", ENV_ACCESS_RETENTION_DAYS);

        let backend_str = env_or("relational", ENV_STORAGE_BACKEND);
        let backend: StorageBackendKind = expand_env_vars(&backend_str).parse()?;

        let connection_string = expand_env_vars(&env_or("sqlite://mnemograph.db", ENV_STORAGE_CONNECTION)).into_owned();
        let data_dir = PathBuf::from(expand_env_vars(&env_or_data_dir()).into_owned());

        let embedding_provider: EmbeddingProviderKind =
            expand_env_vars(&env_or("local", ENV_EMBEDDING_PROVIDER)).parse()?;
        let embedding_model = expand_env_vars(&env_or("text-embedding-3-small", ENV_EMBEDDING_MODEL)).into_owned();
        let native_dimensions = parse_usize(&env_or("1536", ENV_EMBEDDING_NATIVE_DIMS), "embedding.native_dimensions")?;
        let storage_dimensions = parse_usize(&env_or("1536", ENV_EMBEDDING_STORAGE_DIMS), "embedding.storage_dimensions")?;
        let embedding_endpoint =
            expand_env_vars(&env_or("https://api.openai.com/v1/embeddings", ENV_EMBEDDING_ENDPOINT)).into_owned();
        let embedding_api_key = std::env::var(ENV_EMBEDDING_API_KEY).ok().map(SecretString::from);

        let llm_endpoint =
            expand_env_vars(&env_or("https://api.openai.com/v1/chat/completions", ENV_LLM_ENDPOINT)).into_owned();
        let llm_model = expand_env_vars(&env_or("gpt-4o-mini", ENV_LLM_MODEL)).into_owned();
        let llm_api_key = std::env::var(ENV_LLM_API_KEY).ok().map(SecretString::from);
        let use_llm = parse_bool(&env_or("false", ENV_LLM_USE));

        let conflict_strategy: ConflictStrategy = expand_env_vars(&env_or("recency", ENV_CONFLICT_STRATEGY)).parse()?;

        let debug = parse_bool(&env_or("false", ENV_DEBUG));
        let log_level = expand_env_vars(&env_or("info", ENV_LOG_LEVEL)).into_owned();
        let log_json = parse_bool(&env_or("false", ENV_LOG_JSON));

        let bind_address = expand_env_vars(&env_or("127.0.0.1", ENV_HTTP_BIND)).into_owned();
        let port = parse_u16(&env_or("8077", ENV_HTTP_PORT), "http.port")?;

        let max_items_per_run = parse_usize(&env_or("10000", ENV_MAX_ITEMS_PER_RUN), "limits.max_items_per_run")?;
        let category_access_retention_days =
            parse_i64(&env_or("90", ENV_ACCESS_RETENTION_DAYS), "limits.category_access_retention_days")?;

        let settings = Self {
            storage: StorageSettings { backend, connection_string, data_dir },
            embedding: EmbeddingSettings {
                provider: embedding_provider,
                model: embedding_model,
                native_dimensions,
                storage_dimensions,
                endpoint: embedding_endpoint,
                api_key: embedding_api_key,
                timeout_secs: 30,
            },
            llm: LlmSettings {
                endpoint: llm_endpoint,
                model: llm_model,
                api_key: llm_api_key,
                timeout_secs: 60,
                use_llm,
            },
            conflict_strategy,
            debug,
            log_level,
            log_json,
            http: HttpSettings { bind_address, port },
            limits: PipelineLimits { max_items_per_run, category_access_retention_days },
            sources,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validates invariants that parsing alone cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] describing the first violated
    /// constraint.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.native_dimensions == 0 {
            return Err(Error::ValidationError("embedding.native_dimensions must be > 0".to_string()));
        }
        if self.embedding.storage_dimensions == 0 {
            return Err(Error::ValidationError("embedding.storage_dimensions must be > 0".to_string()));
        }
        if self.limits.max_items_per_run == 0 {
            return Err(Error::ValidationError("limits.max_items_per_run must be > 0".to_string()));
        }
        if self.http.port == 0 {
            return Err(Error::ValidationError("http.port must be > 0".to_string()));
        }
        Ok(())
    }

    /// Whether this field's value came from the environment rather than a
    /// built-in default.
    #[must_use]
    pub fn source_of(&self, field: &str) -> &'static str {
        self.sources.get(field).copied().unwrap_or("default")
    }
}

fn env_or(default: &str, name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_or_data_dir() -> String {
    if let Ok(v) = std::env::var(ENV_STORAGE_DATA_DIR) {
        return v;
    }
    directories::ProjectDirs::from("", "", "mnemograph")
        .map(|dirs| dirs.data_dir().to_string_lossy().into_owned())
        .unwrap_or_else(|| "./data".to_string())
}

fn parse_usize(s: &str, field: &str) -> Result<usize> {
    s.parse().map_err(|_| Error::ValidationError(format!("{field} must be a positive integer, got '{s}'")))
}

fn parse_i64(s: &str, field: &str) -> Result<i64> {
    s.parse().map_err(|_| Error::ValidationError(format!("{field} must be an integer, got '{s}'")))
}

fn parse_u16(s: &str, field: &str) -> Result<u16> {
    s.parse().map_err(|_| Error::ValidationError(format!("{field} must be a 16-bit port number, got '{s}'")))
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_env_vars_no_pattern_is_borrowed() {
        let result = expand_env_vars("no vars here");
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn expand_env_vars_missing_var_untouched() {
        let result = expand_env_vars("${MNEMOGRAPH_TOTALLY_UNDEFINED_VAR}");
        assert_eq!(result, "${MNEMOGRAPH_TOTALLY_UNDEFINED_VAR}");
    }

    #[test]
    fn expand_env_vars_present_var_substituted() {
        std::env::set_var("MNEMOGRAPH_TEST_VAR_XYZ", "hello");
        let result = expand_env_vars("prefix-${MNEMOGRAPH_TEST_VAR_XYZ}-suffix");
        assert_eq!(result, "prefix-hello-suffix");
        std::env::remove_var("MNEMOGRAPH_TEST_VAR_XYZ");
    }

    #[test]
    fn storage_backend_parses_known_variants() {
        assert_eq!("relational".parse::<StorageBackendKind>().unwrap(), StorageBackendKind::Relational);
        assert_eq!("embedded".parse::<StorageBackendKind>().unwrap(), StorageBackendKind::Embedded);
        assert!("postgres".parse::<StorageBackendKind>().is_err());
    }

    #[test]
    fn conflict_strategy_parses_known_variants() {
        assert_eq!("recency".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Recency);
        assert_eq!("confidence".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Confidence);
        assert!("oldest".parse::<ConflictStrategy>().is_err());
    }

    #[test]
    fn settings_from_env_defaults_are_valid() {
        let settings = Settings::from_env().expect("defaults must validate");
        assert_eq!(settings.storage.backend, StorageBackendKind::Relational);
        assert_eq!(settings.conflict_strategy, ConflictStrategy::Recency);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn settings_rejects_zero_dimensions() {
        std::env::set_var(ENV_EMBEDDING_NATIVE_DIMS, "0");
        let result = Settings::from_env();
        std::env::remove_var(ENV_EMBEDDING_NATIVE_DIMS);
        assert!(result.is_err());
    }
}
