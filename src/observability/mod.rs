//! Observability: structured logging and per-operation latency metrics.

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, LoggingConfig};
pub use metrics::{install_prometheus, MetricsRegistry, OperationStats};

use crate::config::Settings;
use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Initializes the global `tracing` subscriber from [`Settings`].
///
/// Safe to call at most once per process.
///
/// # Errors
///
/// Returns an error if observability has already been initialized, or if
/// the underlying subscriber fails to install.
pub fn init(settings: &Settings) -> Result<()> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(Error::BackendError {
            operation: "observability_init".to_string(),
            cause: "observability already initialized".to_string(),
        });
    }

    let config = LoggingConfig::from_settings(settings);
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.format == LogFormat::Json {
        registry.with(tracing_subscriber::fmt::layer().json().with_target(true).with_current_span(true)).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|err| Error::BackendError { operation: "observability_init".to_string(), cause: err.to_string() })?;

    let _ = OBSERVABILITY_INIT.set(());
    Ok(())
}
