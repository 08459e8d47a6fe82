//! HTTP API surface (§6): an `axum` router over the same
//! `pipeline`/`jobs`/`storage` functions the CLI uses. Storage, LLM, and
//! embedding calls are synchronous, so every handler that touches them
//! runs on a blocking task per §5's concurrency model.

mod admin;
mod error;
mod graph;
mod read;
mod write;

pub use error::ApiError;

use crate::config::Settings;
use crate::embedding::{build_embedder, Embedder};
use crate::llm::{LlmProvider, OpenAiCompatibleClient};
use crate::observability::{install_prometheus, MetricsRegistry};
use crate::storage::{build_factory, UnitOfWorkFactory};
use crate::Result;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) factory: Arc<dyn UnitOfWorkFactory>,
    pub(crate) llm: Arc<dyn LlmProvider>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) settings: Arc<Settings>,
    pub(crate) metrics: Arc<MetricsRegistry>,
    pub(crate) prometheus: PrometheusHandle,
}

impl AppState {
    /// Builds every dependency the API needs from resolved settings and
    /// installs the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if storage, the embedder, or the Prometheus
    /// recorder cannot be constructed.
    pub fn build(settings: Settings) -> Result<Self> {
        let factory: Arc<dyn UnitOfWorkFactory> = Arc::from(build_factory(&settings)?);
        let embedder: Arc<dyn Embedder> = Arc::from(build_embedder(&settings.embedding)?);
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleClient::from_settings(&settings.llm));
        let prometheus = install_prometheus()?;

        Ok(Self {
            factory,
            llm,
            embedder,
            settings: Arc::new(settings),
            metrics: Arc::new(MetricsRegistry::new()),
            prometheus,
        })
    }
}

/// Runs a blocking closure on the Tokio blocking pool, flattening both the
/// closure's own `Result` and a possible join failure into [`ApiError`].
///
/// Times the closure and records the sample against `operation` in
/// `state.metrics` (§4.11, §8 property 9), and on failure emits
/// `mnemograph_operation_errors_total` keyed by the same operation name.
pub(crate) async fn blocking<F, T>(state: &AppState, operation: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let start = std::time::Instant::now();
    let outcome = tokio::task::spawn_blocking(f).await;
    state.metrics.record(operation, start.elapsed());

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            metrics::counter!("mnemograph_operation_errors_total", "operation" => operation).increment(1);
            Err(ApiError(err))
        },
        Err(join_err) => {
            metrics::counter!("mnemograph_operation_errors_total", "operation" => operation).increment(1);
            Err(ApiError(crate::Error::BackendError {
                operation: "spawn_blocking".to_string(),
                cause: join_err.to_string(),
            }))
        },
    }
}

/// Builds the full router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(write::ingest_handler))
        .route("/extract", post(write::extract_handler))
        .route("/process", post(write::process_handler))
        .route("/v2/items", post(write::create_item_handler).get(read::list_items_v2_handler))
        .route("/v2/items/{id}/meta", post(write::create_meta_handler).get(read::get_meta_handler))
        .route("/retrieve", get(read::retrieve_handler))
        .route("/search", get(read::search_handler))
        .route("/context", get(read::context_handler))
        .route("/items", get(read::list_items_handler))
        .route("/resources", get(read::list_resources_handler))
        .route("/resources/{id}", get(read::get_resource_handler))
        .route("/categories", get(read::list_categories_handler))
        .route("/v2/categories", get(read::list_categories_handler))
        .route("/graph/neighbors", get(graph::neighbors_handler))
        .route("/graph/paths", get(graph::paths_handler))
        .route("/jobs/nightly", post(admin::run_nightly_handler))
        .route("/jobs/weekly", post(admin::run_weekly_handler))
        .route("/jobs/monthly", post(admin::run_monthly_handler))
        .route("/summarize", post(admin::summarize_handler))
        .route("/health", get(admin::health_handler))
        .route("/health/detailed", get(admin::health_detailed_handler))
        .route("/metrics", get(admin::metrics_handler))
        .route("/metrics/reset", post(admin::metrics_reset_handler))
        .route("/v2/stats", get(admin::stats_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves the router on `settings.http.bind_address:port` until a
/// `Ctrl-C` signal arrives.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server exits
/// abnormally.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.settings.http.bind_address, state.settings.http.port);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|err| crate::Error::BackendError {
        operation: "http_bind".to_string(),
        cause: err.to_string(),
    })?;

    tracing::info!(%addr, "mnemograph listening");

    axum::serve(listener, app).await.map_err(|err| crate::Error::BackendError {
        operation: "http_serve".to_string(),
        cause: err.to_string(),
    })
}
