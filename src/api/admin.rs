//! Admin endpoints (§6): maintenance job triggers, health, metrics.

use super::{blocking, ApiError, AppState};
use crate::jobs::{run_monthly, run_nightly, run_weekly, MonthlyStats, NightlyStats, WeeklyStats};
use crate::models::ItemStatus;
use crate::observability::OperationStats;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

/// `POST /jobs/nightly`.
///
/// # Errors
///
/// Returns an error if a storage call within the pipeline fails.
pub async fn run_nightly_handler(State(state): State<AppState>) -> Result<Json<NightlyStats>, ApiError> {
    let factory = state.factory.clone();
    let llm = state.llm.clone();

    let stats = blocking(&state, "jobs_nightly", move || {
        let mut uow = factory.begin()?;
        let stats = run_nightly(uow.as_mut(), llm.as_ref())?;
        uow.commit()?;
        Ok(stats)
    })
    .await?;

    Ok(Json(stats))
}

/// `POST /jobs/weekly`.
///
/// # Errors
///
/// Returns an error if a storage call within the pipeline fails.
pub async fn run_weekly_handler(State(state): State<AppState>) -> Result<Json<WeeklyStats>, ApiError> {
    let factory = state.factory.clone();

    let stats = blocking(&state, "jobs_weekly", move || {
        let mut uow = factory.begin()?;
        let stats = run_weekly(uow.as_mut())?;
        uow.commit()?;
        Ok(stats)
    })
    .await?;

    Ok(Json(stats))
}

/// `POST /jobs/monthly`.
///
/// # Errors
///
/// Returns an error if a storage or embedding call within the pipeline
/// fails.
pub async fn run_monthly_handler(State(state): State<AppState>) -> Result<Json<MonthlyStats>, ApiError> {
    let factory = state.factory.clone();
    let embedder = state.embedder.clone();
    let storage_dimensions = state.settings.embedding.storage_dimensions;

    let stats = blocking(&state, "jobs_monthly", move || {
        let mut uow = factory.begin()?;
        let stats = run_monthly(uow.as_mut(), embedder.as_ref(), storage_dimensions)?;
        uow.commit()?;
        Ok(stats)
    })
    .await?;

    Ok(Json(stats))
}

const SUMMARY_FACTS_LIMIT: usize = 50;

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    summaries: HashMap<String, String>,
}

/// `POST /summarize`: refreshes every category's cached summary
/// immediately, outside the nightly schedule.
///
/// # Errors
///
/// Returns an error if a storage call fails. A single category's LLM call
/// failing is logged and skipped, per §7's degraded-operation policy.
pub async fn summarize_handler(State(state): State<AppState>) -> Result<Json<SummarizeResponse>, ApiError> {
    let factory = state.factory.clone();
    let llm = state.llm.clone();

    let summaries = blocking(&state, "summarize", move || {
        let mut uow = factory.begin()?;
        let mut summaries = HashMap::new();

        for name in uow.list_distinct_categories(ItemStatus::Active)? {
            let items = uow.list_items(Some(&name), SUMMARY_FACTS_LIMIT)?;
            if items.is_empty() {
                continue;
            }
            let facts: Vec<String> = items
                .iter()
                .map(|i| {
                    format!(
                        "{} {} {}",
                        i.subject.as_deref().unwrap_or(""),
                        i.predicate.as_deref().unwrap_or(""),
                        i.object.as_deref().unwrap_or("")
                    )
                })
                .collect();

            match llm.summarize_category(&name, &facts) {
                Ok(summary) => {
                    uow.update_category_summary(&name, &summary)?;
                    summaries.insert(name, summary);
                },
                Err(err) => {
                    tracing::warn!(category = %name, error = %err, "on-demand category summary failed, skipping");
                },
            }
        }

        uow.commit()?;
        Ok(summaries)
    })
    .await?;

    Ok(Json(SummarizeResponse { summaries }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// `GET /health`: a cheap liveness probe with no storage access.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Serialize)]
pub struct HealthDetailedResponse {
    status: &'static str,
    resources: usize,
    items_by_status: HashMap<String, usize>,
    embeddings: usize,
    graph_edges: usize,
    avg_confidence: f32,
}

/// `GET /health/detailed`: a readiness probe that exercises storage.
///
/// # Errors
///
/// Returns an error if any underlying count query fails.
pub async fn health_detailed_handler(State(state): State<AppState>) -> Result<Json<HealthDetailedResponse>, ApiError> {
    let factory = state.factory.clone();

    let report = blocking(&state, "health_detailed", move || {
        let mut uow = factory.begin()?;
        let resources = uow.count_resources()?;
        let items_by_status = uow.item_stats_by_status()?;
        let embeddings = uow.count_embeddings()?;
        let graph_edges = uow.count_edges()?;
        let avg_confidence = uow.avg_confidence()?;
        Ok((resources, items_by_status, embeddings, graph_edges, avg_confidence))
    })
    .await?;

    let (resources, items_by_status, embeddings, graph_edges, avg_confidence) = report;

    Ok(Json(HealthDetailedResponse { status: "ok", resources, items_by_status, embeddings, graph_edges, avg_confidence }))
}

/// `GET /metrics`: renders the Prometheus text exposition format.
pub async fn metrics_handler(State(state): State<AppState>) -> (StatusCode, String) {
    (StatusCode::OK, state.prometheus.render())
}

#[derive(Debug, Serialize)]
pub struct MetricsResetResponse {
    reset: bool,
}

/// `POST /metrics/reset`: clears the in-process latency ring buffers.
pub async fn metrics_reset_handler(State(state): State<AppState>) -> Json<MetricsResetResponse> {
    state.metrics.reset();
    Json(MetricsResetResponse { reset: true })
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    items_by_status: HashMap<String, usize>,
    items_per_category: HashMap<String, usize>,
    resources: usize,
    embeddings: usize,
    graph_edges: usize,
    avg_confidence: f32,
    operation_latencies: HashMap<String, OperationStats>,
}

/// `GET /v2/stats`: a fuller operational snapshot than `/health/detailed`,
/// including per-operation latency percentiles.
///
/// # Errors
///
/// Returns an error if any underlying count query fails.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let factory = state.factory.clone();
    let metrics = state.metrics.clone();

    let report = blocking(&state, "stats", move || {
        let mut uow = factory.begin()?;
        let items_by_status = uow.item_stats_by_status()?;
        let items_per_category = uow.count_items_per_category(ItemStatus::Active)?;
        let resources = uow.count_resources()?;
        let embeddings = uow.count_embeddings()?;
        let graph_edges = uow.count_edges()?;
        let avg_confidence = uow.avg_confidence()?;
        Ok((items_by_status, items_per_category, resources, embeddings, graph_edges, avg_confidence))
    })
    .await?;

    let (items_by_status, items_per_category, resources, embeddings, graph_edges, avg_confidence) = report;

    Ok(Json(StatsResponse {
        items_by_status,
        items_per_category,
        resources,
        embeddings,
        graph_edges,
        avg_confidence,
        operation_latencies: metrics.all_stats(),
    }))
}
