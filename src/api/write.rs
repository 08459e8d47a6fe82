//! Write / ingest endpoints (§6).

use super::{blocking, ApiError, AppState};
use crate::models::Item;
use crate::pipeline;
use crate::Error;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    content: String,
    source: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    resource_id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// `POST /ingest`.
///
/// # Errors
///
/// Returns an error if the resource cannot be stored.
pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let factory = state.factory.clone();
    let resource = blocking(&state, "ingest", move || {
        let mut uow = factory.begin()?;
        let resource = pipeline::ingest(uow.as_mut(), &req.source, &req.content, req.metadata)?;
        uow.commit()?;
        Ok(resource)
    })
    .await?;

    Ok(Json(IngestResponse { resource_id: resource.id, created_at: resource.created_at }))
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    resource_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    resource_id: Uuid,
    items_created: usize,
    item_ids: Vec<Uuid>,
}

/// `POST /extract`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if `resource_id` is unknown, or an error if
/// extraction or storage fails.
pub async fn extract_handler(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, ApiError> {
    let factory = state.factory.clone();
    let llm = state.llm.clone();
    let embedder = state.embedder.clone();
    let settings = state.settings.clone();
    let resource_id = req.resource_id;

    let items = blocking(&state, "extract", move || {
        let mut uow = factory.begin()?;
        let resource = uow
            .get_resource(resource_id)?
            .ok_or_else(|| Error::NotFound(format!("resource {resource_id} not found")))?;
        let items = pipeline::extract(uow.as_mut(), llm.as_ref(), embedder.as_ref(), &settings, &resource)?;
        uow.commit()?;
        Ok(items)
    })
    .await?;

    Ok(Json(ExtractResponse {
        resource_id,
        items_created: items.len(),
        item_ids: items.iter().map(|i| i.id).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProcessQuery {
    #[serde(default = "default_process_limit")]
    limit: usize,
}

const fn default_process_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    processed: usize,
}

/// `POST /process?limit=N`.
///
/// # Errors
///
/// Returns an error if storage or extraction fails for any pending
/// resource.
pub async fn process_handler(
    State(state): State<AppState>,
    Query(q): Query<ProcessQuery>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let factory = state.factory.clone();
    let llm = state.llm.clone();
    let embedder = state.embedder.clone();
    let settings = state.settings.clone();
    let limit = q.limit.min(settings.limits.max_items_per_run);

    let processed = blocking(&state, "process", move || {
        let mut uow = factory.begin()?;
        let pending = uow.list_unextracted_resources(limit)?;
        for resource in &pending {
            pipeline::extract(uow.as_mut(), llm.as_ref(), embedder.as_ref(), &settings, resource)?;
        }
        let processed = pending.len();
        uow.commit()?;
        Ok(processed)
    })
    .await?;

    Ok(Json(ProcessResponse { processed }))
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    subject: Option<String>,
    predicate: Option<String>,
    object: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default = "default_item_confidence")]
    confidence: f32,
}

const fn default_item_confidence() -> f32 {
    1.0
}

/// `POST /v2/items`.
///
/// # Errors
///
/// Returns an error if storage, embedding, or conflict resolution fails.
pub async fn create_item_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateItemRequest>,
) -> Result<Json<Item>, ApiError> {
    let factory = state.factory.clone();
    let llm = state.llm.clone();
    let embedder = state.embedder.clone();
    let settings = state.settings.clone();

    let mut item = Item::new(req.subject, req.predicate, req.object);
    item.category = req.category;
    item.confidence = req.confidence.clamp(0.0, 1.0);

    let item = blocking(&state, "create_item", move || {
        let mut uow = factory.begin()?;
        let item = pipeline::create_item_direct(uow.as_mut(), llm.as_ref(), embedder.as_ref(), &settings, item)?;
        uow.commit()?;
        Ok(item)
    })
    .await?;

    Ok(Json(item))
}

#[derive(Debug, Deserialize)]
pub struct CreateMetaRequest {
    predicate: String,
    object: String,
    #[serde(default = "default_meta_confidence")]
    confidence: f32,
}

const fn default_meta_confidence() -> f32 {
    0.9
}

/// `POST /v2/items/{id}/meta`.
///
/// # Errors
///
/// Returns an error if the underlying item does not exist or storage
/// fails.
pub async fn create_meta_handler(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(req): Json<CreateMetaRequest>,
) -> Result<Json<Item>, ApiError> {
    let factory = state.factory.clone();
    let confidence = req.confidence.clamp(0.0, 1.0);

    let meta = blocking(&state, "create_meta", move || {
        let mut uow = factory.begin()?;
        uow.get_item(item_id)?.ok_or_else(|| Error::NotFound(format!("item {item_id} not found")))?;
        let meta = uow.create_meta_fact(item_id, &req.predicate, &req.object, confidence)?;
        uow.commit()?;
        Ok(meta)
    })
    .await?;

    Ok(Json(meta))
}
