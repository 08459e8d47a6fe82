//! Read / retrieve endpoints (§6).

use super::{blocking, ApiError, AppState};
use crate::intent_classifier::{smart_search, validate_query, SearchResultItem};
use crate::models::{Category, Item, Resource};
use crate::priority::get_tiered_context;
use crate::Error;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_retrieve_limit() -> usize {
    20
}

fn default_search_limit() -> usize {
    10
}

fn default_min_similarity() -> f32 {
    0.5
}

fn default_context_items_per_category() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct RetrieveQuery {
    query: String,
    category: Option<String>,
    #[serde(default = "default_retrieve_limit")]
    limit: usize,
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    query: String,
    categories: Vec<String>,
    items: Vec<SearchResultItem>,
    total_items: usize,
}

/// `GET /retrieve`.
///
/// # Errors
///
/// Returns [`Error::ValidationError`] for an empty query, or an error if a
/// required storage call fails.
pub async fn retrieve_handler(
    State(state): State<AppState>,
    Query(q): Query<RetrieveQuery>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    validate_query(&q.query).map_err(ApiError)?;

    let factory = state.factory.clone();
    let embedder = state.embedder.clone();
    let settings = state.settings.clone();
    let query = q.query.clone();
    let category = q.category.clone();
    let limit = q.limit;

    let result = blocking(&state, "retrieve", move || {
        let mut uow = factory.begin()?;
        smart_search(uow.as_mut(), embedder.as_ref(), &settings, &query, category.as_deref(), limit, 0.0)
    })
    .await?;

    let categories: Vec<String> = result.items.iter().filter_map(|i| i.category.clone()).collect::<std::collections::BTreeSet<_>>().into_iter().collect();

    Ok(Json(RetrieveResponse { query: q.query, categories, total_items: result.items.len(), items: result.items }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
    category: Option<String>,
    #[serde(default = "default_search_limit")]
    limit: usize,
    #[serde(default = "default_min_similarity")]
    min_similarity: f32,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    query: String,
    intent: String,
    results: Vec<SearchResultItem>,
    total: usize,
}

/// `GET /search`.
///
/// # Errors
///
/// Returns [`Error::ValidationError`] for an empty query, or an error if a
/// required storage call fails.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    validate_query(&q.q).map_err(ApiError)?;

    let factory = state.factory.clone();
    let embedder = state.embedder.clone();
    let settings = state.settings.clone();
    let query = q.q.clone();
    let category = q.category.clone();

    let result = blocking(&state, "search", move || {
        let mut uow = factory.begin()?;
        smart_search(uow.as_mut(), embedder.as_ref(), &settings, &query, category.as_deref(), q.limit, q.min_similarity)
    })
    .await?;

    Ok(Json(SearchResponse { query: q.q, intent: result.intent, total: result.items.len(), results: result.items }))
}

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    categories: Option<String>,
    max_chars: Option<usize>,
    #[serde(default = "default_context_items_per_category")]
    max_items_per_category: usize,
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    context: String,
}

/// `GET /context`.
///
/// # Errors
///
/// Returns an error if a required storage call fails.
pub async fn context_handler(
    State(state): State<AppState>,
    Query(q): Query<ContextQuery>,
) -> Result<Json<ContextResponse>, ApiError> {
    let factory = state.factory.clone();
    let categories: Option<Vec<String>> = q.categories.as_ref().map(|raw| raw.split(',').map(str::trim).map(String::from).collect());

    let context = blocking(&state, "context", move || {
        let mut uow = factory.begin()?;
        let context = get_tiered_context(uow.as_mut(), categories.as_deref(), q.max_items_per_category, q.max_chars, true)?;
        uow.commit()?;
        Ok(context)
    })
    .await?;

    Ok(Json(ContextResponse { context }))
}

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    category: Option<String>,
    #[serde(default = "default_items_limit")]
    limit: usize,
}

const fn default_items_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    items: Vec<Item>,
    total: usize,
}

/// `GET /items`.
///
/// # Errors
///
/// Returns an error if the storage call fails.
pub async fn list_items_handler(
    State(state): State<AppState>,
    Query(q): Query<ItemsQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let factory = state.factory.clone();
    let items = blocking(&state, "list_items", move || {
        let mut uow = factory.begin()?;
        uow.list_items(q.category.as_deref(), q.limit)
    })
    .await?;

    Ok(Json(ItemsResponse { total: items.len(), items }))
}

/// `GET /v2/items` (same listing, kept as a distinct route per the
/// external interface list).
///
/// # Errors
///
/// Returns an error if the storage call fails.
pub async fn list_items_v2_handler(
    state: State<AppState>,
    query: Query<ItemsQuery>,
) -> Result<Json<ItemsResponse>, ApiError> {
    list_items_handler(state, query).await
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    meta_facts: Vec<Item>,
}

/// `GET /v2/items/{id}/meta`.
///
/// # Errors
///
/// Returns an error if the storage call fails.
pub async fn get_meta_handler(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<MetaResponse>, ApiError> {
    let factory = state.factory.clone();
    let meta_facts = blocking(&state, "get_meta", move || {
        let mut uow = factory.begin()?;
        uow.get_meta_facts(item_id)
    })
    .await?;

    Ok(Json(MetaResponse { meta_facts }))
}

#[derive(Debug, Deserialize)]
pub struct ResourcesQuery {
    source: Option<String>,
    #[serde(default = "default_items_limit")]
    limit: usize,
}

#[derive(Debug, Serialize)]
pub struct ResourcesResponse {
    resources: Vec<Resource>,
    total: usize,
}

/// `GET /resources`.
///
/// # Errors
///
/// Returns an error if the storage call fails.
pub async fn list_resources_handler(
    State(state): State<AppState>,
    Query(q): Query<ResourcesQuery>,
) -> Result<Json<ResourcesResponse>, ApiError> {
    let factory = state.factory.clone();
    let resources = blocking(&state, "list_resources", move || {
        let mut uow = factory.begin()?;
        uow.list_resources(q.source.as_deref(), None, q.limit)
    })
    .await?;

    Ok(Json(ResourcesResponse { total: resources.len(), resources }))
}

/// `GET /resources/{id}`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the resource does not exist, or an error
/// if the storage call fails.
pub async fn get_resource_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Resource>, ApiError> {
    let factory = state.factory.clone();
    let resource = blocking(&state, "get_resource", move || {
        let mut uow = factory.begin()?;
        uow.get_resource(id)?.ok_or_else(|| Error::NotFound(format!("resource {id} not found")))
    })
    .await?;

    Ok(Json(resource))
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    categories: Vec<Category>,
    total: usize,
}

/// `GET /categories` and `GET /v2/categories`.
///
/// # Errors
///
/// Returns an error if the storage call fails.
pub async fn list_categories_handler(State(state): State<AppState>) -> Result<Json<CategoriesResponse>, ApiError> {
    let factory = state.factory.clone();
    let categories = blocking(&state, "list_categories", move || {
        let mut uow = factory.begin()?;
        uow.list_categories()
    })
    .await?;

    Ok(Json(CategoriesResponse { total: categories.len(), categories }))
}
