//! Graph endpoints (§6): thin wrappers around the in-memory graph engine,
//! fed with the edges touching the queried entities.

use super::{blocking, ApiError, AppState};
use crate::entity::resolve;
use crate::graph::{find_paths, get_neighbors, Path as GraphPath};
use crate::models::GraphEdge;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

fn default_neighbor_depth() -> u32 {
    1
}

fn default_path_depth() -> u32 {
    2
}

fn default_max_paths() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct NeighborsQuery {
    entity: String,
    #[serde(default = "default_neighbor_depth")]
    depth: u32,
}

#[derive(Debug, Serialize)]
pub struct NeighborsResponse {
    entity: String,
    depth: u32,
    edges: Vec<GraphEdge>,
    total: usize,
}

/// `GET /graph/neighbors`.
///
/// # Errors
///
/// Returns an error if the storage call fails.
pub async fn neighbors_handler(
    State(state): State<AppState>,
    Query(q): Query<NeighborsQuery>,
) -> Result<Json<NeighborsResponse>, ApiError> {
    let factory = state.factory.clone();
    let entity = resolve(&q.entity);
    let depth = q.depth;

    let edges = blocking(&state, "graph_neighbors", move || {
        let mut uow = factory.begin()?;
        let all_edges = uow.list_all_edges()?;
        Ok(get_neighbors(&all_edges, &entity, depth))
    })
    .await?;

    Ok(Json(NeighborsResponse { entity: q.entity, depth, total: edges.len(), edges }))
}

#[derive(Debug, Deserialize)]
pub struct PathsQuery {
    source: String,
    target: Option<String>,
    #[serde(default = "default_path_depth")]
    max_depth: u32,
    #[serde(default = "default_max_paths")]
    max_paths: usize,
}

#[derive(Debug, Serialize)]
struct PathDto {
    hops: Vec<String>,
    edges: Vec<GraphEdge>,
    weight: f32,
    distance: usize,
}

impl From<GraphPath> for PathDto {
    fn from(path: GraphPath) -> Self {
        Self { hops: path.hops, edges: path.edges, weight: path.weight, distance: path.distance }
    }
}

#[derive(Debug, Serialize)]
pub struct PathsResponse {
    source: String,
    target: Option<String>,
    max_depth: u32,
    paths: Vec<PathDto>,
    total: usize,
}

const MAX_PATH_DEPTH: u32 = 3;

/// `GET /graph/paths`.
///
/// # Errors
///
/// Returns an error if the storage call fails.
pub async fn paths_handler(
    State(state): State<AppState>,
    Query(q): Query<PathsQuery>,
) -> Result<Json<PathsResponse>, ApiError> {
    let factory = state.factory.clone();
    let source = resolve(&q.source);
    let target = q.target.as_deref().map(resolve);
    let max_depth = q.max_depth.min(MAX_PATH_DEPTH);
    let max_paths = q.max_paths;

    let paths = blocking(&state, "graph_paths", move || {
        let mut uow = factory.begin()?;
        let all_edges = uow.list_all_edges()?;
        Ok(find_paths(&all_edges, &source, target.as_deref(), max_depth, max_paths))
    })
    .await?;

    let paths: Vec<PathDto> = paths.into_iter().map(PathDto::from).collect();

    Ok(Json(PathsResponse { source: q.source, target: q.target, max_depth, total: paths.len(), paths }))
}
