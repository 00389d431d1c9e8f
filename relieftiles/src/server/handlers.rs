//! Route handlers.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::coord::AreaSpec;
use crate::orchestrator::{DownloadJob, JobId, JobRequest};
use crate::provider::{is_valid_layer_name, AsyncHttpClient, OSM_LAYER};
use crate::store::LayerSummary;
use crate::tile::TileKey;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: JobId,
}

/// POST /tiles/download
pub async fn submit_download<C: AsyncHttpClient + 'static>(
    State(state): State<AppState<C>>,
    body: Result<Json<JobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let job_id = state.manager.submit(&request).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

/// Query string of the streaming endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_miles: f64,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Comma-separated layer names.
    pub layers: Option<String>,
    #[serde(default)]
    pub redownload_blocked: bool,
}

impl StreamQuery {
    fn into_request(self) -> JobRequest {
        let layers: Vec<String> = self
            .layers
            .as_deref()
            .unwrap_or(OSM_LAYER)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        JobRequest::new(
            AreaSpec::circle(self.lat, self.lon, self.radius_miles),
            (self.min_zoom..=self.max_zoom).collect(),
        )
        .with_layers(layers)
        .with_redownload_blocked(self.redownload_blocked)
    }
}

/// GET /tiles/download
///
/// Runs a job bound to this connection and streams one event per tile as
/// server-sent events. Closing the connection cancels the job.
pub async fn stream_download<C: AsyncHttpClient + 'static>(
    State(state): State<AppState<C>>,
    query: Result<Query<StreamQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let job = state.manager.stream(&query.into_request()).await?;
    debug!(job_id = %job.id(), "Streaming job attached to connection");

    let events = job.into_stream().map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to serialize job event");
            String::from("{}")
        });
        Ok(Event::default().data(data))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// GET /tiles/jobs
pub async fn list_jobs<C: AsyncHttpClient + 'static>(
    State(state): State<AppState<C>>,
) -> Json<Vec<DownloadJob>> {
    Json(state.manager.list())
}

fn parse_job_id(id: &str) -> Result<JobId, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound(format!("job {} not found", id)))
}

/// GET /tiles/jobs/:id
pub async fn get_job<C: AsyncHttpClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadJob>, ApiError> {
    let id = parse_job_id(&id)?;
    Ok(Json(state.manager.get(id)?))
}

/// DELETE /tiles/jobs/:id
pub async fn cancel_job<C: AsyncHttpClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_job_id(&id)?;
    state.manager.cancel(id)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub base_dir: String,
    pub blocked_tile_size: u64,
    pub layers: Vec<LayerSummary>,
}

/// GET /tiles/status
pub async fn status<C: AsyncHttpClient + 'static>(
    State(state): State<AppState<C>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let store = state.manager.orchestrator().store();
    let layers = store.summary().await?;
    Ok(Json(StatusResponse {
        base_dir: store.base_dir().display().to_string(),
        blocked_tile_size: store.blocked_tile_size(),
        layers,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BlockedQuery {
    pub layer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockedResponse {
    pub count: usize,
    pub tiles: Vec<TileKey>,
}

/// GET /tiles/blocked
pub async fn blocked_tiles<C: AsyncHttpClient + 'static>(
    State(state): State<AppState<C>>,
    Query(query): Query<BlockedQuery>,
) -> Result<Json<BlockedResponse>, ApiError> {
    if let Some(layer) = query.layer.as_deref() {
        check_layer_name(layer)?;
    }
    let tiles = state
        .manager
        .orchestrator()
        .store()
        .find_blocked(query.layer.as_deref())
        .await?;
    Ok(Json(BlockedResponse {
        count: tiles.len(),
        tiles,
    }))
}

fn check_layer_name(layer: &str) -> Result<(), ApiError> {
    if is_valid_layer_name(layer) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("invalid layer name '{}'", layer)))
    }
}

/// GET /tiles/:layer/:z/:x/:y.png
pub async fn serve_tile<C: AsyncHttpClient + 'static>(
    State(state): State<AppState<C>>,
    Path((layer, z, x, file)): Path<(String, String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    check_layer_name(&layer)?;

    let parse_err = || {
        ApiError::BadRequest(format!("invalid tile path {}/{}/{}/{}", layer, z, x, file))
    };
    let zoom: u8 = z.parse().map_err(|_| parse_err())?;
    let x: u32 = x.parse().map_err(|_| parse_err())?;
    let y: u32 = file
        .strip_suffix(".png")
        .and_then(|y| y.parse().ok())
        .ok_or_else(parse_err)?;

    let key = TileKey::new(layer.as_str(), zoom, x, y);
    match state.manager.orchestrator().store().read(&key).await? {
        Some(bytes) => Ok(([(header::CONTENT_TYPE, "image/png")], bytes)),
        None => Err(ApiError::NotFound(format!("tile {} not found", key))),
    }
}
