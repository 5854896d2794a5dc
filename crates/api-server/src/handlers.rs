use crate::error::ApiError;
use crate::streaming::file_response;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method};
use axum::response::{IntoResponse, Json, Response};
use domain::{DomainError, DropReport, InfoHash, SessionDiagnostics, SessionStatus, StreamRequest, TorrentSession};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct AddMagnetRequest {
    pub magnet: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMagnetResponse {
    pub info_hash: InfoHash,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DroppedResponse {
    pub hash: InfoHash,
    pub state: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "online",
        "service": "torrent-gateway",
    }))
}

pub async fn add_magnet(
    State(state): State<AppState>,
    payload: Result<Json<AddMagnetRequest>, JsonRejection>,
) -> Result<Json<AddMagnetResponse>, ApiError> {
    let Json(request) = payload
        .map_err(|e| DomainError::InvalidMagnet(format!("expected a JSON body with a magnet field: {}", e)))?;
    let magnet = request
        .magnet
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| DomainError::InvalidMagnet("magnet is required".to_string()))?;

    let handle = state.gateway.add_magnet(magnet.trim()).await?;
    info!("✅ Session {} added", handle.info_hash);

    Ok(Json(AddMagnetResponse {
        info_hash: handle.info_hash,
        status: "added",
    }))
}

pub async fn session_status(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    let info_hash = InfoHash::parse(&hash)?;
    Ok(Json(state.gateway.session_status(&info_hash).await?))
}

pub async fn debug_session(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<SessionDiagnostics>, ApiError> {
    let info_hash = InfoHash::parse(&hash)?;
    Ok(Json(state.gateway.diagnostics(&info_hash).await?))
}

pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<TorrentSession>>, ApiError> {
    Ok(Json(state.gateway.list_sessions().await?))
}

pub async fn drop_session(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<DroppedResponse>, ApiError> {
    let info_hash = InfoHash::parse(&hash)?;
    let session = state.gateway.drop_session(&info_hash).await?;
    Ok(Json(DroppedResponse {
        hash: session.info_hash,
        state: "dropped",
    }))
}

pub async fn drop_all(State(state): State<AppState>) -> Result<Json<DropReport>, ApiError> {
    Ok(Json(state.gateway.drop_all().await?))
}

pub async fn stream_file(
    State(state): State<AppState>,
    Path((hash, index)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let info_hash = InfoHash::parse(&hash)?;
    let file_index = index
        .parse::<usize>()
        .map_err(|_| DomainError::NotFound(format!("file index '{}' is not a number", index)))?;
    let range = headers.get(header::RANGE).and_then(|value| value.to_str().ok());

    let request = StreamRequest::new(info_hash, file_index, range);
    let served = state.gateway.open_stream(&request).await?;

    Ok(file_response(
        served,
        state.gateway.stream_chunk_size(),
        method == Method::HEAD,
    ))
}
