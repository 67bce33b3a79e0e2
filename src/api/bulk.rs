use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::services::ServeFile;
use tower_sessions::Session;

use super::auth::{api_viewer, current_user};
use super::pages::render;
use super::types::CaseExportDto;
use super::validation::validate_id;
use super::{ApiError, AppState};

/// GET /bulk/download/
pub async fn list_exports(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    let user = current_user(&state, &session).await?;
    let exports = state.access_service().visible_exports(user.as_ref()).await?;

    let (public, private): (Vec<CaseExportDto>, Vec<CaseExportDto>) = exports
        .into_iter()
        .map(CaseExportDto::from)
        .partition(|e| e.public);

    render(
        &state,
        user.as_ref(),
        "bulk_download",
        "Bulk data",
        &json!({
            "public_exports": public,
            "private_exports": private,
        }),
    )
}

/// GET /api/v1/bulk/{id}/download/
///
/// Streams the export archive. Anonymous requests for private exports get
/// 401, authenticated viewers without access get 403.
pub async fn download_export(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    validate_id("export", id)?;

    let viewer = api_viewer(&state, &session, &headers).await?;
    let authorized = state
        .access_service()
        .authorize_export(viewer.as_ref(), id)
        .await?;

    let mut req = axum::http::Request::builder();
    if let Some(range) = headers.get(header::RANGE) {
        req = req.header(header::RANGE, range.clone());
    }
    let req = req
        .body(Body::empty())
        .map_err(|e| ApiError::internal(format!("Failed to build request: {e}")))?;

    let mut response = match ServeFile::new(&authorized.path).try_call(req).await {
        Ok(res) => res.map(Body::new),
        Err(e) => return Err(ApiError::internal(format!("Streaming error: {e}"))),
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        authorized.export.file_name.replace(['"', '\\'], "")
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::internal(format!("Bad export file name: {e}")))?;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    tracing::info!(
        export_id = id,
        user_id = viewer.as_ref().map(|u| u.id),
        "Bulk export download"
    );

    Ok(response)
}
