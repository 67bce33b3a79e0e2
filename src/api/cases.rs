use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::api_viewer;
use super::types::CaseQuery;
use super::validation::validate_id;
use super::{ApiError, ApiResponse, AppState};
use crate::services::CaseView;

/// GET /api/v1/cases/{id}/
///
/// `?full_case=true` adds the casebody; restricted bodies cost one unit of
/// the viewer's daily allowance.
pub async fn get_case(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<CaseQuery>,
    headers: HeaderMap,
    session: Session,
) -> Result<Json<ApiResponse<CaseView>>, ApiError> {
    validate_id("case", id)?;

    let viewer = api_viewer(&state, &session, &headers).await?;
    let case = state
        .access_service()
        .view_case(viewer.as_ref(), id, query.wants_full_case())
        .await?;

    Ok(Json(ApiResponse::success(case)))
}
