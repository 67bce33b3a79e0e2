//! Server-rendered HTML helpers and the site-wide pages.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::{current_user, nav_for};
use super::{ApiError, AppState};
use crate::db::User;

/// 302 redirect. `axum::response::Redirect` only offers 303/307/308.
#[must_use]
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

pub fn render<T: Serialize>(
    state: &AppState,
    user: Option<&User>,
    name: &str,
    title: &str,
    data: &T,
) -> Result<Response, ApiError> {
    render_with_status(state, user, StatusCode::OK, name, title, data)
}

pub fn render_with_status<T: Serialize>(
    state: &AppState,
    user: Option<&User>,
    status: StatusCode,
    name: &str,
    title: &str,
    data: &T,
) -> Result<Response, ApiError> {
    let html = state
        .templates()
        .render_page(name, title, &nav_for(user), data)?;
    Ok((status, Html(html)).into_response())
}

/// Generic error page used where a JSON body would be out of place.
pub fn error_page(
    state: &AppState,
    user: Option<&User>,
    status: StatusCode,
    message: &str,
) -> Result<Response, ApiError> {
    let title = status.canonical_reason().unwrap_or("Error");
    render_with_status(
        state,
        user,
        status,
        "error",
        title,
        &json!({ "status": status.as_u16(), "message": message }),
    )
}

/// GET /
pub async fn home(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    let user = current_user(&state, &session).await?;
    render(
        &state,
        user.as_ref(),
        "home",
        "Home",
        &json!({ "signed_in": user.is_some() }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_is_a_302() {
        let response = found("/user/details");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/user/details");
    }
}
