use axum::{
    http::{HeaderMap, Uri},
    response::Response,
};
use std::sync::Arc;
use tower_sessions::Session;

use super::pages::found;
use super::{ApiError, AppState};
use crate::db::User;
use crate::templates::NavContext;

const SESSION_USER_KEY: &str = "user_id";
const SESSION_FLASH_KEY: &str = "flash";

// ============================================================================
// Session
// ============================================================================

/// Resolve the signed-in user from the session cookie.
///
/// A session pointing at a missing or deactivated account is flushed and
/// treated as anonymous.
pub async fn current_user(state: &AppState, session: &Session) -> Result<Option<User>, ApiError> {
    let user_id = session
        .get::<i32>(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    let Some(user_id) = user_id else {
        return Ok(None);
    };

    let user = state.account_service().active_user(user_id).await?;
    if user.is_none() {
        tracing::info!(user_id, "Dropping session for inactive user");
        session
            .flush()
            .await
            .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;
    } else {
        tracing::Span::current().record("user_id", user_id);
    }

    Ok(user)
}

/// Store `user` in a fresh session id.
pub async fn start_session(session: &Session, user: &User) -> Result<(), ApiError> {
    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to cycle session: {e}")))?;
    session
        .insert(SESSION_USER_KEY, user.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;
    Ok(())
}

pub async fn end_session(session: &Session) -> Result<(), ApiError> {
    session
        .flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to end session: {e}")))
}

/// Queue a notice for the next rendered page.
pub async fn push_flash(session: &Session, message: impl Into<String>) -> Result<(), ApiError> {
    let mut messages = session
        .get::<Vec<String>>(SESSION_FLASH_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    messages.push(message.into());
    session
        .insert(SESSION_FLASH_KEY, messages)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))
}

/// Drain queued notices.
pub async fn take_flash(session: &Session) -> Vec<String> {
    session
        .remove::<Vec<String>>(SESSION_FLASH_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

#[must_use]
pub fn nav_for(user: Option<&User>) -> NavContext {
    NavContext {
        signed_in: user.is_some(),
        email: user.map(|u| u.email.clone()),
    }
}

/// Redirect to the login page, coming back to `uri` afterwards.
#[must_use]
pub fn login_redirect(uri: &Uri) -> Response {
    let next = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    found(&format!("/user/login/?next={}", urlencoding::encode(&next)))
}

// ============================================================================
// API keys
// ============================================================================

/// Resolve the viewer of an API route: session first, then API key.
pub async fn api_viewer(
    state: &Arc<AppState>,
    session: &Session,
    headers: &HeaderMap,
) -> Result<Option<User>, ApiError> {
    if let Some(user) = current_user(state, session).await? {
        return Ok(Some(user));
    }

    let Some(key) = extract_api_key(headers) else {
        return Ok(None);
    };

    match state.store().verify_api_key(&key).await? {
        Some(user) => {
            tracing::Span::current().record("user_id", user.id);
            Ok(Some(user))
        }
        None => Err(ApiError::Unauthorized("Invalid token.".to_string())),
    }
}

/// Extract an API key from `X-Api-Key` or `Authorization: Token|Bearer <key>`.
fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(api_key) = headers.get("X-Api-Key")
        && let Ok(key_str) = api_key.to_str()
    {
        return Some(key_str.trim().to_string());
    }

    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str
            .strip_prefix("Token ")
            .or_else(|| auth_str.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    None
}
