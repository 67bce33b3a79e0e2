use axum::{
    Form,
    extract::{OriginalUri, Path, Query, State},
    response::Response,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::{current_user, end_session, login_redirect, start_session};
use super::pages::{found, render};
use super::types::{EmailForm, LoginForm, NextQuery, RegisterForm};
use super::validation::safe_next;
use super::{ApiError, AppState};
use crate::services::account_service::{MSG_BAD_CREDENTIALS, MSG_UNVERIFIED};
use crate::services::{AccountError, RegistrationInput};

// ============================================================================
// Registration & verification
// ============================================================================

/// GET /user/register/
pub async fn register_form(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    if current_user(&state, &session).await?.is_some() {
        return Ok(found("/user/details"));
    }

    render(&state, None, "register", "Register", &json!({ "form": {} }))
}

/// POST /user/register/
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    if current_user(&state, &session).await?.is_some() {
        return Ok(found("/user/details"));
    }

    let input = RegistrationInput {
        agreed_to_tos: form.agreed(),
        email: form.email.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        password1: form.password1,
        password2: form.password2,
    };

    match state.account_service().register(input).await {
        Ok(user) => render(
            &state,
            None,
            "register_done",
            "Check your email",
            &json!({ "email": user.email }),
        ),
        Err(AccountError::Validation(errors)) => render(
            &state,
            None,
            "register",
            "Register",
            &json!({
                "form": {
                    "email": form.email,
                    "first_name": form.first_name,
                    "last_name": form.last_name,
                    "agreed_to_tos": form.agreed_to_tos.is_some_and(|v| !v.trim().is_empty()),
                },
                "errors": errors,
            }),
        ),
        Err(e) => Err(e.into()),
    }
}

/// GET /user/verify-user/{user_id}/{nonce}/
pub async fn verify_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path((user_id, nonce)): Path<(i32, String)>,
) -> Result<Response, ApiError> {
    let viewer = current_user(&state, &session).await?;

    let verified = match state.account_service().verify_email(user_id, &nonce).await {
        Ok(_) => true,
        Err(AccountError::InvalidVerificationLink) => false,
        Err(e) => return Err(e.into()),
    };

    render(
        &state,
        viewer.as_ref(),
        "verify_result",
        if verified {
            "Email verified"
        } else {
            "Verification failed"
        },
        &json!({ "verified": verified }),
    )
}

/// GET /user/resend-verification/
pub async fn resend_form(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    let viewer = current_user(&state, &session).await?;
    render(
        &state,
        viewer.as_ref(),
        "resend",
        "Resend verification",
        &json!({ "sent": false }),
    )
}

/// POST /user/resend-verification/
///
/// The response is the same whether or not the address is registered.
pub async fn resend(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<EmailForm>,
) -> Result<Response, ApiError> {
    let viewer = current_user(&state, &session).await?;
    let email = form.email.trim().to_string();

    if !email.is_empty() {
        state.account_service().resend_verification(&email).await?;
    }

    render(
        &state,
        viewer.as_ref(),
        "resend",
        "Resend verification",
        &json!({ "sent": !email.is_empty(), "email": email }),
    )
}

// ============================================================================
// Login / logout
// ============================================================================

/// GET /user/login/
pub async fn login_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Result<Response, ApiError> {
    let viewer = current_user(&state, &session).await?;
    render(
        &state,
        viewer.as_ref(),
        "login",
        "Log in",
        &json!({ "next": safe_next(query.next.as_deref()) }),
    )
}

/// POST /user/login/
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let next = safe_next(form.next.as_deref().or(query.next.as_deref())).map(str::to_string);

    let failure = match state
        .account_service()
        .login(form.username.trim(), &form.password)
        .await
    {
        Ok(user) => {
            start_session(&session, &user).await?;
            tracing::info!(user_id = user.id, "User logged in");
            return Ok(found(next.as_deref().unwrap_or("/")));
        }
        Err(AccountError::InvalidCredentials) => json!({ "message": MSG_BAD_CREDENTIALS }),
        Err(AccountError::EmailNotVerified) => {
            json!({ "message": MSG_UNVERIFIED, "unverified": true })
        }
        Err(e) => return Err(e.into()),
    };

    render(
        &state,
        None,
        "login",
        "Log in",
        &json!({
            "next": next,
            "username": form.username,
            "error": failure,
        }),
    )
}

/// POST /user/logout/
pub async fn logout(session: Session) -> Result<Response, ApiError> {
    end_session(&session).await?;
    Ok(found("/"))
}

// ============================================================================
// Account details & API key
// ============================================================================

/// GET /user/details
pub async fn details(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    let api_key = state.account_service().api_key(user.id).await?;
    let now = Utc::now();
    let unrestricted = user.unlimited_access_in_effect(now);

    render(
        &state,
        Some(&user),
        "details",
        "Account details",
        &json!({
            "email": user.email,
            "first_name": user.first_name,
            "last_name": user.last_name,
            "api_key": api_key,
            "unrestricted": unrestricted,
            "unrestricted_until": user
                .unlimited_access_until
                .map(|until| until.format("%B %-d, %Y").to_string()),
            "total_case_allowance": user.total_case_allowance,
            "case_allowance_remaining": user.access_profile().effective_allowance_remaining(now),
            "harvard_access": user.harvard_access,
        }),
    )
}

/// GET /user/reset-api-key/
pub async fn reset_api_key_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    render(
        &state,
        Some(&user),
        "reset_api_key",
        "Reset API key",
        &json!({}),
    )
}

/// POST /user/reset-api-key/
pub async fn reset_api_key(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    state.account_service().rotate_api_key(user.id).await?;
    Ok(found("/user/details"))
}

// ============================================================================
// Deactivation
// ============================================================================

/// GET /user/delete-account/
pub async fn delete_account_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    render(
        &state,
        Some(&user),
        "delete_account",
        "Delete account",
        &json!({ "email": user.email }),
    )
}

/// POST /user/delete-account/
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    state.account_service().deactivate(user.id).await?;
    end_session(&session).await?;
    Ok(found("/"))
}
