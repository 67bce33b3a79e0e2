//! Research access pages: Harvard self-service agreements, general research
//! requests, and the approver's decision page.

use axum::{
    Form,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
    response::Response,
};
use serde_json::json;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::{current_user, login_redirect, push_flash, take_flash};
use super::pages::{error_page, found, render};
use super::types::{ApproveForm, HarvardForm, ResearchForm};
use super::{ApiError, AppState};
use crate::db::User;
use crate::domain::ContractDecision;
use crate::services::research_service::MSG_NOT_HARVARD;
use crate::services::{
    ContractReview, HarvardRequestInput, ResearchError, ResearchRequestInput,
};

const OPTIONS_PATH: &str = "/user/research/";

fn review_context(review: &ContractReview) -> serde_json::Value {
    let contract = &review.contract;
    json!({
        "id": contract.id,
        "name": contract.name,
        "email": contract.email,
        "institution": contract.institution,
        "title": contract.title,
        "area_of_interest": contract.area_of_interest,
        "status": contract.status,
        "pending": contract.status == "pending",
        "contract_html": contract.contract_html,
        "requester_email": review.requester.email,
    })
}

async fn not_harvard(session: &Session) -> Result<Response, ApiError> {
    push_flash(session, MSG_NOT_HARVARD).await?;
    Ok(found(OPTIONS_PATH))
}

// ============================================================================
// Options
// ============================================================================

/// GET /user/research/
pub async fn options(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    let notices = take_flash(&session).await;
    let is_harvard = state.research_service().is_harvard_user(&user).await;

    render(
        &state,
        Some(&user),
        "research_options",
        "Research access",
        &json!({
            "notices": notices,
            "is_harvard": is_harvard,
            "harvard_access": user.harvard_access,
            "unrestricted": user.unlimited_access_in_effect(chrono::Utc::now()),
        }),
    )
}

// ============================================================================
// Harvard
// ============================================================================

/// GET /user/research/harvard-intro/
pub async fn harvard_intro(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };
    if !state.research_service().is_harvard_user(&user).await {
        return not_harvard(&session).await;
    }

    render(
        &state,
        Some(&user),
        "harvard_intro",
        "Harvard research access",
        &json!({}),
    )
}

fn harvard_form_page(
    state: &AppState,
    user: &User,
    form: &serde_json::Value,
    errors: Option<&crate::domain::forms::FormErrors>,
) -> Result<Response, ApiError> {
    render(
        state,
        Some(user),
        "harvard_form",
        "Harvard research agreement",
        &json!({ "form": form, "errors": errors, "email": user.email }),
    )
}

/// GET /user/research/harvard/
pub async fn harvard_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };
    if !state.research_service().is_harvard_user(&user).await {
        return not_harvard(&session).await;
    }

    harvard_form_page(&state, &user, &json!({ "name": user.full_name() }), None)
}

/// POST /user/research/harvard/
pub async fn harvard_submit(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<HarvardForm>,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    let values = json!({
        "name": form.name,
        "title": form.title,
        "area_of_interest": form.area_of_interest,
    });
    let input = HarvardRequestInput {
        name: form.name,
        title: form.title,
        area_of_interest: form.area_of_interest,
    };

    match state
        .research_service()
        .submit_harvard_request(&user, input)
        .await
    {
        Ok(_) => Ok(found("/user/research/harvard/success/")),
        Err(ResearchError::NotHarvard) => not_harvard(&session).await,
        Err(ResearchError::Validation(errors)) => {
            harvard_form_page(&state, &user, &values, Some(&errors))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /user/research/harvard/success/
pub async fn harvard_success(
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
        "harvard_success",
        "Agreement signed",
        &json!({ "email": user.email }),
    )
}

// ============================================================================
// General research requests
// ============================================================================

fn research_form_page(
    state: &AppState,
    user: &User,
    form: &serde_json::Value,
    errors: Option<&crate::domain::forms::FormErrors>,
) -> Result<Response, ApiError> {
    render(
        state,
        Some(user),
        "research_form",
        "Research access request",
        &json!({ "form": form, "errors": errors, "email": user.email }),
    )
}

/// GET /user/research/request/
pub async fn research_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    research_form_page(&state, &user, &json!({ "name": user.full_name() }), None)
}

/// POST /user/research/request/
///
/// A submitted `email` field is ignored; the account address is used.
pub async fn research_submit(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<ResearchForm>,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    if !form.email.is_empty() && !form.email.eq_ignore_ascii_case(&user.email) {
        tracing::debug!(user_id = user.id, "Ignoring submitted email on research request");
    }

    let values = json!({
        "name": form.name,
        "institution": form.institution,
        "title": form.title,
        "area_of_interest": form.area_of_interest,
    });
    let input = ResearchRequestInput {
        name: form.name,
        institution: form.institution,
        title: form.title,
        area_of_interest: form.area_of_interest,
    };

    match state
        .research_service()
        .submit_research_request(&user, input)
        .await
    {
        Ok(_) => Ok(found("/user/research/request/success/")),
        Err(ResearchError::Validation(errors)) => {
            research_form_page(&state, &user, &values, Some(&errors))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /user/research/request/success/
pub async fn research_success(
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
        "research_success",
        "Request received",
        &json!({}),
    )
}

// ============================================================================
// Approval
// ============================================================================

fn approval_error(
    state: &AppState,
    user: &User,
    err: ResearchError,
) -> Result<Response, ApiError> {
    match err {
        ResearchError::NotApprover => error_page(
            state,
            Some(user),
            StatusCode::FORBIDDEN,
            "You do not have permission to review research requests.",
        ),
        ResearchError::ContractNotFound(_) => error_page(
            state,
            Some(user),
            StatusCode::NOT_FOUND,
            "That research request does not exist.",
        ),
        other => Err(other.into()),
    }
}

/// GET /user/research/approve/{id}/
pub async fn approve_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    match state.research_service().review(&user, id).await {
        Ok(review) => render(
            &state,
            Some(&user),
            "approve",
            "Review research request",
            &json!({ "contract": review_context(&review) }),
        ),
        Err(e) => approval_error(&state, &user, e),
    }
}

/// POST /user/research/approve/{id}/
pub async fn approve_submit(
    State(state): State<Arc<AppState>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
    Form(form): Form<ApproveForm>,
) -> Result<Response, ApiError> {
    let Some(user) = current_user(&state, &session).await? else {
        return Ok(login_redirect(&uri));
    };

    if !user.is_contract_approver {
        return approval_error(&state, &user, ResearchError::NotApprover);
    }

    if form.contract_id != Some(id) {
        return Err(ApiError::validation("Contract ID does not match"));
    }

    let decision = match (form.approve.is_some(), form.deny.is_some()) {
        (true, false) => ContractDecision::Approve,
        (false, true) => ContractDecision::Deny,
        _ => return Err(ApiError::validation("Choose either approve or deny")),
    };
    let notes = Some(form.notes.trim().to_string()).filter(|n| !n.is_empty());

    match state
        .research_service()
        .decide(&user, id, decision, notes)
        .await
    {
        Ok(review) => render(
            &state,
            Some(&user),
            "approve",
            "Review research request",
            &json!({
                "contract": review_context(&review),
                "result": format!("{} {}", review.contract.name, decision.past_tense()),
            }),
        ),
        Err(ResearchError::AlreadyDecided(status)) => {
            let review = state.research_service().review(&user, id).await?;
            render(
                &state,
                Some(&user),
                "approve",
                "Review research request",
                &json!({
                    "contract": review_context(&review),
                    "error": format!("This request has already been {status}."),
                }),
            )
        }
        Err(e) => approval_error(&state, &user, e),
    }
}
