use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Config;
use crate::state::SharedState;

mod accounts;
pub mod auth;
mod bulk;
mod cases;
mod error;
mod observability;
pub mod pages;
mod research;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

use crate::services::{AccessService, AccountService, ResearchService};
use crate::templates::Templates;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn templates(&self) -> &Templates {
        &self.shared.templates
    }

    #[must_use]
    pub fn account_service(&self) -> &Arc<dyn AccountService> {
        &self.shared.account_service
    }

    #[must_use]
    pub fn research_service(&self) -> &Arc<dyn ResearchService> {
        &self.shared.research_service
    }

    #[must_use]
    pub fn access_service(&self) -> &Arc<dyn AccessService> {
        &self.shared.access_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (secure_cookies, expiry_minutes) = {
        let config = state.config().read().await;
        (
            config.server.secure_cookies,
            config.server.session_expiry_minutes,
        )
    };

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            expiry_minutes,
        )));

    let api_router = Router::new()
        .route("/bulk/{id}/download/", get(bulk::download_export))
        .route("/cases/{id}/", get(cases::get_case));

    Router::new()
        .route("/", get(pages::home))
        .merge(user_routes())
        .route("/bulk/download/", get(bulk::list_exports))
        .nest("/api/v1", api_router)
        .route("/health", get(observability::health))
        .route("/metrics", get(observability::get_metrics))
        .layer(session_layer)
        .with_state(state)
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/user/register/",
            get(accounts::register_form).post(accounts::register),
        )
        .route(
            "/user/verify-user/{user_id}/{nonce}/",
            get(accounts::verify_user),
        )
        .route(
            "/user/resend-verification/",
            get(accounts::resend_form).post(accounts::resend),
        )
        .route(
            "/user/login/",
            get(accounts::login_form).post(accounts::login),
        )
        .route("/user/logout/", post(accounts::logout))
        .route("/user/details", get(accounts::details))
        .route(
            "/user/reset-api-key/",
            get(accounts::reset_api_key_form).post(accounts::reset_api_key),
        )
        .route(
            "/user/delete-account/",
            get(accounts::delete_account_form).post(accounts::delete_account),
        )
        .route("/user/research/", get(research::options))
        .route("/user/research/harvard-intro/", get(research::harvard_intro))
        .route(
            "/user/research/harvard/",
            get(research::harvard_form).post(research::harvard_submit),
        )
        .route(
            "/user/research/harvard/success/",
            get(research::harvard_success),
        )
        .route(
            "/user/research/request/",
            get(research::research_form).post(research::research_submit),
        )
        .route(
            "/user/research/request/success/",
            get(research::research_success),
        )
        .route(
            "/user/research/approve/{id}/",
            get(research::approve_form).post(research::approve_submit),
        )
}
