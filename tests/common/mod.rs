#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use capaccess::api::{AppState, create_app_state, router};
use capaccess::config::{Config, MailBackend};
use capaccess::db::{Store, User};
use capaccess::mail::{EmailMessage, MemoryMailer};
use capaccess::state::SharedState;
use http_body_util::BodyExt;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub mailer: MemoryMailer,
    pub exports_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("response body is not JSON")
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let exports_dir = tempfile::tempdir().expect("tempdir");

    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.server.secure_cookies = false;
    config.server.public_url = "https://case.law".to_string();
    config.bulk.exports_root = exports_dir.path().to_string_lossy().into_owned();
    config.mail.backend = MailBackend::Memory;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    customize(&mut config);

    let mailer = MemoryMailer::new();
    let shared = SharedState::with_mailer(config, Arc::new(mailer.clone()))
        .await
        .expect("Failed to create shared state");
    let state = create_app_state(Arc::new(shared), None);
    let router = router(state.clone()).await;

    TestApp {
        router,
        state,
        mailer,
        exports_dir,
    }
}

impl TestApp {
    pub fn store(&self) -> &Store {
        self.state.store()
    }

    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookie: None,
        }
    }

    pub fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.mailer
            .outbox()
            .into_iter()
            .filter(|m| m.to.iter().any(|to| to == address))
            .collect()
    }

    pub async fn user(&self, email: &str) -> User {
        self.store()
            .get_user_by_email(email)
            .await
            .unwrap()
            .expect("user exists")
    }

    /// Registers through the web form and follows the emailed link.
    pub async fn register_verified(&self, email: &str) -> User {
        let mut client = self.client();
        let res = client
            .post_form(
                "/user/register/",
                &[
                    ("email", email),
                    ("first_name", "Test"),
                    ("last_name", "User"),
                    ("password1", PASSWORD),
                    ("password2", PASSWORD),
                    ("agreed_to_tos", "on"),
                ],
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "registration failed: {}", res.body);

        let link = self
            .sent_to(email)
            .iter()
            .rev()
            .find_map(|m| verification_path(&m.body))
            .expect("verification email");
        let res = client.get(&link).await;
        assert!(res.body.contains("verified your email address"));

        self.user(email).await
    }

    /// Registered, verified and logged in.
    pub async fn login_as(&self, email: &str) -> (TestClient, User) {
        let user = self.register_verified(email).await;
        let mut client = self.client();
        let res = client
            .post_form(
                "/user/login/",
                &[("username", email), ("password", PASSWORD)],
            )
            .await;
        assert_eq!(res.status, StatusCode::FOUND, "login failed: {}", res.body);
        (client, user)
    }

    pub async fn write_export(&self, relative: &str, content: &[u8]) {
        let path = self.exports_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

pub fn verification_path(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| line.contains("/user/verify-user/"))
        .and_then(|line| line.strip_prefix("https://case.law"))
        .map(ToString::to_string)
}

/// Carries the session cookie between requests.
pub struct TestClient {
    router: Router,
    cookie: Option<String>,
}

impl TestClient {
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(uri), Body::empty(), &[])
            .await
    }

    pub async fn get_with_headers(&mut self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.send(Request::builder().method("GET").uri(uri), Body::empty(), headers)
            .await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(encode_form(fields)),
            &[],
        )
        .await
    }

    async fn send(
        &mut self,
        builder: axum::http::request::Builder,
        body: Body,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let (res, cookie) = self.request(builder, body, headers).await;
        if let Some(cookie) = cookie {
            self.cookie = cookie;
        }
        res
    }

    async fn request(
        &self,
        mut builder: axum::http::request::Builder,
        body: Body,
        headers: &[(&str, &str)],
    ) -> (TestResponse, Option<Option<String>>) {
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        let cookie = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("id="))
            .map(|v| {
                let pair = v.split(';').next().unwrap_or_default().to_string();
                let expired = v.to_ascii_lowercase().contains("max-age=0");
                (!expired && pair != "id=").then_some(pair)
            });

        (
            TestResponse {
                status,
                headers,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            },
            cookie,
        )
    }
}

fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
