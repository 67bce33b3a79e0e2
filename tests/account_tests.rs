mod common;

use axum::http::StatusCode;
use common::{PASSWORD, spawn_app, spawn_app_with, verification_path};

#[tokio::test]
async fn registration_requires_email_verification() {
    let app = spawn_app().await;
    let mut client = app.client();

    let res = client
        .post_form(
            "/user/register/",
            &[
                ("email", "reader@example.com"),
                ("first_name", "Ada"),
                ("last_name", "Reader"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
                ("agreed_to_tos", "on"),
            ],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("reader@example.com"));

    let mail = app.sent_to("reader@example.com");
    assert_eq!(mail.len(), 1);
    assert_eq!(
        mail[0].subject,
        "Caselaw Access Project: Verify your email address"
    );
    assert!(mail[0].body.contains("Hello Ada"));

    let user = app.user("reader@example.com").await;
    assert!(!user.email_verified);
    assert_eq!(app.store().get_api_key(user.id).await.unwrap(), None);

    // Not verified yet
    let res = client
        .post_form(
            "/user/login/",
            &[("username", "reader@example.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("registered but not yet verified"));

    let link = verification_path(&mail[0].body).unwrap();
    let res = client.get(&link).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("verified your email address"));

    let user = app.user("reader@example.com").await;
    assert!(user.email_verified);
    assert_eq!(user.total_case_allowance, 500);
    let api_key = app.store().get_api_key(user.id).await.unwrap().unwrap();

    // Links are single-use
    let res = client.get(&link).await;
    assert!(res.body.contains("Verification failed"));

    let res = client
        .post_form(
            "/user/login/",
            &[("username", "reader@example.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/");

    let res = client.get("/user/details").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains(&api_key));
    assert!(res.body.contains("Cases remaining today: 500"));
    assert!(!res.body.contains("Unlimited access:"));
}

#[tokio::test]
async fn register_page_is_only_for_anonymous_visitors() {
    let app = spawn_app().await;
    let (mut client, _) = app.login_as("already@example.com").await;

    let res = client.get("/user/register/").await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/user/details");

    client.post_form("/user/logout/", &[]).await;

    let res = client.get("/user/register/").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(
        res.body
            .contains("<title>Register | Caselaw Access Project</title>")
    );
}

#[tokio::test]
async fn names_must_fit_on_one_line() {
    let app = spawn_app().await;
    let mut client = app.client();

    let res = client
        .post_form(
            "/user/register/",
            &[
                ("email", "crlf@example.com"),
                ("first_name", "Ada\r\nBcc: victim@evil.example"),
                ("last_name", "Reader"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
                ("agreed_to_tos", "on"),
            ],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Enter a single line of text."));
    assert!(
        app.store()
            .get_user_by_email("crlf@example.com")
            .await
            .unwrap()
            .is_none()
    );
    assert!(app.mailer.outbox().is_empty());
}

#[tokio::test]
async fn registration_form_errors() {
    let app = spawn_app().await;
    let mut client = app.client();

    let res = client
        .post_form(
            "/user/register/",
            &[
                ("email", "mismatch@example.com"),
                ("password1", PASSWORD),
                ("password2", "something else entirely"),
            ],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("This field is required."));
    assert!(
        app.store()
            .get_user_by_email("mismatch@example.com")
            .await
            .unwrap()
            .is_none()
    );
    assert!(app.mailer.outbox().is_empty());

    let res = client
        .post_form(
            "/user/register/",
            &[
                ("email", "not an email"),
                ("first_name", "A"),
                ("last_name", "B"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
                ("agreed_to_tos", "on"),
            ],
        )
        .await;
    assert!(res.body.contains("Enter a valid email address."));
}

#[tokio::test]
async fn duplicate_addresses_are_rejected_after_normalization() {
    let app = spawn_app().await;
    app.register_verified("jane.doe@gmail.com").await;

    let mut client = app.client();
    let res = client
        .post_form(
            "/user/register/",
            &[
                ("email", "JaneDoe+cases@googlemail.com"),
                ("first_name", "Jane"),
                ("last_name", "Doe"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
                ("agreed_to_tos", "on"),
            ],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(
        res.body
            .contains("A user with the same email address has already registered.")
    );
    assert!(app.sent_to("janedoe+cases@googlemail.com").is_empty());
}

#[tokio::test]
async fn blocked_domains_cannot_register() {
    let app = spawn_app().await;
    assert!(app.store().block_domain("Spam.Example").await.unwrap());

    let mut client = app.client();
    let res = client
        .post_form(
            "/user/register/",
            &[
                ("email", "someone@mail.spam.example"),
                ("first_name", "Some"),
                ("last_name", "One"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
                ("agreed_to_tos", "on"),
            ],
        )
        .await;
    assert!(res.body.contains("This email address is invalid."));
    assert!(app.mailer.outbox().is_empty());
}

#[tokio::test]
async fn resend_verification_repeats_the_pending_link() {
    let app = spawn_app().await;
    let mut client = app.client();
    client
        .post_form(
            "/user/register/",
            &[
                ("email", "late@example.com"),
                ("first_name", "Late"),
                ("last_name", "Reader"),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
                ("agreed_to_tos", "on"),
            ],
        )
        .await;

    let res = client
        .post_form("/user/resend-verification/", &[("email", "late@example.com")])
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let mail = app.sent_to("late@example.com");
    assert_eq!(mail.len(), 2);
    let first = verification_path(&mail[0].body).unwrap();
    let second = verification_path(&mail[1].body).unwrap();
    assert_eq!(first, second);
    assert_eq!(mail[0].body, mail[1].body);

    let res = client.get(&second).await;
    assert!(res.body.contains("verified your email address"));

    // Verified accounts get nothing further
    client
        .post_form("/user/resend-verification/", &[("email", "late@example.com")])
        .await;
    assert_eq!(app.sent_to("late@example.com").len(), 2);

    // Unknown addresses get the same page and no mail
    let res = client
        .post_form("/user/resend-verification/", &[("email", "nobody@example.com")])
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(app.sent_to("nobody@example.com").is_empty());
}

#[tokio::test]
async fn anonymous_pages_redirect_to_login() {
    let app = spawn_app().await;
    let mut client = app.client();

    let res = client.get("/user/details").await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/user/login/?next=%2Fuser%2Fdetails");

    let res = client.get("/user/research/request/").await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert!(res.location().starts_with("/user/login/?next="));
}

#[tokio::test]
async fn login_follows_only_local_next_urls() {
    let app = spawn_app().await;
    app.register_verified("nav@example.com").await;

    let mut client = app.client();
    let res = client
        .post_form(
            "/user/login/?next=/user/details",
            &[("username", "nav@example.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/user/details");

    let mut client = app.client();
    let res = client
        .post_form(
            "/user/login/",
            &[
                ("username", "nav@example.com"),
                ("password", PASSWORD),
                ("next", "//evil.example/"),
            ],
        )
        .await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/");

    let mut client = app.client();
    let res = client
        .post_form(
            "/user/login/",
            &[("username", "nav@example.com"), ("password", "wrong password")],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Please enter a correct email and password."));
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = spawn_app().await;
    let (mut client, _) = app.login_as("leaving@example.com").await;

    assert_eq!(client.get("/user/details").await.status, StatusCode::OK);

    let res = client.post_form("/user/logout/", &[]).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/");

    assert_eq!(client.get("/user/details").await.status, StatusCode::FOUND);
}

#[tokio::test]
async fn api_key_reset_replaces_the_key_and_notifies() {
    let app = spawn_app().await;
    let (mut client, user) = app.login_as("rotate@example.com").await;
    let old_key = app.store().get_api_key(user.id).await.unwrap().unwrap();

    let res = client.get("/user/reset-api-key/").await;
    assert!(res.body.contains("cannot be undone"));

    let res = client.post_form("/user/reset-api-key/", &[]).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/user/details");

    let new_key = app.store().get_api_key(user.id).await.unwrap().unwrap();
    assert_ne!(old_key, new_key);

    let details = client.get("/user/details").await;
    assert!(details.body.contains(&new_key));
    assert!(!details.body.contains(&old_key));

    let mail = app.sent_to("rotate@example.com");
    let reset = mail.last().unwrap();
    assert_eq!(reset.subject, "Your Case.law API key has been reset");
    assert!(reset.body.contains("Your Case.law API key reset is complete"));

    let res = client
        .get_with_headers("/api/v1/cases/1/", &[("X-Api-Key", &old_key)])
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deleting_an_account_deactivates_it() {
    let app = spawn_app().await;
    let (mut client, user) = app.login_as("gone@example.com").await;

    let res = client.post_form("/user/delete-account/", &[]).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/");

    let stored = app.store().get_user(user.id).await.unwrap().unwrap();
    assert!(stored.deactivated_by_user);
    assert!(stored.deactivated_date.is_some());
    assert_eq!(app.store().get_api_key(user.id).await.unwrap(), None);

    assert_eq!(client.get("/user/details").await.status, StatusCode::FOUND);

    let mut client = app.client();
    let res = client
        .post_form(
            "/user/login/",
            &[("username", "gone@example.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Please enter a correct email and password."));
}

#[tokio::test]
async fn daily_allowance_comes_from_config() {
    let app = spawn_app_with(|config| config.accounts.daily_case_allowance = 25).await;
    let user = app.register_verified("small@example.com").await;
    assert_eq!(user.total_case_allowance, 25);
    assert_eq!(user.case_allowance_remaining, 25);
}
