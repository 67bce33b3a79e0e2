mod common;

use axum::http::StatusCode;
use common::spawn_app;

const HARVARD_FIELDS: &[(&str, &str)] = &[
    ("name", "Jane Crimson"),
    ("title", "Research Fellow"),
    ("area_of_interest", "Nineteenth century property law"),
];

const RESEARCH_FIELDS: &[(&str, &str)] = &[
    ("name", "Sam Scholar"),
    ("email", "spoofed@example.org"),
    ("institution", "State University"),
    ("title", "Professor"),
    ("area_of_interest", "Sentencing trends"),
];

#[tokio::test]
async fn non_harvard_users_are_sent_back_with_a_notice() {
    let app = spawn_app().await;
    let (mut client, user) = app.login_as("outsider@example.com").await;

    let res = client.get("/user/research/harvard/").await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/user/research/");

    let res = client.get("/user/research/").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("not currently using a harvard.edu email address"));

    // Shown once
    let res = client.get("/user/research/").await;
    assert!(!res.body.contains("not currently using a harvard.edu email address"));

    let res = client.post_form("/user/research/harvard/", HARVARD_FIELDS).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/user/research/");
    assert!(!app.user("outsider@example.com").await.harvard_access);
    assert!(
        app.store()
            .list_harvard_contracts_for_user(user.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn harvard_agreement_grants_access_immediately() {
    let app = spawn_app().await;
    let (mut client, user) = app.login_as("jane@harvard.edu").await;

    let res = client.get("/user/research/harvard/").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Sign Agreement"));

    let res = client.post_form("/user/research/harvard/", HARVARD_FIELDS).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/user/research/harvard/success/");

    assert!(app.user("jane@harvard.edu").await.harvard_access);

    let contracts = app
        .store()
        .list_harvard_contracts_for_user(user.id)
        .await
        .unwrap();
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts[0].name, "Jane Crimson");
    assert!(contracts[0].contract_html.contains("Research Fellow"));

    let mail = app.sent_to("jane@harvard.edu");
    let granted = mail.last().unwrap();
    assert_eq!(
        granted.subject,
        "Caselaw Access Project: Harvard research access"
    );
    assert!(granted.body.contains("Nineteenth century property law"));
}

#[tokio::test]
async fn harvard_form_reports_missing_fields() {
    let app = spawn_app().await;
    let (mut client, _) = app.login_as("blank@harvard.edu").await;

    let res = client
        .post_form("/user/research/harvard/", &[("name", "Blank Fields")])
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("This field is required."));
    assert!(res.body.contains("Blank Fields"));
    assert!(!app.user("blank@harvard.edu").await.harvard_access);
}

#[tokio::test]
async fn research_requests_go_through_an_approver() {
    let app = spawn_app().await;
    let (mut approver_client, approver) = app.login_as("approver@case.law").await;
    app.store()
        .set_contract_approver(approver.id, true)
        .await
        .unwrap();

    let (mut client, requester) = app.login_as("sam@state.example.edu").await;
    let res = client.post_form("/user/research/request/", RESEARCH_FIELDS).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), "/user/research/request/success/");

    let contracts = app
        .store()
        .list_research_contracts_for_user(requester.id)
        .await
        .unwrap();
    assert_eq!(contracts.len(), 1);
    let contract = &contracts[0];
    assert_eq!(contract.status, "pending");
    // The account address wins over whatever was submitted
    assert_eq!(contract.email, "sam@state.example.edu");

    let notice = app.sent_to("approver@case.law");
    let notice = notice.last().unwrap();
    assert_eq!(notice.subject, "Research access request from Sam Scholar");
    assert!(notice.body.contains(&format!(
        "Please approve or deny this application at https://case.law/user/research/approve/{}/",
        contract.id
    )));

    let approve_path = format!("/user/research/approve/{}/", contract.id);
    let contract_id = contract.id.to_string();

    // Requesters cannot review their own request
    let res = client.get(&approve_path).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = client
        .post_form(
            &approve_path,
            &[("contract_id", &contract_id), ("approve", "1")],
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = approver_client.get(&approve_path).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("State University"));
    assert!(res.body.contains("Approve"));

    let res = approver_client
        .post_form(
            &approve_path,
            &[("contract_id", &contract_id), ("deny", "1")],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Sam Scholar denied"));

    let denied = app.sent_to("sam@state.example.edu");
    let denied = denied.last().unwrap();
    assert_eq!(
        denied.subject,
        "Your Caselaw Access Project research request has been denied"
    );
    assert!(!app.user("sam@state.example.edu").await.unlimited_access);

    // A decided request stays decided
    let res = approver_client
        .post_form(
            &approve_path,
            &[("contract_id", &contract_id), ("approve", "1")],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("This request has already been denied."));
    assert!(!app.user("sam@state.example.edu").await.unlimited_access);

    assert!(app.store().reset_research_contract(contract.id).await.unwrap());

    let res = approver_client
        .post_form(
            &approve_path,
            &[("contract_id", &contract_id), ("approve", "1")],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Sam Scholar approved"));

    let sam = app.user("sam@state.example.edu").await;
    assert!(sam.unlimited_access_in_effect(chrono::Utc::now()));
    let until = sam.unlimited_access_until.unwrap();
    assert!(until > chrono::Utc::now() + chrono::Duration::days(364));

    let approved = app.sent_to("sam@state.example.edu");
    let approved = approved.last().unwrap();
    assert_eq!(
        approved.subject,
        "Your Caselaw Access Project research request has been approved"
    );

    let decided = app
        .store()
        .get_research_contract(contract.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(decided.status, "approved");
    assert_eq!(decided.approver_id, Some(approver.id));
    assert!(decided.approver_signature_date.is_some());

    let submitted = [
        "Sam Scholar",
        "State University",
        "Professor",
        "Sentencing trends",
        "sam@state.example.edu",
    ];
    for value in submitted {
        assert!(decided.contract_html.contains(value), "contract lacks {value}");
        assert!(approved.body.contains(value), "approval email lacks {value}");
    }
    assert!(!decided.contract_html.contains("spoofed@example.org"));

    let res = client.get("/user/details").await;
    assert!(res.body.contains("Unrestricted access"));
}

#[tokio::test]
async fn approval_form_must_name_the_contract_and_one_decision() {
    let app = spawn_app().await;
    let (mut approver_client, approver) = app.login_as("boss@case.law").await;
    app.store()
        .set_contract_approver(approver.id, true)
        .await
        .unwrap();

    let (mut client, requester) = app.login_as("applicant@example.org").await;
    client.post_form("/user/research/request/", RESEARCH_FIELDS).await;
    let contract = app
        .store()
        .list_research_contracts_for_user(requester.id)
        .await
        .unwrap()
        .remove(0);
    let approve_path = format!("/user/research/approve/{}/", contract.id);
    let contract_id = contract.id.to_string();

    let res = approver_client
        .post_form(&approve_path, &[("contract_id", "9999"), ("approve", "1")])
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = approver_client
        .post_form(
            &approve_path,
            &[("contract_id", &contract_id), ("approve", "1"), ("deny", "1")],
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = approver_client.get("/user/research/approve/9999/").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let still_pending = app
        .store()
        .get_research_contract(contract.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_pending.status, "pending");
}

#[tokio::test]
async fn requests_without_approvers_go_to_the_fallback_address() {
    let app = spawn_app().await;
    let (mut client, _) = app.login_as("lonely@example.org").await;

    let res = client.post_form("/user/research/request/", RESEARCH_FIELDS).await;
    assert_eq!(res.status, StatusCode::FOUND);

    let notice = app.sent_to("info@case.law");
    assert_eq!(notice.len(), 1);
    assert!(notice[0].body.contains("State University"));
}

#[tokio::test]
async fn research_form_requires_every_field() {
    let app = spawn_app().await;
    let (mut client, requester) = app.login_as("hasty@example.org").await;

    let res = client
        .post_form("/user/research/request/", &[("name", "Hasty")])
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("This field is required."));
    assert!(
        app.store()
            .list_research_contracts_for_user(requester.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn research_fields_reject_header_line_breaks() {
    let app = spawn_app().await;
    let (mut client, requester) = app.login_as("crlf@example.org").await;

    let res = client
        .post_form(
            "/user/research/request/",
            &[
                ("name", "Sam\r\nBcc: victim@evil.example"),
                ("institution", "State University"),
                ("title", "Professor"),
                ("area_of_interest", "Sentencing trends"),
            ],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("Enter a single line of text."));

    assert!(
        app.store()
            .list_research_contracts_for_user(requester.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        app.mailer
            .outbox()
            .iter()
            .all(|m| !m.subject.contains("Bcc") && !m.to.iter().any(|to| to.contains("evil")))
    );
}
