#![cfg(feature = "server")]

use std::sync::Arc;

use api::config::Settings;
use api::mail::{MailError, Mailer, OtpMessage, OutboxMailer};
use api::{router, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use store::{MemoryStore, UserStore};
use tower::ServiceExt;

// ─── Test helpers ───────────────────────────────────────────────────────

struct TestApp {
    router: Router,
    outbox: OutboxMailer,
    state: Arc<AppState>,
}

fn app_with(settings: Settings) -> TestApp {
    let outbox = OutboxMailer::new();
    let state = Arc::new(
        AppState::new(settings, Arc::new(MemoryStore::new()), Arc::new(outbox.clone())).unwrap(),
    );
    TestApp {
        router: router(state.clone()),
        outbox,
        state,
    }
}

fn app() -> TestApp {
    app_with(Settings::default())
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &TestApp, req: Request<Body>) -> Response {
    app.router.clone().oneshot(req).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn signup(app: &TestApp, name: &str, email: &str) -> String {
    let response = send(
        app,
        request(
            Method::POST,
            "/api/signup",
            None,
            Some(json!({"name": name, "dob": "2000-01-01", "email": email})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

async fn create_note(app: &TestApp, token: &str, title: &str) -> StatusCode {
    send(
        app,
        request(
            Method::POST,
            "/api/notes",
            Some(token),
            Some(json!({"title": title, "content": "body"})),
        ),
    )
    .await
    .status()
}

async fn list_notes(app: &TestApp, token: &str) -> Vec<Value> {
    let response = send(app, request(Method::GET, "/api/notes", Some(token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["notes"].as_array().unwrap().clone()
}

// ─── Accounts ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_signup_and_notes_scenario() {
    let app = app();
    let token = signup(&app, "Ann", "ann@x.com").await;

    assert!(list_notes(&app, &token).await.is_empty());

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/notes",
            Some(&token),
            Some(json!({"title": "A", "content": "B"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Note saved");

    let notes = list_notes(&app, &token).await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["title"], "A");
    assert_eq!(notes[0]["content"], "B");
    assert_eq!(notes[0]["email"], "ann@x.com");
    assert!(notes[0]["createdAt"].is_string());
}

#[tokio::test]
async fn test_me_returns_signed_up_user() {
    let app = app();
    let token = signup(&app, "Ann", "Ann@X.com").await;

    let response = send(&app, request(Method::GET, "/api/me", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "ann@x.com");
    assert_eq!(body["user"]["name"], "Ann");
    assert_eq!(body["user"]["dob"], "2000-01-01");
    assert_eq!(body["user"]["provider"], "email");
    assert!(body.get("token").is_none());

    // An empty POST behaves like GET.
    let response = send(&app, request(Method::POST, "/api/me", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["email"], "ann@x.com");
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let app = app();
    signup(&app, "Ann", "ann@x.com").await;

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/signup",
            None,
            Some(json!({"name": "Other", "dob": "1999-12-31", "email": "ann@x.com"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Email already exists");
}

#[tokio::test]
async fn test_signup_missing_fields() {
    let app = app();
    let response = send(
        &app,
        request(Method::POST, "/api/signup", None, Some(json!({"email": "ann@x.com"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_signin() {
    let app = app();

    let response = send(
        &app,
        request(Method::POST, "/api/signin", None, Some(json!({"email": "ann@x.com"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    signup(&app, "Ann", "ann@x.com").await;
    let response = send(
        &app,
        request(Method::POST, "/api/signin", None, Some(json!({"email": "ann@x.com"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"].as_str().unwrap().to_string();
    assert!(list_notes(&app, &token).await.is_empty());
}

// ─── OTP ────────────────────────────────────────────────────────────────

async fn send_otp(app: &TestApp, email: &str, otp: &str, mode: &str) -> StatusCode {
    send(
        app,
        request(
            Method::POST,
            "/api/send-otp",
            None,
            Some(json!({"email": email, "otp": otp, "mode": mode})),
        ),
    )
    .await
    .status()
}

#[tokio::test]
async fn test_send_otp_rules() {
    let app = app();

    assert_eq!(send_otp(&app, "ann@x.com", "123456", "signup").await, StatusCode::OK);
    assert_eq!(app.outbox.last_code_for("ann@x.com").as_deref(), Some("123456"));
    assert_eq!(send_otp(&app, "ann@x.com", "123456", "signin").await, StatusCode::NOT_FOUND);

    signup(&app, "Ann", "ann@x.com").await;
    assert_eq!(send_otp(&app, "ann@x.com", "123456", "signup").await, StatusCode::CONFLICT);
    assert_eq!(send_otp(&app, "ann@x.com", "123456", "signin").await, StatusCode::OK);

    assert_eq!(send_otp(&app, "ann@x.com", "", "signin").await, StatusCode::BAD_REQUEST);
    assert_eq!(send_otp(&app, "ann@x.com", "12ab56", "signin").await, StatusCode::BAD_REQUEST);
    // Unknown mode is rejected while decoding the body.
    assert_eq!(send_otp(&app, "ann@x.com", "123456", "reset").await, StatusCode::BAD_REQUEST);
}

struct BrokenMailer;

#[async_trait]
impl Mailer for BrokenMailer {
    async fn send(&self, _message: OtpMessage) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

#[tokio::test]
async fn test_mail_failure_is_server_error() {
    let state = AppState::new(
        Settings::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(BrokenMailer),
    )
    .unwrap();
    let router = router(Arc::new(state));

    let response = router
        .oneshot(request(
            Method::POST,
            "/api/send-otp",
            None,
            Some(json!({"email": "ann@x.com", "otp": "123456", "mode": "signup"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Failed to send OTP. Please try again later.");
}

#[tokio::test]
async fn test_enforced_otp_signup() {
    let mut settings = Settings::default();
    settings.otp.require_verification = true;
    let app = app_with(settings);

    let signup_body = |otp: &str| {
        json!({"name": "Ann", "dob": "2000-01-01", "email": "ann@x.com", "otp": otp})
    };

    let response = send(
        &app,
        request(Method::POST, "/api/signup", None, Some(signup_body("123456"))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/send-otp",
            None,
            Some(json!({"email": "ann@x.com", "mode": "signup"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let code = app.outbox.last_code_for("ann@x.com").unwrap();
    let response = send(
        &app,
        request(Method::POST, "/api/signup", None, Some(signup_body(&code))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_enforced_otp_rejects_self_chosen_code() {
    let mut settings = Settings::default();
    settings.otp.require_verification = true;
    let app = app_with(settings);

    app.state
        .store
        .insert_user(store::NewUser {
            name: Some("Ann".to_string()),
            email: "ann@x.com".to_string(),
            date_of_birth: None,
            image: None,
            provider: store::AuthProvider::Email,
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    // Someone other than the mailbox owner asks for a code of their choosing.
    let chosen = "111111";
    let mut mailed = String::new();
    for _ in 0..3 {
        assert_eq!(send_otp(&app, "ann@x.com", chosen, "signin").await, StatusCode::OK);
        mailed = app.outbox.last_code_for("ann@x.com").unwrap();
        if mailed != chosen {
            break;
        }
    }
    assert_ne!(mailed, chosen);

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/signin",
            None,
            Some(json!({"email": "ann@x.com", "otp": chosen})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["success"], false);

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/signin",
            None,
            Some(json!({"email": "ann@x.com", "otp": mailed})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ─── Tokens and ownership ───────────────────────────────────────────────

#[tokio::test]
async fn test_notes_require_valid_token() {
    let app = app();
    let token = signup(&app, "Ann", "ann@x.com").await;

    let response = send(&app, request(Method::GET, "/api/notes", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (unsigned, signature) = token.rsplit_once('.').unwrap();
    let flipped = if signature.starts_with('A') { 'B' } else { 'A' };
    let tampered = format!("{unsigned}.{flipped}{}", &signature[1..]);
    let response = send(&app, request(Method::GET, "/api/notes", Some(&tampered), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(create_note(&app, &tampered, "A").await, StatusCode::UNAUTHORIZED);

    let expired = app
        .state
        .auth
        .tokens()
        .issue(
            "ann@x.com",
            api::auth::TokenKind::Session,
            chrono::Duration::seconds(-5),
        )
        .unwrap();
    let response = send(&app, request(Method::GET, "/api/me", Some(&expired), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_notes_are_isolated_between_users() {
    let app = app();
    let ann = signup(&app, "Ann", "ann@x.com").await;
    let bob = signup(&app, "Bob", "bob@x.com").await;

    assert_eq!(create_note(&app, &ann, "A").await, StatusCode::CREATED);
    assert!(list_notes(&app, &bob).await.is_empty());

    let id = list_notes(&app, &ann).await[0]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/notes/{id}");

    let response = send(&app, request(Method::DELETE, &uri, Some(&bob), None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(list_notes(&app, &ann).await.len(), 1);

    let response = send(&app, request(Method::DELETE, &uri, Some(&ann), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Note deleted");

    let response = send(&app, request(Method::DELETE, &uri, Some(&ann), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, request(Method::DELETE, "/api/notes/nope", Some(&ann), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notes_listed_newest_first() {
    let app = app();
    let token = signup(&app, "Ann", "ann@x.com").await;

    for title in ["one", "two", "three"] {
        assert_eq!(create_note(&app, &token, title).await, StatusCode::CREATED);
    }

    let titles: Vec<String> = list_notes(&app, &token)
        .await
        .iter()
        .map(|n| n["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["three", "two", "one"]);
}

#[tokio::test]
async fn test_empty_note_is_rejected() {
    let app = app();
    let token = signup(&app, "Ann", "ann@x.com").await;

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/notes",
            Some(&token),
            Some(json!({"title": "  ", "content": "B"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(list_notes(&app, &token).await.is_empty());
}

// ─── Federated session refresh ──────────────────────────────────────────

#[tokio::test]
async fn test_federated_assertion_exchange() {
    let app = app();
    let identity = api::accounts::FederatedIdentity {
        email: "bob@x.com".to_string(),
        name: Some("Bob".to_string()),
        picture: None,
    };
    let (_, assertion) = api::accounts::reconcile_federated(&app.state, identity)
        .await
        .unwrap();

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/me",
            None,
            Some(json!({"email": "bob@x.com", "assertion": assertion})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "bob@x.com");
    assert_eq!(body["user"]["provider"], "google");
    assert!(body["user"]["dob"].is_null());

    let token = body["token"].as_str().unwrap().to_string();
    assert!(list_notes(&app, &token).await.is_empty());

    // The same assertion does not vouch for another address.
    signup(&app, "Ann", "ann@x.com").await;
    let response = send(
        &app,
        request(
            Method::POST,
            "/api/me",
            None,
            Some(json!({"email": "ann@x.com", "assertion": assertion})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Nor does an email on its own.
    let response = send(
        &app,
        request(Method::POST, "/api/me", None, Some(json!({"email": "bob@x.com"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_google_login_unconfigured() {
    let app = app();
    let response = send(&app, request(Method::GET, "/api/auth/google", None, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_google_login_redirects() {
    let mut settings = Settings::default();
    settings.google = Some(api::config::GoogleSettings {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_url: "http://localhost:8080/auth/google/callback".to_string(),
        success_redirect: "/dashboard".to_string(),
    });
    let app = app_with(settings);

    let response = send(&app, request(Method::GET, "/api/auth/google", None, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.google.com/"));

    // A callback with a state that was never issued fails back to the app.
    let response = send(
        &app,
        request(Method::GET, "/auth/google/callback?code=abc&state=forged", None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert_eq!(location, "/dashboard#error=oauth_error");
}

// ─── Fallbacks ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_route_and_wrong_method() {
    let app = app();

    let response = send(&app, request(Method::GET, "/api/nothing", None, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["success"], false);

    let response = send(&app, request(Method::PUT, "/api/notes", None, None)).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Method not allowed");
}
