mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    http::{header, Method, StatusCode},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use common::{body_string, set_cookie, setup, test_state, TestApp};
use listings_core::{
    create_routes,
    error::{AppError, GENERIC_MESSAGE, NOT_FOUND_MESSAGE},
    handlers::users::LOGGED_OUT,
    session::{SessionId, SessionRecord, SessionStore, StoreError},
    AppState, TemplateEngine,
};

async fn app_with_routes(extra: Router<AppState>) -> TestApp {
    let (state, database) = test_state(|_| {}).await;
    TestApp::new(state, create_routes().merge(extra), database)
}

#[tokio::test]
async fn test_new_visitor_gets_http_only_seven_day_cookie() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    let response = browser.get("/listings").await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response).expect("session cookie");
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=604800"));

    let expires = cookie
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("Expires="))
        .expect("Expires attribute");
    let expires = DateTime::parse_from_rfc2822(&expires.replace("GMT", "+0000"))
        .unwrap()
        .with_timezone(&Utc);
    let remaining = expires - Utc::now();
    assert!(remaining > chrono::Duration::days(7) - chrono::Duration::minutes(1));
    assert!(remaining <= chrono::Duration::days(7));
}

#[tokio::test]
async fn test_untouched_session_is_not_persisted() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    browser.get("/listings").await;

    let id = test_app
        .state
        .sessions
        .cookie()
        .verify(browser.session_value().unwrap())
        .unwrap();
    assert!(test_app.state.sessions.store().load(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_tampered_cookie_gets_a_fresh_session() {
    let test_app = setup().await;
    let mut browser = test_app.browser();
    browser.cookie = Some(format!("session={}.forged", SessionId::generate()));

    let response = browser.get("/listings").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_some());
    assert!(!browser.session_value().unwrap().ends_with(".forged"));
}

#[tokio::test]
async fn test_unmatched_route_renders_not_found_page() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    let response = browser.get("/nonexistent-path").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap().to_string();
    assert!(content_type.starts_with(mime::TEXT_HTML.as_ref()));
    assert!(body_string(response).await.contains(NOT_FOUND_MESSAGE));
}

#[tokio::test]
async fn test_every_method_and_path_falls_through_to_not_found() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    let purge = Method::from_bytes(b"PURGE").unwrap();
    let cases = [
        (Method::POST, "/nonexistent-path"),
        (Method::DELETE, "/listings"),
        (Method::PUT, "/login"),
        (purge, "/listings"),
        (Method::DELETE, "/listings/new"),
        (Method::GET, "/listings/1/reviews"),
        (Method::PUT, "/listings/1/reviews"),
    ];

    for (method, uri) in cases {
        let response = browser.send(method.clone(), uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert!(body_string(response).await.contains(NOT_FOUND_MESSAGE));
    }
}

#[tokio::test]
async fn test_domain_error_keeps_status_and_message() {
    let test_app = app_with_routes(Router::new().route(
        "/teapot",
        get(|| async { Err::<(), _>(AppError::domain(StatusCode::BAD_REQUEST, "Bad Request")) }),
    ))
    .await;
    let mut browser = test_app.browser();

    let response = browser.get("/teapot").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("Bad Request"));
    assert!(!body.contains(GENERIC_MESSAGE));
}

#[tokio::test]
async fn test_unclassified_error_hides_details() {
    let test_app = app_with_routes(Router::new().route(
        "/explode",
        get(|| async {
            Err::<(), _>(AppError::Other(anyhow::anyhow!("password=hunter2 at db-primary")))
        }),
    ))
    .await;
    let mut browser = test_app.browser();

    let response = browser.get("/explode").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(body.contains(GENERIC_MESSAGE));
    assert!(!body.contains("hunter2"));
}

#[tokio::test]
async fn test_handler_panic_is_rendered_as_generic_error() {
    let test_app = app_with_routes(Router::new().route(
        "/panic",
        get(|| async {
            let values: Vec<String> = Vec::new();
            values[3].clone()
        }),
    ))
    .await;
    let mut browser = test_app.browser();

    let response = browser.get("/panic").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_string(response).await.contains(GENERIC_MESSAGE));
}

#[tokio::test]
async fn test_extractor_rejection_is_rendered() {
    let test_app = setup().await;
    let mut browser = test_app.browser();
    test_app.register("delta-student", "helloworld").await;
    browser.login("delta-student", "helloworld").await;

    let response = browser.post("/listings", &[("listing[title]", "Only a title")]).await;
    assert!(response.status().is_client_error());
    assert!(body_string(response).await.contains("Wanderlust"));
}

#[tokio::test]
async fn test_error_page_render_failure_degrades_to_plain_text() {
    let (state, database) = test_state(|_| {}).await;
    let broken = TemplateEngine::from_raw(&[("error.html", "{{ missing.value }}")]).unwrap();
    let test_app = TestApp::new(state.with_templates(broken), create_routes(), database);
    let mut browser = test_app.browser();

    let response = browser.get("/nonexistent-path").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, NOT_FOUND_MESSAGE);
}

struct UnreachableStore;

#[async_trait]
impl SessionStore for UnreachableStore {
    async fn load(&self, _id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn save(&self, _record: &SessionRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn touch(&self, _id: &SessionId, _expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn destroy(&self, _id: &SessionId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_session_store_failure_does_not_fail_the_request() {
    let (state, database) = test_state(|_| {}).await;
    let state = state.with_session_store(Arc::new(UnreachableStore));
    let cookie = format!("session={}", state.sessions.cookie().sign(&SessionId::generate()));
    let test_app = TestApp::new(state, create_routes(), database);

    let mut browser = test_app.browser();
    browser.cookie = Some(cookie.clone());

    let response = browser.get("/listings").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_none());

    let response = browser.get("/logout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(browser.cookie.as_deref(), Some(cookie.as_str()));
}

#[tokio::test]
async fn test_health_endpoint() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    let response = browser.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database_status"], "healthy");
}

#[tokio::test]
async fn test_static_files_are_served() {
    let public = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(public.path().join("css")).unwrap();
    std::fs::write(public.path().join("css/style.css"), "body { margin: 0; }").unwrap();

    let public_dir = public.path().to_path_buf();
    let (state, database) = test_state(move |config| config.server.public_dir = public_dir).await;
    let test_app = TestApp::new(state, create_routes(), database);
    let mut browser = test_app.browser();

    let response = browser.get("/css/style.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "body { margin: 0; }");

    let response = browser.get("/css/missing.css").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.contains(NOT_FOUND_MESSAGE));
}

#[tokio::test]
async fn test_flash_survives_requests_that_render_nothing() {
    let public = tempfile::tempdir().unwrap();
    std::fs::write(public.path().join("robots.txt"), "User-agent: *").unwrap();

    let public_dir = public.path().to_path_buf();
    let (state, database) = test_state(move |config| config.server.public_dir = public_dir).await;
    let test_app = TestApp::new(state, create_routes(), database);
    let mut browser = test_app.browser();

    browser.get("/logout").await;
    assert_eq!(browser.get("/health").await.status(), StatusCode::OK);
    assert_eq!(browser.get("/robots.txt").await.status(), StatusCode::OK);

    let page = body_string(browser.get("/listings").await).await;
    assert!(page.contains(LOGGED_OUT));

    let page = body_string(browser.get("/listings").await).await;
    assert!(!page.contains(LOGGED_OUT));
}

#[tokio::test]
async fn test_not_found_page_shows_pending_flash() {
    let test_app = setup().await;
    let mut browser = test_app.browser();

    browser.get("/logout").await;
    let response = browser.get("/nonexistent-path").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.contains(LOGGED_OUT));
}
