#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use listings_core::{
    auth::RegisterRequest, create_app_with_routes, create_routes, get_database_pool,
    run_migrations, AppConfig, AppState, UserPrincipal,
};
use tempfile::NamedTempFile;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-session-secret";

pub struct TestApp {
    pub state: AppState,
    pub app: Router,
    _database: NamedTempFile,
}

pub async fn test_state(configure: impl FnOnce(&mut AppConfig)) -> (AppState, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let database_url = format!("sqlite:{}", temp_file.path().display());
    let pool = get_database_pool(&database_url).await.unwrap();
    run_migrations(pool.clone()).await.unwrap();

    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.session.secret = SECRET.to_string();
    config.server.public_dir = temp_file.path().with_extension("public");
    configure(&mut config);

    (AppState::new(Arc::new(config), pool).unwrap(), temp_file)
}

pub async fn setup() -> TestApp {
    let (state, database) = test_state(|_| {}).await;
    TestApp::new(state, create_routes(), database)
}

impl TestApp {
    pub fn new(state: AppState, routes: Router<AppState>, database: NamedTempFile) -> Self {
        let app = create_app_with_routes(state.clone(), routes);
        Self {
            state,
            app,
            _database: database,
        }
    }

    pub fn browser(&self) -> Browser {
        Browser {
            app: self.app.clone(),
            cookie: None,
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> UserPrincipal {
        self.state
            .auth
            .register(RegisterRequest {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password: password.to_string(),
            })
            .await
            .unwrap()
    }
}

/// Drives the router like a browser: keeps the session cookie between
/// requests.
pub struct Browser {
    app: Router,
    pub cookie: Option<String>,
}

impl Browser {
    pub async fn send(&mut self, method: Method, uri: &str, form: Option<&[(&str, &str)]>) -> Response<Body> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let body = match form {
            Some(fields) => {
                request = request.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(encode_form(fields))
            }
            None => Body::empty(),
        };

        let response = self.app.clone().oneshot(request.body(body).unwrap()).await.unwrap();

        if let Some(set_cookie) = set_cookie(&response) {
            let pair = set_cookie.split(';').next().unwrap_or_default().to_string();
            if pair.ends_with('=') {
                self.cookie = None;
            } else {
                self.cookie = Some(pair);
            }
        }

        response
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, form: &[(&str, &str)]) -> Response<Body> {
        self.send(Method::POST, uri, Some(form)).await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Response<Body> {
        self.post("/login", &[("username", username), ("password", password)]).await
    }

    pub fn session_value(&self) -> Option<&str> {
        self.cookie.as_deref().and_then(|c| c.strip_prefix("session="))
    }
}

pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(name, value)| format!("{}={}", percent_encode(name), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn percent_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            b' ' => "+".to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}
