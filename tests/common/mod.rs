#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use usage_gateway::config::AppConfig;
use usage_gateway::database::models::Identity;
use usage_gateway::database::MemoryStore;
use usage_gateway::{app, AppState};

pub const TEST_SECRET: &str = "integration-test-secret";

/// Router wired to an in-process store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let state = AppState::new(AppConfig::for_testing(TEST_SECRET), store.clone());
        Self {
            router: app(state.clone()),
            state,
            store,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, token).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, uri, Some(body), token).await
    }

    /// Seed a user without going through password hashing and return a valid token for it.
    pub async fn seed_user(&self, username: &str, is_admin: bool) -> (i32, String) {
        let id = self.store.seed_identity(username, "unused-hash", is_admin).await;
        let token = self.token_for(id, username);
        (id, token)
    }

    pub fn token_for(&self, id: i32, username: &str) -> String {
        let identity = Identity {
            id,
            username: username.to_string(),
            password_hash: String::new(),
            is_admin: false,
        };
        self.state.tokens.issue(&identity).unwrap()
    }
}

/// Value of the `auth-token` cookie in a `Set-Cookie` header.
pub fn session_token(set_cookie: &str) -> Option<String> {
    let first = set_cookie.split(';').next()?;
    let (name, value) = first.split_once('=')?;
    (name.trim() == "auth-token" && !value.is_empty()).then(|| value.to_string())
}

/// Server bound to an ephemeral local port, for tests that talk real HTTP.
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
}

pub async fn spawn_server() -> Result<TestServer> {
    let test_app = TestApp::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;

    let router = test_app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });

    Ok(TestServer {
        base_url: format!("http://{}", addr),
        store: test_app.store,
    })
}
