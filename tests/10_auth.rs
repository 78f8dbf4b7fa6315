mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{session_token, TestApp};
use usage_gateway::auth::TokenCodec;
use usage_gateway::database::models::Identity;

#[tokio::test]
async fn register_login_and_wrong_password() {
    let app = TestApp::new();

    let res = app
        .post("/register", json!({ "username": "a@b.com", "password": "pw1" }), None)
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["success"], true);
    let user_id = res.body["data"]["userId"].as_i64().unwrap();
    assert!(user_id > 0);

    let res = app
        .post("/login", json!({ "username": "a@b.com", "password": "pw1" }), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["isAdmin"], false);
    let cookie = res.set_cookie().expect("session cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(session_token(cookie).is_some());
    // token only travels in the cookie
    assert!(res.body["data"].get("token").is_none());

    let res = app
        .post("/login", json!({ "username": "a@b.com", "password": "wrong" }), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["error"], "Invalid username or password");
    assert!(res.set_cookie().is_none());
}

#[tokio::test]
async fn unknown_user_gets_same_login_error() {
    let app = TestApp::new();
    app.post("/register", json!({ "username": "a@b.com", "password": "pw1" }), None)
        .await;

    let unknown = app
        .post("/login", json!({ "username": "zz@b.com", "password": "pw1" }), None)
        .await;
    let wrong = app
        .post("/login", json!({ "username": "a@b.com", "password": "nope" }), None)
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body, wrong.body);
}

#[tokio::test]
async fn registration_rejects_bad_and_duplicate_usernames() {
    let app = TestApp::new();

    let res = app
        .post("/register", json!({ "username": "not-an-email", "password": "pw" }), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post("/register", json!({ "username": "a@b.com" }), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    app.post("/register", json!({ "username": "a@b.com", "password": "pw1" }), None)
        .await;
    let res = app
        .post("/register", json!({ "username": "a@b.com", "password": "pw2" }), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Username already exists");
}

#[tokio::test]
async fn protected_route_requires_a_token() {
    let app = TestApp::new();

    let res = app.get("/me", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Access denied. No token provided.");

    let res = app.get("/me", Some("not-a-token")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["error"], "Invalid token");
}

#[tokio::test]
async fn expired_token_is_forbidden() {
    let app = TestApp::new();
    let (id, _) = app.seed_user("a@b.com", false).await;

    let identity = Identity {
        id,
        username: "a@b.com".to_string(),
        password_hash: String::new(),
        is_admin: false,
    };
    let stale = app
        .state
        .tokens
        .issue_at(&identity, Utc::now() - Duration::hours(2))
        .unwrap();

    let res = app.get("/me", Some(&stale)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn token_from_other_secret_is_forbidden() {
    let app = TestApp::new();
    let (id, _) = app.seed_user("a@b.com", false).await;

    let foreign = TokenCodec::new("some-other-secret", 3600)
        .issue(&Identity {
            id,
            username: "a@b.com".to_string(),
            password_hash: String::new(),
            is_admin: false,
        })
        .unwrap();

    let res = app.get("/me", Some(&foreign)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn me_accepts_cookie_or_bearer() {
    let app = TestApp::new();
    let (id, token) = app.seed_user("a@b.com", false).await;

    let res = app.get("/me", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["id"], id);
    assert_eq!(res.body["data"]["username"], "a@b.com");
    assert!(res.body["data"].get("password").is_none());
    assert!(res.body["data"].get("password_hash").is_none());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/me")
        .header(header::COOKIE, format!("auth-token={}", token))
        .body(Body::empty())
        .unwrap();
    let res = app.send(request).await;
    assert_eq!(res.status, StatusCode::OK);

    // A valid cookie wins over a bad bearer header.
    let request = Request::builder()
        .method(Method::GET)
        .uri("/me")
        .header(header::COOKIE, format!("auth-token={}", token))
        .header(header::AUTHORIZATION, "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    let res = app.send(request).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_clears_cookie() {
    let app = TestApp::new();
    let res = app.get("/logout", None).await;
    assert_eq!(res.status, StatusCode::OK);
    let cookie = res.set_cookie().unwrap();
    assert!(cookie.starts_with("auth-token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn update_user_changes_one_field_of_the_caller() {
    let app = TestApp::new();
    let (id, token) = app.seed_user("a@b.com", false).await;
    app.seed_user("taken@b.com", false).await;

    let res = app
        .request(
            Method::PUT,
            "/update-user",
            Some(json!({ "username": "new@b.com" })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["user"]["id"], id);
    assert_eq!(res.body["data"]["user"]["username"], "new@b.com");

    let res = app
        .request(
            Method::PUT,
            "/update-user",
            Some(json!({ "username": "taken@b.com" })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .request(
            Method::PUT,
            "/update-user",
            Some(json!({ "username": "x@b.com", "password": "pw" })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .request(
            Method::PUT,
            "/update-user",
            Some(json!({ "is_admin": "true" })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.get("/me", Some(&token)).await;
    assert_eq!(res.body["data"]["username"], "new@b.com");
    assert_eq!(res.body["data"]["is_admin"], false);
}

#[tokio::test]
async fn password_update_allows_login_with_new_password() {
    let app = TestApp::new();
    app.post("/register", json!({ "username": "a@b.com", "password": "old" }), None)
        .await;
    let res = app
        .post("/login", json!({ "username": "a@b.com", "password": "old" }), None)
        .await;
    let token = session_token(res.set_cookie().unwrap()).unwrap();

    let res = app
        .request(
            Method::PUT,
            "/update-user",
            Some(json!({ "password": "new" })),
            Some(&token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .post("/login", json!({ "username": "a@b.com", "password": "new" }), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn delete_user_removes_caller_and_clears_cookie() {
    let app = TestApp::new();
    let (_, token) = app.seed_user("a@b.com", false).await;

    let res = app.request(Method::DELETE, "/delete-user", None, Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.set_cookie().unwrap().contains("Max-Age=0"));

    // The token is still well-formed, but the identity is gone.
    let res = app.get("/me", Some(&token)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    // Deleting again is not an error.
    let res = app.request(Method::DELETE, "/delete-user", None, Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn listing_users_is_admin_only() {
    let app = TestApp::new();
    let (_, admin) = app.seed_user("root@b.com", true).await;
    let (_, user) = app.seed_user("a@b.com", false).await;

    let res = app.get("/get-users", Some(&user)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/get-users", Some(&admin)).await;
    assert_eq!(res.status, StatusCode::OK);
    let users = res.body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password").is_none()));
}
