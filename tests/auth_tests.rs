// tests/auth_tests.rs

mod common;

use askbot::{config::ForumSettings, routes};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::{spawn_app, test_state, unique_name};
use serde_json::{Value, json};
use tower::ServiceExt;

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app.get("/random_path_that_does_not_exist", None).await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_sends_welcome_email() {
    let app = spawn_app().await;
    let username = unique_name("u");

    let response = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "username": username,
                "email": format!("{}@example.org", username),
                "password": "password123"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 201);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["status"], "a");
    assert!(user.get("reputation").is_none());
    assert!(user.get("password").is_none());
    assert!(user.get("email").is_none());

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, format!("{}@example.org", username));
    let reply_to = sent[0].reply_to.clone().unwrap();
    assert!(reply_to.starts_with("welcome-"));
    assert!(reply_to.ends_with("@localhost"));

    let (validation_sent,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM activities WHERE activity_type = 28 AND user_id = ?")
            .bind(user["id"].as_i64().unwrap())
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(validation_sent, 1);

    let (feeds,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM email_feed_settings WHERE subscriber_id = ?")
            .bind(user["id"].as_i64().unwrap())
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(feeds, 5);
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    let app = spawn_app().await;
    let user = app.register("dup").await;

    let duplicate = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "username": user.username,
                "email": "other@example.org",
                "password": "password123"
            }),
        )
        .await;
    assert_eq!(duplicate.status().as_u16(), 409);

    let short_name = app
        .post(
            "/api/auth/register",
            None,
            json!({ "username": "yo", "email": "yo@example.org", "password": "password123" }),
        )
        .await;
    assert_eq!(short_name.status().as_u16(), 400);

    let bad_email = app
        .post(
            "/api/auth/register",
            None,
            json!({ "username": unique_name("e"), "email": "nope", "password": "password123" }),
        )
        .await;
    assert_eq!(bad_email.status().as_u16(), 400);
}

#[tokio::test]
async fn login_checks_password_and_records_visit() {
    let app = spawn_app().await;
    let user = app.register("login").await;

    let wrong = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": user.username, "password": "wrong-password" }),
        )
        .await;
    assert_eq!(wrong.status().as_u16(), 401);

    let (last_seen, visits): (Option<String>, i64) = sqlx::query_as(
        "SELECT last_seen, consecutive_days_visit_count FROM users WHERE id = ?",
    )
    .bind(user.id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert!(last_seen.is_some());
    assert_eq!(visits, 1);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = spawn_app().await;

    let anonymous = app
        .post("/api/questions", None, json!({ "title": "x", "text": "y", "tags": ["z"] }))
        .await;
    assert_eq!(anonymous.status().as_u16(), 401);

    let forged = app.get("/api/messages", Some("not-a-token")).await;
    assert_eq!(forged.status().as_u16(), 401);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = spawn_app().await;

    let response = app.get("/api-docs/openapi.json", None).await;

    assert_eq!(response.status().as_u16(), 200);
    let doc: Value = response.json().await.unwrap();
    assert!(doc["paths"]["/api/auth/register"].is_object());
    assert!(doc["components"]["schemas"]["VoteResponse"].is_object());
}

#[tokio::test]
async fn cors_preflight_allows_the_site_origin() {
    let (state, _mailer) = test_state(ForumSettings::default()).await;
    let app = routes::create_router(state);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/questions")
        .header(header::ORIGIN, "http://ask.example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://ask.example.org"
    );

    let foreign = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/questions")
        .header(header::ORIGIN, "http://evil.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(foreign).await.unwrap();
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}
