// tests/common/mod.rs

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use askbot::{
    config::{Config, ForumSettings},
    routes,
    services::{mail::LogMailer, notifications},
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub mailer: Arc<LogMailer>,
    pub client: reqwest::Client,
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

/// Helper function to spawn the app on a random port for testing.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(ForumSettings::default()).await
}

/// In-memory database plus the state the router runs on.
pub async fn test_state(forum: ForumSettings) -> (AppState, Arc<LogMailer>) {
    // A single connection that never expires keeps the in-memory database alive.
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        bind_addr: "127.0.0.1:0".to_string(),
        site_url: "http://ask.example.org".to_string(),
        app_short_name: "Askbot".to_string(),
        default_from_email: "noreply@example.org".to_string(),
        smtp: None,
        forum,
    };

    let mailer = Arc::new(LogMailer::new());
    let state = AppState {
        pool,
        config,
        mailer: mailer.clone(),
        templates: Arc::new(notifications::load_templates().expect("templates load")),
    };
    (state, mailer)
}

pub async fn spawn_app_with(forum: ForumSettings) -> TestApp {
    let (state, mailer) = test_state(forum).await;
    let pool = state.pool.clone();
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        mailer,
        client: reqwest::Client::new(),
    }
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.put(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.delete(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("Failed to execute request")
    }

    /// Registers and logs in a fresh user.
    pub async fn register(&self, prefix: &str) -> TestUser {
        let username = unique_name(prefix);
        let response = self
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
        let id = user["id"].as_i64().unwrap();

        let token = self.login(&username).await;
        TestUser {
            id,
            username,
            token,
        }
    }

    pub async fn login(&self, username: &str) -> String {
        let response = self
            .post(
                "/api/auth/login",
                None,
                json!({ "username": username, "password": "password123" }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Changes a user's status directly; log in again to refresh the role claim.
    pub async fn set_status(&self, user_id: i64, status: &str) {
        sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn set_reputation(&self, user_id: i64, reputation: i64) {
        sqlx::query("UPDATE users SET reputation = ? WHERE id = ?")
            .bind(reputation)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn reputation_of(&self, user_id: i64) -> i64 {
        let (rep,): (i64,) = sqlx::query_as("SELECT reputation FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .unwrap();
        rep
    }

    /// Posts a question and returns its JSON.
    pub async fn ask(&self, user: &TestUser, title: &str, tags: &[&str]) -> Value {
        let response = self
            .post(
                "/api/questions",
                Some(&user.token),
                json!({
                    "title": title,
                    "text": format!("{} - more details in the body", title),
                    "tags": tags,
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    pub async fn answer(&self, user: &TestUser, question_id: i64, text: &str) -> Value {
        let response = self
            .post(
                &format!("/api/questions/{}/answers", question_id),
                Some(&user.token),
                json!({ "text": text }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }
}
