// src/main.rs

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use askbot::config::Config;
use askbot::routes;
use askbot::services::{
    mail::{LogMailer, Mailer, SmtpMailer},
    notifications, users,
};
use askbot::state::AppState;
use askbot::utils::hash::hash_password;
use chrono::Utc;
use dotenvy::dotenv;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("DATABASE_URL is not a valid SQLite URL")
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(connect_options)
        .await
        .expect("Failed to open the database");

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed Admin User
    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => match SmtpMailer::new(smtp, config.default_from_email.clone()) {
            Ok(mailer) => {
                tracing::info!(host = %smtp.host, "Sending email over SMTP");
                Arc::new(mailer)
            }
            Err(e) => {
                tracing::error!("SMTP setup failed, logging emails instead: {:?}", e);
                Arc::new(LogMailer::new())
            }
        },
        None => {
            tracing::warn!("SMTP_HOST not set; emails will only be logged");
            Arc::new(LogMailer::new())
        }
    };

    let templates = notifications::load_templates().expect("Failed to load email templates");

    // Create AppState
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        mailer,
        templates: Arc::new(templates),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listening address");
    tracing::info!("Listening on {}", config.bind_addr);

    // Start the server
    axum::serve(listener, app).await.expect("Server error");
}

async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> anyhow::Result<()> {
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        let user_exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

        if user_exists.is_none() {
            tracing::info!("Seeding admin user: {}", username);
            let hashed_password = hash_password(password)
                .map_err(|e| anyhow::anyhow!("failed to hash admin password: {}", e))?;

            let mut tx = pool.begin().await?;
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO users (username, password, status, is_superuser, email_isvalid, date_joined)
                VALUES (?, ?, 'd', TRUE, FALSE, ?)
                RETURNING id
                "#,
            )
            .bind(username)
            .bind(hashed_password)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;
            users::add_missing_subscriptions(&mut tx, id).await?;
            tx.commit().await?;
            tracing::info!("Admin user created successfully.");
        }
    }
    Ok(())
}
