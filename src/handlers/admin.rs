// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        activity::{Activity, ActivityType, ContentType},
        badge::Award,
        email_feed::{FeedType, Frequency},
        post::{CreateRejectReasonRequest, PostRevision, RejectReason},
        repute::Repute,
        tag::Tag,
        user::{User, UserStatus},
        vote::Vote,
    },
    services::{activity::{self, NewActivity}, users},
    utils::{hash::hash_password, jwt::Claims},
};

#[derive(Debug, Deserialize)]
pub struct FeedSettingParams {
    pub feed_type: Option<String>,
    pub frequency: Option<String>,
    /// Substring of the subscriber's username.
    pub search: Option<String>,
}

#[derive(Debug, FromRow, Serialize)]
pub struct FeedSettingRow {
    pub id: i64,
    pub subscriber: String,
    pub feed_type: String,
    pub frequency: String,
    pub added_at: DateTime<Utc>,
    pub reported_at: Option<DateTime<Utc>>,
}

/// Lists email feed settings, ordered by subscriber.
/// Admin only.
pub async fn list_feed_settings(
    State(pool): State<SqlitePool>,
    Query(params): Query<FeedSettingParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT s.id, u.username AS subscriber, s.feed_type, s.frequency, s.added_at, s.reported_at
        FROM email_feed_settings s JOIN users u ON u.id = s.subscriber_id
        WHERE 1 = 1
        "#,
    );

    if let Some(raw) = params.feed_type.as_deref() {
        let feed = FeedType::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown feed type '{}'", raw)))?;
        builder.push(" AND s.feed_type = ").push_bind(feed.as_str());
    }
    if let Some(raw) = params.frequency.as_deref() {
        let frequency = Frequency::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown frequency '{}'", raw)))?;
        builder.push(" AND s.frequency = ").push_bind(frequency.as_str());
    }
    if let Some(search) = params.search.as_deref().filter(|s| !s.trim().is_empty()) {
        builder
            .push(" AND LOWER(u.username) LIKE ")
            .push_bind(format!("%{}%", search.trim().to_lowercase()));
    }
    builder.push(" ORDER BY u.username, s.feed_type");

    let rows = builder
        .build_query_as::<FeedSettingRow>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list feed settings: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct UpdateFeedSettingRequest {
    pub frequency: Frequency,
}

/// Changes the frequency of one feed setting.
/// Admin only.
pub async fn update_feed_setting(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateFeedSettingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE email_feed_settings SET frequency = ? WHERE id = ?")
        .bind(payload.frequency.as_str())
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Feed setting not found".to_string()));
    }

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct ThreadParams {
    pub language_code: Option<String>,
    pub closed: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, FromRow, Serialize)]
pub struct ThreadRow {
    pub id: i64,
    pub title: String,
    pub language_code: String,
    pub closed: bool,
}

/// Lists threads, ordered by title.
/// Admin only.
pub async fn list_threads(
    State(pool): State<SqlitePool>,
    Query(params): Query<ThreadParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, title, language_code, closed FROM threads WHERE 1 = 1");

    if let Some(language_code) = params.language_code {
        builder.push(" AND language_code = ").push_bind(language_code);
    }
    if let Some(closed) = params.closed {
        builder.push(" AND closed = ").push_bind(closed);
    }
    if let Some(search) = params.search.as_deref().filter(|s| !s.trim().is_empty()) {
        builder
            .push(" AND LOWER(title) LIKE ")
            .push_bind(format!("%{}%", search.trim().to_lowercase()));
    }
    builder.push(" ORDER BY title");

    let rows = builder
        .build_query_as::<ThreadRow>()
        .fetch_all(&pool)
        .await?;
    Ok(Json(rows))
}

pub async fn list_tags(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY name")
        .fetch_all(&pool)
        .await?;
    Ok(Json(rows))
}

pub async fn list_votes(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, Vote>("SELECT * FROM votes ORDER BY id DESC")
        .fetch_all(&pool)
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, FromRow, Serialize)]
pub struct FavoriteRow {
    pub id: i64,
    pub user_id: i64,
    pub thread_id: i64,
    pub added_at: DateTime<Utc>,
}

pub async fn list_favorites(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, FavoriteRow>("SELECT * FROM favorite_questions ORDER BY id DESC")
        .fetch_all(&pool)
        .await?;
    Ok(Json(rows))
}

pub async fn list_revisions(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, PostRevision>(
        "SELECT * FROM post_revisions ORDER BY post_id, revision",
    )
    .fetch_all(&pool)
    .await?;
    Ok(Json(rows))
}

pub async fn list_awards(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, Award>("SELECT * FROM awards ORDER BY id DESC")
        .fetch_all(&pool)
        .await?;
    Ok(Json(rows))
}

pub async fn list_reputes(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, Repute>("SELECT * FROM reputes ORDER BY id DESC")
        .fetch_all(&pool)
        .await?;
    Ok(Json(rows))
}

pub async fn list_activities(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, Activity>("SELECT * FROM activities ORDER BY id DESC")
        .fetch_all(&pool)
        .await?;
    Ok(Json(rows))
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify status).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(min = 3, max = 30, message = "Username length must be between 3 and 30 characters."))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 4, max = 128, message = "Password length must be between 4 and 128 characters."))]
    pub password: String,
    #[serde(default = "default_status")]
    pub status: UserStatus,
}

fn default_status() -> UserStatus {
    UserStatus::Approved
}

/// Creates a new user with a specific status.
/// Admin only.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let mut tx = pool.begin().await?;
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (username, email, password, status, date_joined)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(hashed_password)
    .bind(payload.status.code())
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::from(e)
        }
    })?;
    users::add_missing_subscriptions(&mut tx, id).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 3, max = 30, message = "Username length must be between 3 and 30 characters."))]
    pub username: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    pub status: Option<UserStatus>,
    #[validate(length(min = 4, max = 128, message = "Password length must be between 4 and 128 characters."))]
    pub password: Option<String>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.username.is_none()
        && payload.email.is_none()
        && payload.status.is_none()
        && payload.password.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(username) = payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username);
    }

    if let Some(email) = payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
        separated.push("email_isvalid = FALSE");
    }

    if let Some(status) = payload.status {
        separated.push("status = ");
        separated.push_bind_unseparated(status.code());
    }

    if let Some(password) = payload.password {
        separated.push("password = ");
        separated.push_bind_unseparated(hash_password(&password)?);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Username already exists".to_string())
        } else {
            tracing::error!("Failed to update user: {:?}", e);
            AppError::from(e)
        }
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM email_feed_settings WHERE subscriber_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    AppError::Conflict("User still owns content".to_string())
                }
                other => AppError::from(other),
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_reject_reasons(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, RejectReason>("SELECT * FROM post_flag_reasons ORDER BY title")
        .fetch_all(&pool)
        .await?;
    Ok(Json(rows))
}

/// Creates a post reject reason and records who did it.
/// Admin only.
pub async fn create_reject_reason(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRejectReasonRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let author_id = claims.user_id()?;

    let mut tx = pool.begin().await?;
    let reason = sqlx::query_as::<_, RejectReason>(
        r#"
        INSERT INTO post_flag_reasons (title, details, author_id, added_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(payload.title.trim())
    .bind(payload.details.trim())
    .bind(author_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    activity::record(
        &mut tx,
        &NewActivity::new(
            author_id,
            ActivityType::CreateRejectReason,
            ContentType::RejectReason,
            reason.id,
        )
        .summary(reason.title.clone()),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(reason_id = reason.id, author_id, "Reject reason created");
    Ok((StatusCode::CREATED, Json(reason)))
}
