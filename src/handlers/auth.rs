// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, User},
    services::{notifications, users},
    state::AppState,
    utils::{hash::verify_password, jwt::sign_jwt},
};

/// Registers a new user.
///
/// Creates default email subscriptions and sends the welcome / validation email.
/// Returns 201 Created and the user object (excluding password and email).
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let user = users::register(&mut tx, &state.config.forum, &payload).await?;
    tx.commit().await?;

    notifications::send_welcome_email(&state, &user).await;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// A successful login counts as a site visit.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Bad credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(payload.username.trim())
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError(
            "Invalid username or password".to_string(),
        ));
    }

    let token = sign_jwt(
        user.id,
        user.role(),
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;

    let mut tx = state.pool.begin().await?;
    users::record_user_visit(&mut tx, &state.config.forum, &user).await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user_id": user.id,
        "status": user.status,
        "reputation": user.reputation,
    })))
}
