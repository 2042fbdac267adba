// src/handlers/messages.rs

use axum::{Json, extract::State, response::IntoResponse};

use crate::{error::AppError, services::messages, state::AppState, utils::jwt::AuthUser};

/// Pops every queued message for the caller.
pub async fn pop_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let messages = messages::get_and_delete_messages(&mut tx, user.id).await?;
    tx.commit().await?;
    Ok(Json(messages))
}
