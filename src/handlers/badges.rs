// src/handlers/badges.rs

use axum::{Json, extract::State, response::IntoResponse};

use crate::{error::AppError, services::badges, state::AppState};

/// Every badge with how many times it was awarded.
pub async fn list_badges(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let catalog = badges::catalog(&mut conn).await?;
    Ok(Json(catalog))
}
