// src/handlers/tags.rs

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::tag::{MarkTagsRequest, TagListParams},
    services::tags,
    state::AppState,
    utils::jwt::AuthUser,
};

/// Lists live tags by usage or name.
pub async fn list_tags(
    State(state): State<AppState>,
    Query(params): Query<TagListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let tags = tags::list_tags(&mut conn, params.sort.as_deref(), params.query.as_deref()).await?;
    Ok(Json(tags))
}

/// The caller's interesting, ignored and subscribed tags.
pub async fn marked_tags(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let names = tags::marked_tag_names(&mut conn, user.id).await?;
    Ok(Json(names))
}

pub async fn mark_tags(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<MarkTagsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let names =
        tags::mark_tags(&mut tx, user.id, &payload.tags, payload.reason, payload.action).await?;
    tx.commit().await?;
    Ok(Json(names))
}
