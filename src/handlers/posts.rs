// src/handlers/posts.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        post::{CommentRequest, EditPostRequest},
        vote::{VoteRequest, VoteResponse},
    },
    services::{notifications, posts, voting},
    state::AppState,
    utils::jwt::{AuthUser, MaybeUser},
};

/// Adds a comment under a question or an answer.
pub async fn comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let (comment, update) =
        posts::comment(&mut tx, &state.config.forum, &user, id, &payload).await?;
    tx.commit().await?;

    if let Some(update) = update {
        notifications::notify_post_update(&state, &update).await;
    }

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Edits a post, adding a revision.
pub async fn edit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<EditPostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let (post, update) = posts::edit(&mut tx, &state.config.forum, &user, id, &payload).await?;
    tx.commit().await?;

    if let Some(update) = update {
        notifications::notify_post_update(&state, &update).await;
    }

    Ok(Json(post))
}

/// Soft-deletes a post.
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let post = posts::delete(&mut tx, &state.config.forum, &user, id).await?;
    tx.commit().await?;
    Ok(Json(post))
}

pub async fn revisions(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let revisions = posts::revisions(&mut conn, viewer.as_ref(), id).await?;
    Ok(Json(revisions))
}

/// Casts, switches or cancels a vote.
/// Voting the same direction twice cancels the vote.
#[utoipa::path(
    post,
    path = "/api/posts/{id}/vote",
    params(("id" = i64, Path, description = "Post id")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = VoteResponse),
        (status = 403, description = "Not allowed to vote")
    )
)]
pub async fn vote(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<VoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let response = voting::vote(&mut tx, &state.config.forum, &user, id, payload.direction).await?;
    tx.commit().await?;
    Ok(Json(response))
}

/// Accepts the answer, or withdraws the acceptance when it is already accepted.
pub async fn accept(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let accepted = posts::accept(&mut tx, &state.config.forum, &user, id).await?;
    tx.commit().await?;
    Ok(Json(json!({ "accepted_answer_id": accepted })))
}

pub async fn flag(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let post = posts::flag(&mut tx, &state.config.forum, &user, id).await?;
    tx.commit().await?;
    Ok(Json(post))
}

pub async fn unflag(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let post = posts::unflag(&mut tx, &user, id).await?;
    tx.commit().await?;
    Ok(Json(post))
}

/// Publishes a post held for moderation.
/// The author hears about it first, then the usual subscribers.
pub async fn approve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let (post, update) = posts::approve(&mut tx, &user, id).await?;
    tx.commit().await?;

    notifications::notify_author_of_published_post(&state, post.id).await;
    notifications::notify_post_update(&state, &update).await;

    Ok(Json(post))
}
