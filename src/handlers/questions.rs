// src/handlers/questions.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        post::{AnswerRequest, AskRequest, Post, RetagRequest},
        thread::{CloseRequest, QuestionListParams},
    },
    services::{notifications, posts},
    state::AppState,
    utils::jwt::{AuthUser, MaybeUser},
};

/// Lists questions.
/// Supports sort, scope, tag and text filters with page-number pagination.
#[utoipa::path(
    get,
    path = "/api/questions",
    responses((status = 200, description = "One page of questions"))
)]
pub async fn list_questions(
    State(state): State<AppState>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let page = posts::list_questions(&mut conn, &state.config.forum, &params).await?;
    Ok(Json(page))
}

/// Asks a new question.
#[utoipa::path(
    post,
    path = "/api/questions",
    request_body = AskRequest,
    responses(
        (status = 201, description = "Question created", body = Post),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not allowed to post")
    )
)]
pub async fn ask(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let (question, update) = posts::ask(&mut tx, &state.config.forum, &user, &payload).await?;
    tx.commit().await?;

    if let Some(update) = update {
        notifications::notify_post_update(&state, &update).await;
    }

    Ok((StatusCode::CREATED, Json(question)))
}

/// Shows a question with its answers and comments.
/// Counts a view.
pub async fn view_question(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let view = posts::view_question(&mut tx, &state.config.forum, viewer.as_ref(), id).await?;
    tx.commit().await?;
    Ok(Json(view))
}

pub async fn answer(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let (answer, update) =
        posts::answer(&mut tx, &state.config.forum, &user, id, &payload).await?;
    tx.commit().await?;

    if let Some(update) = update {
        notifications::notify_post_update(&state, &update).await;
    }

    Ok((StatusCode::CREATED, Json(answer)))
}

pub async fn retag(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<RetagRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let thread = posts::retag(&mut tx, &state.config.forum, &user, id, &payload.tags).await?;
    tx.commit().await?;
    Ok(Json(thread))
}

pub async fn close(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CloseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let thread = posts::close(&mut tx, &state.config.forum, &user, id, &payload.reason).await?;
    tx.commit().await?;
    Ok(Json(thread))
}

pub async fn reopen(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let thread = posts::reopen(&mut tx, &state.config.forum, &user, id).await?;
    tx.commit().await?;
    Ok(Json(thread))
}

/// Toggles the question in the user's favorites.
pub async fn favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let result = posts::favorite(&mut tx, &state.config.forum, &user, id).await?;
    tx.commit().await?;
    Ok(Json(result))
}
