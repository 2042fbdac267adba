// src/handlers/users.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        email_feed::EmailSubscriptionsRequest,
        user::{EditUserRequest, User, UserListParams, UserStatus},
    },
    services::{
        activity::{self, InboxSection},
        notifications, permissions, reputation, users,
    },
    state::AppState,
    utils::jwt::{AuthUser, MaybeUser},
};

fn ensure_owner_or_moderator(viewer: &User, owner: &User) -> Result<(), AppError> {
    if viewer.id == owner.id || permissions::can_moderate_user(viewer, owner) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Sorry, this part of the profile is private".to_string(),
        ))
    }
}

/// The user directory.
pub async fn list_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let page = users::show_users(&mut conn, &state.config.forum, viewer.as_ref(), &params).await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

pub async fn search_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let found = users::get_users_by_text_query(
        &mut conn,
        &state.config.forum,
        viewer.as_ref(),
        &params.query,
    )
    .await?;
    Ok(Json(found))
}

/// Profile overview.
pub async fn overview(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let owner = users::load_user(&mut conn, id).await?;
    let can_show_karma =
        permissions::can_show_karma(viewer.as_ref(), &owner, state.config.forum.karma_mode);
    let reputation = can_show_karma.then_some(owner.reputation);

    Ok(Json(json!({
        "user": owner,
        "reputation": reputation,
        "can_show_karma": can_show_karma,
    })))
}

pub async fn edit_user(
    State(state): State<AppState>,
    AuthUser(editor): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<EditUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let user = users::edit_user(&mut tx, &state.config.forum, &editor, id, &payload).await?;
    tx.commit().await?;
    Ok(Json(user))
}

pub async fn stats(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let owner = users::load_user(&mut conn, id).await?;
    let stats = users::user_stats(&mut conn, &state.config.forum, viewer.as_ref(), &owner).await?;
    let can_show_karma =
        permissions::can_show_karma(viewer.as_ref(), &owner, state.config.forum.karma_mode);

    Ok(Json(json!({
        "user": owner,
        "reputation": can_show_karma.then_some(owner.reputation),
        "can_show_karma": can_show_karma,
        "stats": stats,
    })))
}

pub async fn recent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let owner = users::load_user(&mut conn, id).await?;
    let events =
        activity::user_recent(&mut conn, owner.id, state.config.forum.user_view_data_size).await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
pub struct InboxParams {
    pub section: Option<String>,
}

/// Responses and flags addressed to the profile owner.
pub async fn inbox(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    Query(params): Query<InboxParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let owner = users::load_user(&mut conn, id).await?;
    ensure_owner_or_moderator(&viewer, &owner)?;

    let section = match params.section.as_deref() {
        None => InboxSection::Forum,
        Some(raw) => InboxSection::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown inbox section '{}'", raw)))?,
    };
    if section == InboxSection::Flags && !viewer.is_administrator_or_moderator() {
        return Err(AppError::Forbidden(
            "Sorry, only moderators can see flags".to_string(),
        ));
    }

    let view = activity::user_responses(&mut conn, owner.id, section, &state.config.forum).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct MarkSeenRequest {
    pub memo_ids: Vec<i64>,
}

pub async fn mark_seen(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<MarkSeenRequest>,
) -> Result<impl IntoResponse, AppError> {
    if viewer.id != id {
        return Err(AppError::Forbidden(
            "Sorry, you can only manage your own inbox".to_string(),
        ));
    }
    let mut conn = state.pool.acquire().await?;
    let updated = activity::mark_seen(&mut conn, viewer.id, &payload.memo_ids).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn network(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let owner = users::load_user(&mut conn, id).await?;
    let network =
        users::user_network(&mut conn, &state.config.forum, viewer.as_ref(), owner.id).await?;
    Ok(Json(network))
}

/// Reputation history with a graph series; 404 when karma is hidden from the viewer.
pub async fn reputation(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let owner = users::load_user(&mut conn, id).await?;
    if !permissions::can_show_karma(viewer.as_ref(), &owner, state.config.forum.karma_mode) {
        return Err(AppError::NotFound("Page not found".to_string()));
    }

    let reputes = reputation::list_reputes(&mut conn, owner.id).await?;
    let graph = reputation::reputation_graph(owner.reputation, &reputes);
    Ok(Json(json!({
        "reputation": owner.reputation,
        "reputes": reputes,
        "graph": graph,
    })))
}

pub async fn favorites(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let owner = users::load_user(&mut conn, id).await?;
    let questions =
        users::user_favorites(&mut conn, owner.id, state.config.forum.user_view_data_size).await?;
    Ok(Json(questions))
}

pub async fn votes(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let owner = users::load_user(&mut conn, id).await?;
    ensure_owner_or_moderator(&viewer, &owner)?;
    let votes =
        users::user_votes(&mut conn, owner.id, state.config.forum.user_view_data_size).await?;
    Ok(Json(votes))
}

/// Feed settings; missing feeds are created with their defaults first.
pub async fn email_subscriptions(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let owner = users::load_user(&mut tx, id).await?;
    ensure_owner_or_moderator(&viewer, &owner)?;
    let subscriptions = users::email_subscriptions(&mut tx, &owner).await?;
    tx.commit().await?;
    Ok(Json(subscriptions))
}

pub async fn save_email_subscriptions(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<EmailSubscriptionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let owner = users::load_user(&mut tx, id).await?;
    ensure_owner_or_moderator(&viewer, &owner)?;
    let subscriptions = users::save_email_subscriptions(&mut tx, &owner, &payload).await?;
    tx.commit().await?;
    Ok(Json(subscriptions))
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: UserStatus,
}

pub async fn change_status(
    State(state): State<AppState>,
    AuthUser(moderator): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ChangeStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = users::change_status(&mut tx, &moderator, id, payload.status).await?;
    tx.commit().await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 200, message = "Enter a subject line"))]
    pub subject: String,
    #[validate(length(min = 1, max = 10000, message = "Message is empty"))]
    pub body: String,
}

/// Emails the user on behalf of a moderator.
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(moderator): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = state.pool.acquire().await?;
    let recipient = users::load_user(&mut conn, id).await?;
    drop(conn);

    if !permissions::can_moderate_user(&moderator, &recipient) {
        return Err(AppError::Forbidden(
            "Sorry, you cannot moderate this user".to_string(),
        ));
    }

    notifications::send_message(&state, &moderator, &recipient, &payload.subject, &payload.body)
        .await
        .map_err(|e| {
            tracing::error!("Failed to send moderator message: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustReputationRequest {
    pub delta: i64,
    #[validate(length(max = 128))]
    #[serde(default)]
    pub comment: String,
}

pub async fn adjust_reputation(
    State(state): State<AppState>,
    AuthUser(moderator): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<AdjustReputationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let reputation = users::adjust_reputation(
        &mut tx,
        &state.config.forum,
        &moderator,
        id,
        payload.delta,
        payload.comment.trim(),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(json!({ "reputation": reputation })))
}

pub async fn follow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    users::follow(&mut conn, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfollow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    users::unfollow(&mut conn, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
