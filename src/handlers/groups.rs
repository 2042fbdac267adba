// src/handlers/groups.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::group::{CreateGroupRequest, GroupListParams},
    services::{groups, users},
    state::AppState,
    utils::{
        jwt::{AuthUser, MaybeUser},
        slug::slugify,
    },
};

fn ensure_enabled(state: &AppState) -> Result<(), AppError> {
    if state.config.forum.groups_enabled {
        Ok(())
    } else {
        Err(AppError::NotFound("Groups are not enabled".to_string()))
    }
}

/// Lists `all-groups` or `my-groups`, with membership info for signed-in users.
pub async fn list_groups(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(params): Query<GroupListParams>,
) -> Result<impl IntoResponse, AppError> {
    ensure_enabled(&state)?;
    let mut conn = state.pool.acquire().await?;
    let entries = groups::list_groups(&mut conn, viewer.as_ref(), params.sort.as_deref()).await?;
    Ok(Json(entries))
}

pub async fn create_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_enabled(&state)?;
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let group = groups::create_group(&mut tx, &user, &payload).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Members of a group. Redirects when the slug is not the canonical one.
pub async fn users_by_group(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path((id, slug)): Path<(i64, String)>,
) -> Result<Response, AppError> {
    ensure_enabled(&state)?;
    let mut conn = state.pool.acquire().await?;
    let group = groups::load_group(&mut conn, id).await?;

    let canonical = slugify(&group.name);
    if slug != canonical {
        let location = format!("/api/groups/{}/{}", group.id, canonical);
        return Ok(Redirect::permanent(&location).into_response());
    }

    let mut members = groups::group_members(&mut conn, group.id).await?;
    users::redact_karma(&mut members, viewer.as_ref(), state.config.forum.karma_mode);
    let membership = match viewer.as_ref() {
        Some(user) => {
            let m = groups::membership(&mut conn, user.id, group.id).await?;
            Some(groups::membership_info(&group, m.as_ref(), user))
        }
        None => None,
    };

    Ok(Json(json!({
        "group": group,
        "members": members,
        "membership": membership,
    }))
    .into_response())
}

pub async fn join(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_enabled(&state)?;
    let mut tx = state.pool.begin().await?;
    let info = groups::join(&mut tx, &user, id).await?;
    tx.commit().await?;
    Ok(Json(info))
}

pub async fn leave(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_enabled(&state)?;
    let mut tx = state.pool.begin().await?;
    let info = groups::leave(&mut tx, &user, id).await?;
    tx.commit().await?;
    Ok(Json(info))
}

/// Moderators turn a pending request into a full membership.
pub async fn approve_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    ensure_enabled(&state)?;
    let mut tx = state.pool.begin().await?;
    groups::approve_member(&mut tx, &user, id, user_id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
