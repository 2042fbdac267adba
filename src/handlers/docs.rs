// src/handlers/docs.rs

use axum::Json;
use utoipa::OpenApi;

use crate::{
    models::{
        email_feed::{EmailFeedSetting, FeedType, Frequency},
        group::{CreateGroupRequest, Group, MembershipInfo},
        post::{
            AnswerRequest, AskRequest, CommentRequest, EditPostRequest, Post, PostRevision,
            PostType, RetagRequest,
        },
        tag::{MarkAction, MarkTagsRequest, MarkedTagNames, Tag, TagMarkReason},
        thread::{CloseRequest, QuestionSummary, Thread},
        user::{CreateUserRequest, EditUserRequest, LoginRequest, User, UserCard, UserStatus},
        vote::{VoteDirection, VoteRequest, VoteResponse},
    },
    services::posts::{FavoriteResponse, PostWithComments, QuestionView},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::auth::register,
        super::auth::login,
        super::questions::list_questions,
        super::questions::ask,
        super::posts::vote,
    ),
    components(schemas(
        User, UserCard, UserStatus, CreateUserRequest, LoginRequest, EditUserRequest,
        Thread, QuestionSummary, CloseRequest,
        Post, PostType, PostRevision, AskRequest, AnswerRequest, CommentRequest,
        EditPostRequest, RetagRequest, PostWithComments, QuestionView, FavoriteResponse,
        VoteDirection, VoteRequest, VoteResponse,
        Tag, TagMarkReason, MarkAction, MarkTagsRequest, MarkedTagNames,
        Group, MembershipInfo, CreateGroupRequest,
        EmailFeedSetting, FeedType, Frequency,
    )),
    tags((name = "askbot", description = "Q&A forum API"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
