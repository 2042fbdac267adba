// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, badges, docs, groups, messages, posts, questions, tags, users},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers under `/api`.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let mut origins = vec![
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];
    if let Ok(site) = HeaderValue::from_str(state.config.site_url.trim_end_matches('/')) {
        if !origins.contains(&site) {
            origins.push(site);
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let question_routes = Router::new()
        .route("/", get(questions::list_questions).post(questions::ask))
        .route("/{id}", get(questions::view_question))
        .route("/{id}/answers", post(questions::answer))
        .route("/{id}/tags", put(questions::retag))
        .route("/{id}/close", post(questions::close))
        .route("/{id}/reopen", post(questions::reopen))
        .route("/{id}/favorite", post(questions::favorite));

    let post_routes = Router::new()
        .route("/{id}", put(posts::edit).delete(posts::delete))
        .route("/{id}/revisions", get(posts::revisions))
        .route("/{id}/comments", post(posts::comment))
        .route("/{id}/vote", post(posts::vote))
        .route("/{id}/accept", post(posts::accept))
        .route("/{id}/flag", post(posts::flag).delete(posts::unflag))
        .route("/{id}/approve", post(posts::approve));

    let tag_routes = Router::new()
        .route("/", get(tags::list_tags))
        .route("/marked", get(tags::marked_tags).post(tags::mark_tags));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/search", get(users::search_users))
        .route("/{id}", get(users::overview).put(users::edit_user))
        .route("/{id}/stats", get(users::stats))
        .route("/{id}/recent", get(users::recent))
        .route("/{id}/inbox", get(users::inbox))
        .route("/{id}/inbox/seen", post(users::mark_seen))
        .route("/{id}/network", get(users::network))
        .route("/{id}/reputation", get(users::reputation))
        .route("/{id}/favorites", get(users::favorites))
        .route("/{id}/votes", get(users::votes))
        .route(
            "/{id}/email-subscriptions",
            get(users::email_subscriptions).put(users::save_email_subscriptions),
        )
        .route("/{id}/moderation/status", post(users::change_status))
        .route("/{id}/moderation/message", post(users::send_message))
        .route("/{id}/moderation/reputation", post(users::adjust_reputation))
        .route("/{id}/follow", post(users::follow).delete(users::unfollow));

    let group_routes = Router::new()
        .route("/", get(groups::list_groups).post(groups::create_group))
        .route("/{id}/join", post(groups::join))
        .route("/{id}/leave", post(groups::leave))
        .route("/{id}/members/{user_id}/approve", post(groups::approve_member))
        .route("/{id}/{slug}", get(groups::users_by_group));

    let admin_routes = Router::new()
        .route("/feed-settings", get(admin::list_feed_settings))
        .route("/feed-settings/{id}", put(admin::update_feed_setting))
        .route("/threads", get(admin::list_threads))
        .route("/tags", get(admin::list_tags))
        .route("/votes", get(admin::list_votes))
        .route("/favorites", get(admin::list_favorites))
        .route("/revisions", get(admin::list_revisions))
        .route("/awards", get(admin::list_awards))
        .route("/reputes", get(admin::list_reputes))
        .route("/activities", get(admin::list_activities))
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/reject-reasons",
            get(admin::list_reject_reasons).post(admin::create_reject_reason),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/tags", tag_routes)
        .nest("/api/users", user_routes)
        .nest("/api/groups", group_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/messages", get(messages::pop_messages))
        .route("/api/badges", get(badges::list_badges))
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
