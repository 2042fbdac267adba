//! Email notifications about forum activity.
//!
//! Dispatch runs after the triggering transaction committed. Delivery problems are logged
//! and never fail the request that caused them.

use anyhow::{Context, Result, bail};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tera::Tera;
use tracing::Level;

use crate::config::{Config, ForumSettings};
use crate::models::{
    activity::{ActivityType, ContentType},
    email_feed::FeedType,
    post::{Post, PostType},
    reply_address::{ReplyAction, ReplyAddress},
    tag::MarkedTagNames,
    thread::Thread,
    user::User,
};
use crate::services::{
    activity::{self, NewActivity},
    mail::{OutgoingEmail, ThreadHeaders},
    permissions, tags,
};
use crate::state::AppState;
use crate::utils::{
    diff::{EMAIL_DIFF_STYLE, html_diff},
    html::clean_html,
    slug::slugify,
    url::absolute_url,
};

pub const INSTANT_NOTIFICATION_TEMPLATE: &str = "email/instant_notification.html";
pub const WELCOME_TEMPLATE: &str = "email/welcome.html";
pub const POST_PUBLISHED_TEMPLATE: &str = "email/post_published.html";
pub const MODERATOR_MESSAGE_TEMPLATE: &str = "email/moderator_message.html";

/// Email tag filter strategies stored in `users.email_tag_filter_strategy`.
pub const INCLUDE_ALL: i64 = 0;
pub const EXCLUDE_IGNORED: i64 = 1;
pub const INCLUDE_INTERESTING: i64 = 2;

pub fn load_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        (
            INSTANT_NOTIFICATION_TEMPLATE,
            include_str!("../../templates/email/instant_notification.html"),
        ),
        (WELCOME_TEMPLATE, include_str!("../../templates/email/welcome.html")),
        (
            POST_PUBLISHED_TEMPLATE,
            include_str!("../../templates/email/post_published.html"),
        ),
        (
            MODERATOR_MESSAGE_TEMPLATE,
            include_str!("../../templates/email/moderator_message.html"),
        ),
    ])?;
    Ok(tera)
}

/// Checks that `update_type` makes sense for the post (and its parent, for comments).
pub fn validate_update_type(
    update_type: &str,
    post_type: PostType,
    parent_type: Option<PostType>,
) -> Result<()> {
    let valid = match update_type {
        "question_comment" => {
            post_type == PostType::Comment && parent_type == Some(PostType::Question)
        }
        "answer_comment" => post_type == PostType::Comment && parent_type == Some(PostType::Answer),
        "answer_update" | "new_answer" => post_type == PostType::Answer,
        "question_update" | "new_question" => post_type == PostType::Question,
        "post_shared" => true,
        other => bail!("unexpected update type {}", other),
    };
    if !valid {
        bail!(
            "update type {} does not apply to a {}",
            update_type,
            post_type.as_str()
        );
    }
    Ok(())
}

/// The "<user> posted an <answer>." line.
pub fn user_action(update_type: &str, post_type: PostType, actor: &str, post_url: &str) -> String {
    let is_update = update_type.ends_with("update");
    let label = match post_type {
        PostType::Question => "question",
        PostType::Answer => "answer",
        PostType::Comment => "comment",
        PostType::TagWiki => "tag wiki",
    };
    let link = format!(r#"<a href="{}">{}</a>"#, post_url, label);

    if update_type == "post_shared" {
        return format!("{} shared a {}.", actor, link);
    }
    match (post_type, is_update) {
        (PostType::Comment, true) => format!("{} edited a {}.", actor, link),
        (PostType::Comment, false) => format!("{} posted a {}", actor, link),
        (PostType::Answer, true) => format!("{} edited an {}.", actor, link),
        (PostType::Answer, false) => format!("{} posted an {}.", actor, link),
        (_, true) => format!("{} edited a {}.", actor, link),
        (_, false) => format!("{} posted a {}.", actor, link),
    }
}

fn mailto_subject(title: &str) -> String {
    url::form_urlencoded::byte_serialize(format!("Re: {}", title).as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Separator line above which email replies are read, followed by the action line.
pub fn reply_separator(
    can_reply: bool,
    is_question: bool,
    alt_reply_address: Option<&str>,
    title: &str,
    user_action: &str,
) -> String {
    if !can_reply {
        return user_action.to_string();
    }
    let separator = "==== To reply, PLEASE WRITE ABOVE THIS LINE. -=-==";
    let mut out = match alt_reply_address {
        Some(addr) if is_question => format!(
            r#"{}<p><a href="mailto:{}?subject={}">Reply with a comment</a></p>"#,
            separator,
            addr,
            mailto_subject(title)
        ),
        _ => format!("<p>{}</p>", separator),
    };
    out.push_str(user_action);
    out
}

/// Indented summaries of the posts above the updated one, nearest first.
pub fn parent_thread_summary(parents: &[(String, String)]) -> String {
    let mut out = String::new();
    for (author, html) in parents {
        out.push_str(&format!(
            r#"<div style="padding-left:20px;border-left:2px solid #ccc;margin-top:10px;"><p><b>{}</b> wrote:</p>{}"#,
            tera::escape_html(author),
            html
        ));
    }
    for _ in parents {
        out.push_str("</div>");
    }
    out
}

/// Everything the instant-notification template needs for one recipient.
#[derive(Debug, Clone)]
pub struct InstantNotification<'a> {
    pub update_type: &'a str,
    pub actor_name: &'a str,
    pub post_type: PostType,
    pub parent_type: Option<PostType>,
    pub title: &'a str,
    pub post_url: String,
    /// Revision diff for updates, the rendered post otherwise.
    pub content_preview: String,
    pub parent_summaries: String,
    pub can_reply: bool,
    pub alt_reply_address: Option<String>,
    pub subscriptions_url: String,
    pub site_name: &'a str,
    pub reply_karma_threshold: i64,
}

/// Returns `(subject, body)`.
pub fn format_instant_notification_email(
    tera: &Tera,
    n: &InstantNotification<'_>,
) -> Result<(String, String)> {
    validate_update_type(n.update_type, n.post_type, n.parent_type)?;

    let action = user_action(n.update_type, n.post_type, n.actor_name, &n.post_url);
    let separator = reply_separator(
        n.can_reply,
        n.post_type == PostType::Question,
        n.alt_reply_address.as_deref(),
        n.title,
        &action,
    );

    let mut ctx = tera::Context::new();
    ctx.insert("reply_separator", &separator);
    ctx.insert(
        "content_preview",
        &format!("{}{}", n.content_preview, n.parent_summaries),
    );
    ctx.insert("subscriptions_url", &n.subscriptions_url);
    ctx.insert("can_reply", &n.can_reply);
    ctx.insert("reply_karma_threshold", &n.reply_karma_threshold);
    ctx.insert("site_name", n.site_name);

    let body = tera
        .render(INSTANT_NOTIFICATION_TEMPLATE, &ctx)
        .context("failed to render notification")?;
    Ok((format!("\"{}\"", n.title), body))
}

/// Message-ID / In-Reply-To / References so that every mail about a thread lands in
/// one conversation.
pub fn thread_headers(question_id: i64, activity_type: ActivityType, host: &str) -> ThreadHeaders {
    let root = format!("<question-{}@{}>", question_id, host);
    if activity_type == ActivityType::AskQuestion {
        ThreadHeaders {
            message_id: Some(root),
            ..Default::default()
        }
    } else {
        ThreadHeaders {
            message_id: None,
            in_reply_to: Some(root.clone()),
            references: Some(root),
        }
    }
}

fn tag_matches(pattern: &str, tag: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => tag.starts_with(prefix),
        None => pattern == tag,
    }
}

/// Whether a thread with `thread_tags` passes a user's email tag filter.
pub fn passes_tag_filter(strategy: i64, thread_tags: &[String], marked: &MarkedTagNames) -> bool {
    let any_marked = |patterns: &[String]| {
        thread_tags
            .iter()
            .any(|t| patterns.iter().any(|p| tag_matches(p, t)))
    };
    match strategy {
        EXCLUDE_IGNORED => !any_marked(&marked.bad),
        INCLUDE_INTERESTING => any_marked(&marked.good) || any_marked(&marked.subscribed),
        _ => true,
    }
}

async fn instant_subscribers(
    conn: &mut SqliteConnection,
    feed: FeedType,
    candidates: Option<&[i64]>,
) -> Result<Vec<User>, sqlx::Error> {
    if matches!(candidates, Some(ids) if ids.is_empty()) {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT u.* FROM users u
        LEFT JOIN email_feed_settings s ON s.subscriber_id = u.id AND s.feed_type = "#,
    );
    qb.push_bind(feed.as_str())
        .push(" WHERE COALESCE(s.frequency, ")
        .push_bind(feed.default_frequency().as_str())
        .push(") = 'i'");
    if let Some(ids) = candidates {
        qb.push(" AND u.id IN (");
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
        qb.push(")");
    }
    qb.build_query_as::<User>().fetch_all(&mut *conn).await
}

/// Users to email right now about an update of `post`.
pub async fn instant_recipients(
    conn: &mut SqliteConnection,
    post: &Post,
    thread: &Thread,
    question: &Post,
    actor_id: i64,
    mentioned_ids: &[i64],
) -> Result<Vec<User>, sqlx::Error> {
    let mut recipients: Vec<User> = Vec::new();

    let thread_tags = thread.tag_names();
    for user in instant_subscribers(conn, FeedType::QAll, None).await? {
        let passes = if user.email_tag_filter_strategy == INCLUDE_ALL {
            true
        } else {
            let marked = tags::marked_tag_names(conn, user.id).await?;
            passes_tag_filter(user.email_tag_filter_strategy, &thread_tags, &marked)
        };
        if passes {
            recipients.push(user);
        }
    }

    recipients.extend(
        instant_subscribers(conn, FeedType::QAsk, Some(&[question.author_id])).await?,
    );

    let answerers: Vec<i64> = sqlx::query_scalar(
        "SELECT DISTINCT author_id FROM posts WHERE thread_id = ? AND post_type = 'answer' AND deleted = FALSE",
    )
    .bind(thread.id)
    .fetch_all(&mut *conn)
    .await?;
    recipients.extend(instant_subscribers(conn, FeedType::QAns, Some(&answerers)).await?);

    let favoriters: Vec<i64> =
        sqlx::query_scalar("SELECT user_id FROM favorite_questions WHERE thread_id = ?")
            .bind(thread.id)
            .fetch_all(&mut *conn)
            .await?;
    recipients.extend(instant_subscribers(conn, FeedType::QSel, Some(&favoriters)).await?);

    let mut participants: Vec<i64> = mentioned_ids.to_vec();
    if let (true, Some(parent_id)) = (post.is_comment(), post.parent_id) {
        let parent_people: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT author_id FROM posts WHERE id = ?
            UNION
            SELECT author_id FROM posts WHERE parent_id = ? AND post_type = 'comment' AND deleted = FALSE
            "#,
        )
        .bind(parent_id)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;
        participants.extend(parent_people);
    }
    recipients.extend(instant_subscribers(conn, FeedType::MAndC, Some(&participants)).await?);

    recipients.sort_by_key(|u| u.id);
    recipients.dedup_by_key(|u| u.id);
    recipients.retain(|u| u.id != actor_id && !u.is_blocked() && !u.email.is_empty());
    Ok(recipients)
}

async fn create_reply_address(
    conn: &mut SqliteConnection,
    user: &User,
    post_id: Option<i64>,
    action: ReplyAction,
) -> Result<ReplyAddress, sqlx::Error> {
    let code = uuid::Uuid::new_v4().simple().to_string();
    sqlx::query_as::<_, ReplyAddress>(
        r#"
        INSERT INTO reply_addresses (address, post_id, user_id, reply_action, allowed_from_email)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(code)
    .bind(post_id)
    .bind(user.id)
    .bind(action.as_str())
    .bind(&user.email)
    .fetch_one(&mut *conn)
    .await
}

/// Primary and (questions only) secondary reply addresses for `user` replying to `post`.
/// Users who cannot post by email get the site sender address.
pub async fn get_reply_to_addresses(
    conn: &mut SqliteConnection,
    config: &Config,
    user: &User,
    post: &Post,
) -> Result<(String, Option<String>), sqlx::Error> {
    let settings = &config.forum;
    if !can_reply_by_email(user, settings) {
        return Ok((config.default_from_email.clone(), None));
    }

    let host = &settings.reply_by_email_hostname;
    let action = if post.is_question() {
        ReplyAction::PostAnswer
    } else {
        ReplyAction::PostComment
    };
    let primary = create_reply_address(conn, user, Some(post.id), action)
        .await?
        .as_email_address(host);

    let secondary = if post.is_question() {
        Some(
            create_reply_address(conn, user, Some(post.id), ReplyAction::PostComment)
                .await?
                .as_email_address(host),
        )
    } else {
        None
    };
    Ok((primary, secondary))
}

fn site_host(site_url: &str) -> String {
    url::Url::parse(site_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string())
}

fn subscriptions_url(config: &Config, user: &User) -> String {
    absolute_url(
        &config.site_url,
        &format!("/users/{}/{}/subscriptions", user.id, slugify(&user.username)),
    )
}

async fn load_post(conn: &mut SqliteConnection, id: i64) -> Result<Post, sqlx::Error> {
    sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
}

async fn load_thread_and_question(
    conn: &mut SqliteConnection,
    thread_id: i64,
) -> Result<(Thread, Post), sqlx::Error> {
    let thread = sqlx::query_as::<_, Thread>("SELECT * FROM threads WHERE id = ?")
        .bind(thread_id)
        .fetch_one(&mut *conn)
        .await?;
    let question = sqlx::query_as::<_, Post>(
        "SELECT * FROM posts WHERE thread_id = ? AND post_type = 'question'",
    )
    .bind(thread_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok((thread, question))
}

async fn author_name(conn: &mut SqliteConnection, post: &Post) -> Result<String, sqlx::Error> {
    if post.is_anonymous {
        return Ok("Anonymous".to_string());
    }
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(post.author_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(user.full_name_or_username().to_string())
}

/// Diff between the two latest revisions.
async fn revision_diff(conn: &mut SqliteConnection, post_id: i64) -> Result<String> {
    let revisions: Vec<(String,)> = sqlx::query_as(
        "SELECT html FROM post_revisions WHERE post_id = ? ORDER BY revision DESC LIMIT 2",
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?;
    match revisions.as_slice() {
        [(latest,), (previous,)] => Ok(html_diff(
            &clean_html(previous),
            &clean_html(latest),
            EMAIL_DIFF_STYLE,
        )),
        _ => bail!("post {} has fewer than two revisions", post_id),
    }
}

/// A post was created or changed; who did it and who was mentioned.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub post_id: i64,
    pub activity_type: ActivityType,
    pub actor_id: i64,
    pub mentioned_ids: Vec<i64>,
}

/// Sends instant notifications about `update`. Never fails; problems are logged.
pub async fn notify_post_update(state: &AppState, update: &PostUpdate) {
    match send_post_update(state, update).await {
        Ok(sent) => tracing::debug!(post_id = update.post_id, sent, "Instant notifications sent"),
        Err(e) => tracing::error!(
            post_id = update.post_id,
            "Failed to send instant notifications: {:#}",
            e
        ),
    }
}

async fn send_post_update(state: &AppState, update: &PostUpdate) -> Result<usize> {
    if !update.activity_type.is_instant_notification_type() {
        return Ok(0);
    }
    let Some(update_type) = update.activity_type.template_update_type() else {
        return Ok(0);
    };

    let config = &state.config;
    let mut conn = state.pool.acquire().await?;

    let post = load_post(&mut conn, update.post_id).await?;
    if !post.approved || post.deleted {
        return Ok(0);
    }
    let (thread, question) = load_thread_and_question(&mut conn, post.thread_id).await?;
    let parent = match post.parent_id {
        Some(id) => Some(load_post(&mut conn, id).await?),
        None => None,
    };

    let recipients = instant_recipients(
        &mut conn,
        &post,
        &thread,
        &question,
        update.actor_id,
        &update.mentioned_ids,
    )
    .await?;
    if recipients.is_empty() {
        return Ok(0);
    }

    let actor = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(update.actor_id)
        .fetch_one(&mut *conn)
        .await?;
    let actor_name = if post.is_anonymous {
        "Anonymous".to_string()
    } else {
        actor.full_name_or_username().to_string()
    };

    let content_preview = if update_type.ends_with("update") {
        revision_diff(&mut conn, post.id).await?
    } else {
        format!("<div>{}</div>", post.html)
    };

    let mut parents: Vec<(String, String)> = Vec::new();
    if let Some(parent) = &parent {
        parents.push((author_name(&mut conn, parent).await?, parent.html.clone()));
        if parent.is_answer() {
            parents.push((author_name(&mut conn, &question).await?, question.html.clone()));
        }
    } else if post.is_answer() {
        parents.push((author_name(&mut conn, &question).await?, question.html.clone()));
    }
    let parent_summaries = parent_thread_summary(&parents);

    let post_url = absolute_url(&config.site_url, &post.url(question.id, &thread.slug()));
    let headers = thread_headers(question.id, update.activity_type, &site_host(&config.site_url));

    let log_id = tracing::enabled!(Level::DEBUG).then(|| uuid::Uuid::new_v4().to_string());
    if let Some(log_id) = &log_id {
        tracing::debug!(
            "Sending {} notifications about post {}, logId={}",
            recipients.len(),
            post.id,
            log_id
        );
    }

    let mut sent = 0;
    for user in &recipients {
        let (reply_to, alt_reply_to) =
            get_reply_to_addresses(&mut conn, config, user, &post).await?;
        let notification = InstantNotification {
            update_type,
            actor_name: &actor_name,
            post_type: post.kind(),
            parent_type: parent.as_ref().map(Post::kind),
            title: &thread.title,
            post_url: post_url.clone(),
            content_preview: content_preview.clone(),
            parent_summaries: parent_summaries.clone(),
            can_reply: can_reply_by_email(user, &config.forum),
            alt_reply_address: alt_reply_to,
            subscriptions_url: subscriptions_url(config, user),
            site_name: &config.app_short_name,
            reply_karma_threshold: config.forum.min_rep_to_post_by_email,
        };
        let (subject, body) = format_instant_notification_email(&state.templates, &notification)?;

        let mut email = OutgoingEmail::new(user.email.clone(), subject, body);
        email.reply_to = Some(reply_to);
        email.headers = headers.clone();

        match state.mailer.send(&email).await {
            Ok(()) => {
                activity::record(
                    &mut conn,
                    &NewActivity::new(
                        user.id,
                        ActivityType::EmailUpdateSent,
                        ContentType::Post,
                        question.id,
                    )
                    .question(question.id),
                )
                .await?;
                sent += 1;
                tracing::debug!(
                    "success {}, logId={}",
                    user.email,
                    log_id.as_deref().unwrap_or("-")
                );
            }
            Err(e) => tracing::debug!(
                "{}, error={:#}, logId={}",
                user.email,
                e,
                log_id.as_deref().unwrap_or("-")
            ),
        }
    }
    Ok(sent)
}

/// Welcome message with a `welcome-<code>` reply address that validates the email.
pub async fn send_welcome_email(state: &AppState, user: &User) {
    if let Err(e) = try_send_welcome_email(state, user).await {
        tracing::error!(user_id = user.id, "Failed to send welcome email: {:#}", e);
    }
}

async fn try_send_welcome_email(state: &AppState, user: &User) -> Result<()> {
    if user.email.is_empty() {
        return Ok(());
    }
    let config = &state.config;
    let mut conn = state.pool.acquire().await?;

    let address = create_reply_address(&mut conn, user, None, ReplyAction::ValidateEmail).await?;
    let reply_to = format!(
        "welcome-{}@{}",
        address.address, config.forum.reply_by_email_hostname
    );

    let mut ctx = tera::Context::new();
    ctx.insert("username", &user.username);
    ctx.insert("site_name", &config.app_short_name);
    ctx.insert("reply_by_email", &config.forum.reply_by_email);
    ctx.insert(
        "profile_url",
        &absolute_url(
            &config.site_url,
            &format!("/users/{}/{}", user.id, slugify(&user.username)),
        ),
    );
    let body = state.templates.render(WELCOME_TEMPLATE, &ctx)?;

    let mut email = OutgoingEmail::new(
        user.email.clone(),
        format!("Welcome to {}", config.app_short_name),
        body,
    );
    email.reply_to = Some(reply_to);
    state.mailer.send(&email).await?;

    activity::record(
        &mut conn,
        &NewActivity::new(
            user.id,
            ActivityType::ValidationEmailSent,
            ContentType::User,
            user.id,
        ),
    )
    .await?;
    Ok(())
}

/// Tells the author that a moderator published their post.
pub async fn notify_author_of_published_post(state: &AppState, post_id: i64) {
    if let Err(e) = try_notify_author(state, post_id).await {
        tracing::error!(post_id, "Failed to notify author of published post: {:#}", e);
    }
}

async fn try_notify_author(state: &AppState, post_id: i64) -> Result<()> {
    let config = &state.config;
    let mut conn = state.pool.acquire().await?;
    let post = load_post(&mut conn, post_id).await?;
    let (thread, question) = load_thread_and_question(&mut conn, post.thread_id).await?;
    let author = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(post.author_id)
        .fetch_one(&mut *conn)
        .await?;
    if author.email.is_empty() {
        return Ok(());
    }

    let mut ctx = tera::Context::new();
    ctx.insert("username", &author.username);
    ctx.insert("post_type", post.kind().as_str());
    ctx.insert(
        "post_url",
        &absolute_url(&config.site_url, &post.url(question.id, &thread.slug())),
    );
    ctx.insert("title", &thread.title);
    ctx.insert("site_name", &config.app_short_name);
    ctx.insert("post_html", &post.html);
    let body = state.templates.render(POST_PUBLISHED_TEMPLATE, &ctx)?;

    state
        .mailer
        .send(&OutgoingEmail::new(
            author.email.clone(),
            format!("Your post on {} was published", config.app_short_name),
            body,
        ))
        .await
}

/// Moderator-to-user email; replies go to the moderator.
pub async fn send_message(
    state: &AppState,
    moderator: &User,
    recipient: &User,
    subject_line: &str,
    body: &str,
) -> Result<()> {
    if recipient.email.is_empty() {
        bail!("user {} has no email address", recipient.id);
    }
    let mut ctx = tera::Context::new();
    ctx.insert("body", &clean_html(body));
    ctx.insert("moderator", &moderator.username);
    ctx.insert("site_name", &state.config.app_short_name);
    let html = state.templates.render(MODERATOR_MESSAGE_TEMPLATE, &ctx)?;

    let mut email = OutgoingEmail::new(recipient.email.clone(), subject_line, html);
    if !moderator.email.is_empty() {
        email.reply_to = Some(moderator.email.clone());
    }
    state.mailer.send(&email).await?;
    tracing::info!(
        moderator_id = moderator.id,
        recipient_id = recipient.id,
        "Moderator message sent"
    );
    Ok(())
}

fn can_reply_by_email(user: &User, settings: &ForumSettings) -> bool {
    permissions::can_post_by_email(user, settings)
        && user.reputation >= settings.min_rep_to_post_by_email
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(update_type: &'static str, post_type: PostType) -> InstantNotification<'static> {
        InstantNotification {
            update_type,
            actor_name: "alice",
            post_type,
            parent_type: None,
            title: "Why is the sky blue",
            post_url: "http://ask.example.org/question/1/why-is-the-sky-blue".to_string(),
            content_preview: "<p>Because of scattering</p>".to_string(),
            parent_summaries: String::new(),
            can_reply: false,
            alt_reply_address: None,
            subscriptions_url: "http://ask.example.org/users/2/bob/subscriptions".to_string(),
            site_name: "Askbot",
            reply_karma_threshold: 100,
        }
    }

    #[test]
    fn subject_is_quoted_title() {
        let tera = load_templates().unwrap();
        let (subject, body) =
            format_instant_notification_email(&tera, &notification("new_answer", PostType::Answer))
                .unwrap();
        assert_eq!(subject, "\"Why is the sky blue\"");
        assert!(body.contains("alice posted an <a href=\"http://ask.example.org/question/1/why-is-the-sky-blue\">answer</a>."));
        assert!(body.contains("Because of scattering"));
        assert!(!body.contains("PLEASE WRITE ABOVE THIS LINE"));
    }

    #[test]
    fn mismatched_update_type_is_an_error() {
        let tera = load_templates().unwrap();
        assert!(
            format_instant_notification_email(&tera, &notification("new_answer", PostType::Question))
                .is_err()
        );
        assert!(
            format_instant_notification_email(&tera, &notification("bogus", PostType::Answer))
                .is_err()
        );
        let mut comment = notification("answer_comment", PostType::Comment);
        comment.parent_type = Some(PostType::Question);
        assert!(format_instant_notification_email(&tera, &comment).is_err());
        comment.parent_type = Some(PostType::Answer);
        assert!(format_instant_notification_email(&tera, &comment).is_ok());
    }

    #[test]
    fn user_action_wording() {
        let url = "/q";
        assert_eq!(
            user_action("question_update", PostType::Question, "bob", url),
            r#"bob edited a <a href="/q">question</a>."#
        );
        assert_eq!(
            user_action("answer_update", PostType::Answer, "bob", url),
            r#"bob edited an <a href="/q">answer</a>."#
        );
        assert_eq!(
            user_action("question_comment", PostType::Comment, "bob", url),
            r#"bob posted a <a href="/q">comment</a>"#
        );
        assert_eq!(
            user_action("post_shared", PostType::Question, "bob", url),
            r#"bob shared a <a href="/q">question</a>."#
        );
    }

    #[test]
    fn reply_separator_offers_comment_link_for_questions() {
        let out = reply_separator(
            true,
            true,
            Some("reply-abc@example.org"),
            "Sky color",
            "alice posted a question.",
        );
        assert!(out.starts_with("==== To reply, PLEASE WRITE ABOVE THIS LINE. -=-=="));
        assert!(out.contains("mailto:reply-abc@example.org?subject=Re%3A%20Sky%20color"));
        assert!(out.ends_with("alice posted a question."));

        let answer = reply_separator(true, false, None, "Sky color", "x");
        assert_eq!(answer, "<p>==== To reply, PLEASE WRITE ABOVE THIS LINE. -=-==</p>x");
        assert_eq!(reply_separator(false, true, None, "t", "x"), "x");
    }

    #[test]
    fn thread_headers_point_at_the_question() {
        let root = thread_headers(7, ActivityType::AskQuestion, "ask.example.org");
        assert_eq!(root.message_id.as_deref(), Some("<question-7@ask.example.org>"));
        assert_eq!(root.in_reply_to, None);

        let reply = thread_headers(7, ActivityType::Answer, "ask.example.org");
        assert_eq!(reply.in_reply_to.as_deref(), Some("<question-7@ask.example.org>"));
        assert_eq!(reply.references.as_deref(), Some("<question-7@ask.example.org>"));
    }

    #[test]
    fn tag_filter_strategies() {
        let thread_tags = vec!["rust".to_string(), "async".to_string()];
        let marked = MarkedTagNames {
            good: vec!["py*".to_string()],
            bad: vec!["asy*".to_string()],
            subscribed: vec![],
        };
        assert!(passes_tag_filter(INCLUDE_ALL, &thread_tags, &marked));
        assert!(!passes_tag_filter(EXCLUDE_IGNORED, &thread_tags, &marked));
        assert!(!passes_tag_filter(INCLUDE_INTERESTING, &thread_tags, &marked));

        let interested = MarkedTagNames {
            good: vec!["rust".to_string()],
            ..Default::default()
        };
        assert!(passes_tag_filter(INCLUDE_INTERESTING, &thread_tags, &interested));
    }

    #[test]
    fn parent_summaries_nest() {
        let out = parent_thread_summary(&[
            ("bob".to_string(), "<p>answer</p>".to_string()),
            ("carol".to_string(), "<p>question</p>".to_string()),
        ]);
        assert_eq!(out.matches("<div").count(), 2);
        assert!(out.ends_with("</div></div>"));
        assert!(out.find("bob").unwrap() < out.find("carol").unwrap());
    }
}
