//! Questions, answers and comments: creation, editing, moderation and thread views.
//!
//! Every function here runs inside the caller's transaction. Functions that change
//! published content return a [`PostUpdate`] which the caller hands to
//! [`notifications::notify_post_update`](crate::services::notifications::notify_post_update)
//! once the transaction committed.

use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use utoipa::ToSchema;

use crate::config::ForumSettings;
use crate::error::AppError;
use crate::models::{
    activity::{ActivityType, ContentType},
    post::{
        AnswerRequest, AskRequest, CommentRequest, EditPostRequest, Post, PostRevision, PostType,
        PostWithAuthor,
    },
    repute::ReputeType,
    thread::{QuestionListParams, QuestionSummary, Thread},
    user::User,
};
use crate::services::{
    activity::{self, NewActivity},
    badges::{self, BadgeEvent},
    notifications::PostUpdate,
    permissions, reputation,
    reputation::start_of_today,
    tags,
};
use crate::utils::{
    html::{extract_mentions, markdown_to_html, summarize},
    pagination::{Paginator, parse_page},
};

const SUMMARY_LENGTH: usize = 300;

/// Flags on one post that trigger the extra penalty and the automatic deletion.
pub const FLAGS_FOR_PENALTY: i64 = 3;
pub const FLAGS_FOR_AUTO_DELETE: i64 = 5;

pub async fn load_post(conn: &mut SqliteConnection, post_id: i64) -> Result<Post, AppError> {
    sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

pub async fn load_thread(conn: &mut SqliteConnection, thread_id: i64) -> Result<Thread, AppError> {
    sqlx::query_as::<_, Thread>("SELECT * FROM threads WHERE id = ?")
        .bind(thread_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Thread not found".to_string()))
}

pub async fn thread_question(
    conn: &mut SqliteConnection,
    thread_id: i64,
) -> Result<Post, AppError> {
    sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE thread_id = ? AND post_type = 'question'")
        .bind(thread_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))
}

/// Loads a question post by id; any other post type is a 404.
pub async fn load_question(
    conn: &mut SqliteConnection,
    question_id: i64,
) -> Result<(Post, Thread), AppError> {
    let question = load_post(conn, question_id).await?;
    if !question.is_question() {
        return Err(AppError::NotFound("Question not found".to_string()));
    }
    let thread = load_thread(conn, question.thread_id).await?;
    Ok((question, thread))
}

fn needs_moderation(user: &User, settings: &ForumSettings) -> bool {
    settings.enable_content_moderation && user.is_watched()
}

struct NewPost<'a> {
    post_type: PostType,
    thread_id: i64,
    parent_id: Option<i64>,
    author_id: i64,
    text: &'a str,
    wiki: bool,
    is_anonymous: bool,
    approved: bool,
}

async fn insert_post(conn: &mut SqliteConnection, new: NewPost<'_>) -> Result<Post, sqlx::Error> {
    let html = markdown_to_html(new.text);
    let summary = summarize(&html, SUMMARY_LENGTH);
    sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (post_type, thread_id, parent_id, author_id, text, html, summary,
                           wiki, is_anonymous, approved, added_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new.post_type.as_str())
    .bind(new.thread_id)
    .bind(new.parent_id)
    .bind(new.author_id)
    .bind(new.text)
    .bind(&html)
    .bind(&summary)
    .bind(new.wiki)
    .bind(new.is_anonymous)
    .bind(new.approved)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

/// Appends the next revision of a post and returns its number.
async fn add_revision(
    conn: &mut SqliteConnection,
    post: &Post,
    author_id: i64,
    title: Option<&str>,
    tagnames: Option<&str>,
    summary: &str,
) -> Result<i64, sqlx::Error> {
    let (revision,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO post_revisions (post_id, revision, author_id, text, html, title, tagnames, summary, revised_at)
        VALUES (?, (SELECT COALESCE(MAX(revision), 0) + 1 FROM post_revisions WHERE post_id = ?), ?, ?, ?, ?, ?, ?, ?)
        RETURNING revision
        "#,
    )
    .bind(post.id)
    .bind(post.id)
    .bind(author_id)
    .bind(&post.text)
    .bind(&post.html)
    .bind(title)
    .bind(tagnames)
    .bind(summary)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(revision)
}

async fn touch_thread(
    conn: &mut SqliteConnection,
    thread_id: i64,
    user_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE threads SET last_activity_at = ?, last_activity_by = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id)
        .bind(thread_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Ids of existing users named in `@mentions`, minus `exclude`.
async fn resolve_mentions(
    conn: &mut SqliteConnection,
    text: &str,
    exclude: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let names = extract_mentions(text);
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM users WHERE username IN (");
    let mut list = qb.separated(", ");
    for name in &names {
        list.push_bind(name);
    }
    qb.push(") AND id != ").push_bind(exclude).push(" ORDER BY id");
    let ids: Vec<(i64,)> = qb.build_query_as().fetch_all(&mut *conn).await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Inbox recipients of a response: the asker, the parent's author and commenters, and
/// everyone who favourited the thread.
async fn response_recipients(
    conn: &mut SqliteConnection,
    post: &Post,
    question: &Post,
    actor_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let mut ids = vec![question.author_id];
    if let Some(parent_id) = post.parent_id {
        let parent_people: Vec<(i64,)> = sqlx::query_as(
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
        ids.extend(parent_people.into_iter().map(|(id,)| id));
    }
    let favoriters: Vec<(i64,)> =
        sqlx::query_as("SELECT user_id FROM favorite_questions WHERE thread_id = ?")
            .bind(post.thread_id)
            .fetch_all(&mut *conn)
            .await?;
    ids.extend(favoriters.into_iter().map(|(id,)| id));

    ids.sort_unstable();
    ids.dedup();
    ids.retain(|id| *id != actor_id);
    Ok(ids)
}

async fn record_mentions(
    conn: &mut SqliteConnection,
    actor_id: i64,
    post: &Post,
    question_id: i64,
    mentioned: &[i64],
) -> Result<(), sqlx::Error> {
    if mentioned.is_empty() {
        return Ok(());
    }
    activity::record_with_recipients(
        conn,
        &NewActivity::new(actor_id, ActivityType::Mention, ContentType::Post, post.id)
            .question(question_id)
            .summary(post.summary.clone()),
        mentioned,
    )
    .await?;
    Ok(())
}

/// Records a response activity, or the moderation notice for an unapproved post.
async fn record_response(
    conn: &mut SqliteConnection,
    actor_id: i64,
    activity_type: ActivityType,
    post: &Post,
    question: &Post,
) -> Result<(), sqlx::Error> {
    let recipients = response_recipients(conn, post, question, actor_id).await?;
    activity::record_with_recipients(
        conn,
        &NewActivity::new(actor_id, activity_type, ContentType::Post, post.id)
            .question(question.id)
            .summary(post.summary.clone()),
        &recipients,
    )
    .await?;
    Ok(())
}

async fn record_moderation_notice(
    conn: &mut SqliteConnection,
    actor_id: i64,
    activity_type: ActivityType,
    post: &Post,
    question_id: i64,
) -> Result<(), sqlx::Error> {
    let moderators: Vec<i64> = activity::get_admins_and_moderators(conn)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect();
    activity::record_with_recipients(
        conn,
        &NewActivity::new(actor_id, activity_type, ContentType::Post, post.id)
            .question(question_id)
            .summary(post.summary.clone()),
        &moderators,
    )
    .await?;
    Ok(())
}

fn comment_activity_type(parent: &Post) -> ActivityType {
    if parent.is_question() {
        ActivityType::CommentQuestion
    } else {
        ActivityType::CommentAnswer
    }
}

pub async fn ask(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    req: &AskRequest,
) -> Result<(Post, Option<PostUpdate>), AppError> {
    permissions::assert_can_post(user)?;
    let tag_names = tags::clean_tag_names(&req.tags, settings)?;
    let approved = !needs_moderation(user, settings);
    let now = Utc::now();

    let thread = sqlx::query_as::<_, Thread>(
        r#"
        INSERT INTO threads (title, tagnames, last_activity_at, last_activity_by, approved, added_at)
        VALUES (?, '', ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(req.title.trim())
    .bind(now)
    .bind(user.id)
    .bind(approved)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    tags::set_thread_tags(conn, thread.id, user.id, &tag_names).await?;

    let question = insert_post(
        conn,
        NewPost {
            post_type: PostType::Question,
            thread_id: thread.id,
            parent_id: None,
            author_id: user.id,
            text: &req.text,
            wiki: req.wiki,
            is_anonymous: req.is_anonymous,
            approved,
        },
    )
    .await?;
    add_revision(
        conn,
        &question,
        user.id,
        Some(&thread.title),
        Some(&tag_names.join(" ")),
        "",
    )
    .await?;

    let mentioned = resolve_mentions(conn, &req.text, user.id).await?;
    badges::handle_event(conn, settings, BadgeEvent::PostQuestion, user.id, Some(question.id))
        .await?;
    tracing::info!(user_id = user.id, question_id = question.id, approved, "Question asked");

    if !approved {
        record_moderation_notice(
            conn,
            user.id,
            ActivityType::ModeratedNewPost,
            &question,
            question.id,
        )
        .await?;
        return Ok((question, None));
    }

    record_response(conn, user.id, ActivityType::AskQuestion, &question, &question).await?;
    record_mentions(conn, user.id, &question, question.id, &mentioned).await?;
    let update = PostUpdate {
        post_id: question.id,
        activity_type: ActivityType::AskQuestion,
        actor_id: user.id,
        mentioned_ids: mentioned,
    };
    Ok((question, Some(update)))
}

pub async fn answer(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    question_id: i64,
    req: &AnswerRequest,
) -> Result<(Post, Option<PostUpdate>), AppError> {
    let (question, thread) = load_question(conn, question_id).await?;
    if question.deleted {
        return Err(AppError::NotFound("Question not found".to_string()));
    }
    let (already,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM posts WHERE thread_id = ? AND author_id = ? AND post_type = 'answer' AND deleted = FALSE",
    )
    .bind(thread.id)
    .bind(user.id)
    .fetch_one(&mut *conn)
    .await?;
    permissions::assert_can_answer(user, &thread, already > 0, settings)?;

    let approved = !needs_moderation(user, settings);
    let answer = insert_post(
        conn,
        NewPost {
            post_type: PostType::Answer,
            thread_id: thread.id,
            parent_id: Some(question.id),
            author_id: user.id,
            text: &req.text,
            wiki: req.wiki,
            is_anonymous: false,
            approved,
        },
    )
    .await?;
    add_revision(conn, &answer, user.id, None, None, "").await?;

    if approved {
        sqlx::query("UPDATE threads SET answer_count = answer_count + 1 WHERE id = ?")
            .bind(thread.id)
            .execute(&mut *conn)
            .await?;
    }
    touch_thread(conn, thread.id, user.id).await?;

    let mentioned = resolve_mentions(conn, &req.text, user.id).await?;
    badges::handle_event(conn, settings, BadgeEvent::PostAnswer, user.id, Some(answer.id)).await?;
    tracing::info!(user_id = user.id, answer_id = answer.id, approved, "Answer posted");

    if !approved {
        record_moderation_notice(
            conn,
            user.id,
            ActivityType::ModeratedNewPost,
            &answer,
            question.id,
        )
        .await?;
        return Ok((answer, None));
    }

    record_response(conn, user.id, ActivityType::Answer, &answer, &question).await?;
    record_mentions(conn, user.id, &answer, question.id, &mentioned).await?;
    let update = PostUpdate {
        post_id: answer.id,
        activity_type: ActivityType::Answer,
        actor_id: user.id,
        mentioned_ids: mentioned,
    };
    Ok((answer, Some(update)))
}

pub async fn comment(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    parent_id: i64,
    req: &CommentRequest,
) -> Result<(Post, Option<PostUpdate>), AppError> {
    let parent = load_post(conn, parent_id).await?;
    if !(parent.is_question() || parent.is_answer()) {
        return Err(AppError::BadRequest(
            "Only questions and answers can be commented".to_string(),
        ));
    }
    let question = thread_question(conn, parent.thread_id).await?;
    permissions::assert_can_comment(user, &parent, question.author_id, settings)?;

    let approved = !needs_moderation(user, settings);
    let comment = insert_post(
        conn,
        NewPost {
            post_type: PostType::Comment,
            thread_id: parent.thread_id,
            parent_id: Some(parent.id),
            author_id: user.id,
            text: &req.text,
            wiki: false,
            is_anonymous: false,
            approved,
        },
    )
    .await?;
    add_revision(conn, &comment, user.id, None, None, "").await?;

    sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?")
        .bind(parent.id)
        .execute(&mut *conn)
        .await?;
    touch_thread(conn, parent.thread_id, user.id).await?;

    let mentioned = resolve_mentions(conn, &req.text, user.id).await?;
    badges::handle_event(conn, settings, BadgeEvent::PostComment, user.id, Some(comment.id))
        .await?;

    if !approved {
        record_moderation_notice(
            conn,
            user.id,
            ActivityType::ModeratedNewPost,
            &comment,
            question.id,
        )
        .await?;
        return Ok((comment, None));
    }

    let activity_type = comment_activity_type(&parent);
    record_response(conn, user.id, activity_type, &comment, &question).await?;
    record_mentions(conn, user.id, &comment, question.id, &mentioned).await?;
    let update = PostUpdate {
        post_id: comment.id,
        activity_type,
        actor_id: user.id,
        mentioned_ids: mentioned,
    };
    Ok((comment, Some(update)))
}

pub async fn edit(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    post_id: i64,
    req: &EditPostRequest,
) -> Result<(Post, Option<PostUpdate>), AppError> {
    let post = load_post(conn, post_id).await?;
    permissions::assert_can_edit(user, &post, settings)?;
    let question = thread_question(conn, post.thread_id).await?;
    let mut thread = load_thread(conn, post.thread_id).await?;

    if post.is_question() {
        if let Some(title) = &req.title {
            sqlx::query("UPDATE threads SET title = ? WHERE id = ?")
                .bind(title.trim())
                .bind(thread.id)
                .execute(&mut *conn)
                .await?;
        }
        if let Some(raw_tags) = &req.tags {
            let names = tags::clean_tag_names(raw_tags, settings)?;
            tags::set_thread_tags(conn, thread.id, user.id, &names).await?;
        }
        thread = load_thread(conn, thread.id).await?;
    }

    let previously_mentioned = resolve_mentions(conn, &post.text, post.author_id).await?;
    let html = markdown_to_html(&req.text);
    let updated = sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts SET text = ?, html = ?, summary = ?, last_edited_at = ?, last_edited_by = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&req.text)
    .bind(&html)
    .bind(summarize(&html, SUMMARY_LENGTH))
    .bind(Utc::now())
    .bind(user.id)
    .bind(post.id)
    .fetch_one(&mut *conn)
    .await?;

    let (title, tagnames) = if updated.is_question() {
        (Some(thread.title.as_str()), Some(thread.tagnames.as_str()))
    } else {
        (None, None)
    };
    add_revision(conn, &updated, user.id, title, tagnames, req.summary.trim()).await?;
    touch_thread(conn, thread.id, user.id).await?;

    let mentioned: Vec<i64> = resolve_mentions(conn, &req.text, user.id)
        .await?
        .into_iter()
        .filter(|id| !previously_mentioned.contains(id))
        .collect();

    let (activity_type, event) = match updated.kind() {
        PostType::Question => (Some(ActivityType::UpdateQuestion), Some(BadgeEvent::EditQuestion)),
        PostType::Answer => (Some(ActivityType::UpdateAnswer), Some(BadgeEvent::EditAnswer)),
        _ => (None, None),
    };
    if let Some(event) = event {
        badges::handle_event(conn, settings, event, user.id, Some(updated.id)).await?;
    }
    tracing::info!(user_id = user.id, post_id = updated.id, "Post edited");

    if needs_moderation(user, settings) {
        record_moderation_notice(
            conn,
            user.id,
            ActivityType::ModeratedPostEdit,
            &updated,
            question.id,
        )
        .await?;
        return Ok((updated, None));
    }

    record_mentions(conn, user.id, &updated, question.id, &mentioned).await?;
    let Some(activity_type) = activity_type else {
        return Ok((updated, None));
    };
    record_response(conn, user.id, activity_type, &updated, &question).await?;
    let update = updated.approved.then(|| PostUpdate {
        post_id: updated.id,
        activity_type,
        actor_id: user.id,
        mentioned_ids: mentioned,
    });
    Ok((updated, update))
}

pub async fn retag(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    question_id: i64,
    raw_tags: &[String],
) -> Result<Thread, AppError> {
    let (question, thread) = load_question(conn, question_id).await?;
    permissions::assert_can_retag(user, &question, settings)?;
    let names = tags::clean_tag_names(raw_tags, settings)?;

    tags::set_thread_tags(conn, thread.id, user.id, &names).await?;
    add_revision(
        conn,
        &question,
        user.id,
        Some(&thread.title),
        Some(&names.join(" ")),
        "Retagged",
    )
    .await?;

    activity::record(
        conn,
        &NewActivity::new(user.id, ActivityType::UpdateTags, ContentType::Post, question.id)
            .question(question.id)
            .summary(names.join(" ")),
    )
    .await?;
    badges::handle_event(conn, settings, BadgeEvent::UpdateTag, user.id, Some(question.id))
        .await?;
    tracing::info!(user_id = user.id, question_id, tags = %names.join(" "), "Question retagged");

    Ok(load_thread(conn, thread.id).await?)
}

/// Soft-deletes a post.
pub async fn delete(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    post_id: i64,
) -> Result<Post, AppError> {
    let post = load_post(conn, post_id).await?;
    if post.deleted {
        return Err(AppError::BadRequest("Post is already deleted".to_string()));
    }

    let has_upvoted_foreign_answers = if post.is_question() {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM posts
            WHERE thread_id = ? AND post_type = 'answer' AND deleted = FALSE
              AND author_id != ? AND score > 0
            "#,
        )
        .bind(post.thread_id)
        .bind(post.author_id)
        .fetch_one(&mut *conn)
        .await?;
        count > 0
    } else {
        false
    };
    permissions::assert_can_delete(user, &post, has_upvoted_foreign_answers, settings)?;

    let deleted = mark_deleted(conn, &post, user.id).await?;
    let question = thread_question(conn, post.thread_id).await?;

    let activity_type = match post.kind() {
        PostType::Question => Some(ActivityType::DeleteQuestion),
        PostType::Answer => Some(ActivityType::DeleteAnswer),
        _ => None,
    };
    if let Some(activity_type) = activity_type {
        activity::record(
            conn,
            &NewActivity::new(user.id, activity_type, ContentType::Post, post.id)
                .question(question.id),
        )
        .await?;
    }
    badges::handle_event(conn, settings, BadgeEvent::DeletePost, user.id, Some(post.id)).await?;
    tracing::info!(user_id = user.id, post_id, "Post deleted");
    Ok(deleted)
}

async fn mark_deleted(
    conn: &mut SqliteConnection,
    post: &Post,
    deleted_by: i64,
) -> Result<Post, sqlx::Error> {
    let deleted = sqlx::query_as::<_, Post>(
        "UPDATE posts SET deleted = TRUE, deleted_at = ?, deleted_by = ? WHERE id = ? RETURNING *",
    )
    .bind(Utc::now())
    .bind(deleted_by)
    .bind(post.id)
    .fetch_one(&mut *conn)
    .await?;

    match (post.kind(), post.parent_id) {
        (PostType::Answer, _) if post.approved => {
            sqlx::query("UPDATE threads SET answer_count = MAX(answer_count - 1, 0) WHERE id = ?")
                .bind(post.thread_id)
                .execute(&mut *conn)
                .await?;
        }
        (PostType::Comment, Some(parent_id)) => {
            sqlx::query("UPDATE posts SET comment_count = MAX(comment_count - 1, 0) WHERE id = ?")
                .bind(parent_id)
                .execute(&mut *conn)
                .await?;
        }
        _ => {}
    }
    Ok(deleted)
}

async fn unaccept(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    answer: &Post,
    question: &Post,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE posts SET endorsed = FALSE WHERE id = ?")
        .bind(answer.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE threads SET accepted_answer_id = NULL WHERE id = ?")
        .bind(answer.thread_id)
        .execute(&mut *conn)
        .await?;
    if answer.author_id != question.author_id {
        reputation::change_reputation(
            conn,
            settings,
            answer.author_id,
            settings.rep_loss_for_receiving_cancelation_of_answer_acceptance,
            ReputeType::LoseByAcceptedAnswerCanceled,
            Some(question.id),
        )
        .await?;
        reputation::change_reputation(
            conn,
            settings,
            question.author_id,
            settings.rep_loss_for_canceling_answer_acceptance,
            ReputeType::LoseByCancelingAcceptedAnswer,
            Some(question.id),
        )
        .await?;
    }
    Ok(())
}

/// Accepts an answer, or un-accepts it when it already is the accepted one.
/// Returns the accepted answer id afterwards.
pub async fn accept(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    answer_id: i64,
) -> Result<Option<i64>, AppError> {
    let answer = load_post(conn, answer_id).await?;
    let question = thread_question(conn, answer.thread_id).await?;
    permissions::assert_can_accept(user, &answer, &question, settings)?;
    let thread = load_thread(conn, answer.thread_id).await?;

    if thread.accepted_answer_id == Some(answer.id) {
        unaccept(conn, settings, &answer, &question).await?;
        tracing::info!(user_id = user.id, answer_id, "Answer unaccepted");
        return Ok(None);
    }
    if answer.deleted {
        return Err(AppError::BadRequest("Cannot accept a deleted answer".to_string()));
    }

    if let Some(previous_id) = thread.accepted_answer_id {
        let previous = load_post(conn, previous_id).await?;
        unaccept(conn, settings, &previous, &question).await?;
    }

    sqlx::query("UPDATE posts SET endorsed = TRUE WHERE id = ?")
        .bind(answer.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE threads SET accepted_answer_id = ? WHERE id = ?")
        .bind(answer.id)
        .bind(thread.id)
        .execute(&mut *conn)
        .await?;

    if answer.author_id != question.author_id {
        reputation::change_reputation(
            conn,
            settings,
            answer.author_id,
            settings.rep_gain_for_receiving_answer_acceptance,
            ReputeType::GainByAnswerAccepted,
            Some(question.id),
        )
        .await?;
        reputation::change_reputation(
            conn,
            settings,
            question.author_id,
            settings.rep_gain_for_accepting_answer,
            ReputeType::GainByAcceptingAnswer,
            Some(question.id),
        )
        .await?;
    }

    let recipients: Vec<i64> = [answer.author_id]
        .into_iter()
        .filter(|id| *id != user.id)
        .collect();
    activity::record_with_recipients(
        conn,
        &NewActivity::new(user.id, ActivityType::MarkAnswer, ContentType::Post, answer.id)
            .question(question.id),
        &recipients,
    )
    .await?;
    badges::handle_event(conn, settings, BadgeEvent::AcceptBestAnswer, user.id, Some(answer.id))
        .await?;
    tracing::info!(user_id = user.id, answer_id, "Answer accepted");
    Ok(Some(answer.id))
}

/// Flags a post as offensive. Returns the post afterwards (possibly auto-deleted).
pub async fn flag(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    post_id: i64,
) -> Result<Post, AppError> {
    let post = load_post(conn, post_id).await?;
    let (flags_today,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM post_flags WHERE user_id = ? AND flagged_at >= ?")
            .bind(user.id)
            .bind(start_of_today())
            .fetch_one(&mut *conn)
            .await?;
    let (already,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM post_flags WHERE user_id = ? AND post_id = ?")
            .bind(user.id)
            .bind(post.id)
            .fetch_one(&mut *conn)
            .await?;
    permissions::assert_can_flag(user, &post, flags_today, already > 0, settings)?;

    sqlx::query("INSERT INTO post_flags (user_id, post_id, flagged_at) VALUES (?, ?, ?)")
        .bind(user.id)
        .bind(post.id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    let (flag_count,): (i64,) = sqlx::query_as(
        "UPDATE posts SET offensive_flag_count = offensive_flag_count + 1 WHERE id = ? RETURNING offensive_flag_count",
    )
    .bind(post.id)
    .fetch_one(&mut *conn)
    .await?;

    let question = thread_question(conn, post.thread_id).await?;
    reputation::change_reputation(
        conn,
        settings,
        post.author_id,
        settings.rep_loss_for_receiving_flag,
        ReputeType::LoseByFlagged,
        Some(question.id),
    )
    .await?;
    if flag_count == FLAGS_FOR_PENALTY {
        reputation::change_reputation(
            conn,
            settings,
            post.author_id,
            settings.rep_loss_for_receiving_three_flags_per_revision,
            ReputeType::LoseByFlaggedLastRevision3Times,
            Some(question.id),
        )
        .await?;
    }
    if flag_count == FLAGS_FOR_AUTO_DELETE {
        reputation::change_reputation(
            conn,
            settings,
            post.author_id,
            settings.rep_loss_for_receiving_five_flags_per_revision,
            ReputeType::LoseByFlaggedLastRevision5Times,
            Some(question.id),
        )
        .await?;
        if !post.deleted {
            mark_deleted(conn, &post, user.id).await?;
            tracing::warn!(post_id, flag_count, "Post deleted after repeated offensive flags");
        }
    }

    let moderators: Vec<i64> = activity::get_admins_and_moderators(conn)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect();
    activity::record_with_recipients(
        conn,
        &NewActivity::new(user.id, ActivityType::MarkOffensive, ContentType::Post, post.id)
            .question(question.id)
            .summary(post.summary.clone()),
        &moderators,
    )
    .await?;
    badges::handle_event(conn, settings, BadgeEvent::FlagPost, user.id, Some(post.id)).await?;
    tracing::info!(user_id = user.id, post_id, flag_count, "Post flagged");

    Ok(load_post(conn, post.id).await?)
}

/// Withdraws the user's flag.
pub async fn unflag(
    conn: &mut SqliteConnection,
    user: &User,
    post_id: i64,
) -> Result<Post, AppError> {
    let post = load_post(conn, post_id).await?;
    let removed = sqlx::query("DELETE FROM post_flags WHERE user_id = ? AND post_id = ?")
        .bind(user.id)
        .bind(post.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::BadRequest("You have not flagged this post".to_string()));
    }
    sqlx::query(
        "UPDATE posts SET offensive_flag_count = MAX(offensive_flag_count - 1, 0) WHERE id = ?",
    )
    .bind(post.id)
    .execute(&mut *conn)
    .await?;
    activity::delete_activities(
        conn,
        ActivityType::MarkOffensive,
        ContentType::Post,
        post.id,
        Some(user.id),
    )
    .await?;
    Ok(load_post(conn, post.id).await?)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteResponse {
    pub is_favorite: bool,
    pub favourite_count: i64,
}

/// Toggles a question in the user's favourites.
pub async fn favorite(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    question_id: i64,
) -> Result<FavoriteResponse, AppError> {
    let (question, thread) = load_question(conn, question_id).await?;
    permissions::assert_can_post(user)?;

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM favorite_questions WHERE user_id = ? AND thread_id = ?")
            .bind(user.id)
            .bind(thread.id)
            .fetch_optional(&mut *conn)
            .await?;

    let is_favorite = match existing {
        Some((fav_id,)) => {
            sqlx::query("DELETE FROM favorite_questions WHERE id = ?")
                .bind(fav_id)
                .execute(&mut *conn)
                .await?;
            sqlx::query(
                "UPDATE threads SET favourite_count = MAX(favourite_count - 1, 0) WHERE id = ?",
            )
            .bind(thread.id)
            .execute(&mut *conn)
            .await?;
            activity::delete_activities(
                conn,
                ActivityType::Favorite,
                ContentType::FavoriteQuestion,
                fav_id,
                Some(user.id),
            )
            .await?;
            false
        }
        None => {
            let (fav_id,): (i64,) = sqlx::query_as(
                "INSERT INTO favorite_questions (user_id, thread_id, added_at) VALUES (?, ?, ?) RETURNING id",
            )
            .bind(user.id)
            .bind(thread.id)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await?;
            sqlx::query("UPDATE threads SET favourite_count = favourite_count + 1 WHERE id = ?")
                .bind(thread.id)
                .execute(&mut *conn)
                .await?;

            let recipients: Vec<i64> = [question.author_id]
                .into_iter()
                .filter(|id| *id != user.id)
                .collect();
            activity::record_with_recipients(
                conn,
                &NewActivity::new(
                    user.id,
                    ActivityType::Favorite,
                    ContentType::FavoriteQuestion,
                    fav_id,
                )
                .question(question.id),
                &recipients,
            )
            .await?;
            badges::handle_event(
                conn,
                settings,
                BadgeEvent::SelectFavoriteQuestion,
                user.id,
                Some(question.id),
            )
            .await?;
            true
        }
    };

    let thread = load_thread(conn, thread.id).await?;
    Ok(FavoriteResponse {
        is_favorite,
        favourite_count: thread.favourite_count,
    })
}

pub async fn close(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    question_id: i64,
    reason: &str,
) -> Result<Thread, AppError> {
    let (question, thread) = load_question(conn, question_id).await?;
    permissions::assert_can_close(user, &question, settings)?;
    if thread.closed {
        return Err(AppError::BadRequest("Question is already closed".to_string()));
    }
    let thread = sqlx::query_as::<_, Thread>(
        "UPDATE threads SET closed = TRUE, closed_by = ?, closed_at = ?, close_reason = ? WHERE id = ? RETURNING *",
    )
    .bind(user.id)
    .bind(Utc::now())
    .bind(reason.trim())
    .bind(thread.id)
    .fetch_one(&mut *conn)
    .await?;
    tracing::info!(user_id = user.id, question_id, "Question closed");
    Ok(thread)
}

pub async fn reopen(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    question_id: i64,
) -> Result<Thread, AppError> {
    let (question, thread) = load_question(conn, question_id).await?;
    permissions::assert_can_reopen(user, &question, settings)?;
    if !thread.closed {
        return Err(AppError::BadRequest("Question is not closed".to_string()));
    }
    let thread = sqlx::query_as::<_, Thread>(
        "UPDATE threads SET closed = FALSE, closed_by = NULL, closed_at = NULL, close_reason = NULL WHERE id = ? RETURNING *",
    )
    .bind(thread.id)
    .fetch_one(&mut *conn)
    .await?;
    tracing::info!(user_id = user.id, question_id, "Question reopened");
    Ok(thread)
}

/// Publishes a post held for moderation. The returned update is attributed to the author.
pub async fn approve(
    conn: &mut SqliteConnection,
    moderator: &User,
    post_id: i64,
) -> Result<(Post, PostUpdate), AppError> {
    permissions::assert_can_moderate(moderator)?;
    let post = load_post(conn, post_id).await?;
    if post.approved {
        return Err(AppError::BadRequest("Post is already published".to_string()));
    }

    let post = sqlx::query_as::<_, Post>("UPDATE posts SET approved = TRUE WHERE id = ? RETURNING *")
        .bind(post.id)
        .fetch_one(&mut *conn)
        .await?;
    let question = thread_question(conn, post.thread_id).await?;

    let activity_type = match post.kind() {
        PostType::Question => {
            sqlx::query("UPDATE threads SET approved = TRUE WHERE id = ?")
                .bind(post.thread_id)
                .execute(&mut *conn)
                .await?;
            ActivityType::AskQuestion
        }
        PostType::Answer => {
            sqlx::query("UPDATE threads SET answer_count = answer_count + 1 WHERE id = ?")
                .bind(post.thread_id)
                .execute(&mut *conn)
                .await?;
            ActivityType::Answer
        }
        _ => {
            let parent = load_post(conn, post.parent_id.unwrap_or(question.id)).await?;
            comment_activity_type(&parent)
        }
    };

    activity::delete_activities(
        conn,
        ActivityType::ModeratedNewPost,
        ContentType::Post,
        post.id,
        None,
    )
    .await?;
    record_response(conn, post.author_id, activity_type, &post, &question).await?;
    let mentioned = resolve_mentions(conn, &post.text, post.author_id).await?;
    record_mentions(conn, post.author_id, &post, question.id, &mentioned).await?;
    tracing::info!(moderator_id = moderator.id, post_id, "Post approved");

    let update = PostUpdate {
        post_id: post.id,
        activity_type,
        actor_id: post.author_id,
        mentioned_ids: mentioned,
    };
    Ok((post, update))
}

async fn thread_posts(
    conn: &mut SqliteConnection,
    thread_id: i64,
) -> Result<Vec<PostWithAuthor>, sqlx::Error> {
    sqlx::query_as::<_, PostWithAuthor>(
        r#"
        SELECT p.*,
               CASE WHEN p.is_anonymous THEN NULL ELSE u.username END AS author_username,
               u.reputation AS author_reputation
        FROM posts p JOIN users u ON u.id = p.author_id
        WHERE p.thread_id = ?
        ORDER BY p.endorsed DESC, p.score DESC, p.added_at ASC, p.id ASC
        "#,
    )
    .bind(thread_id)
    .fetch_all(&mut *conn)
    .await
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: PostWithAuthor,
    pub comments: Vec<PostWithAuthor>,
}

/// Question page: the thread, its question, answers (accepted first, then by score)
/// and their comments.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    pub thread: Thread,
    pub question: PostWithComments,
    pub answers: Vec<PostWithComments>,
    pub is_favorite: bool,
}

/// Arranges thread posts visible to `viewer` into question, answers and comments.
pub fn arrange_thread(
    posts: Vec<PostWithAuthor>,
    viewer: Option<&User>,
) -> Option<(PostWithComments, Vec<PostWithComments>)> {
    let visible: Vec<PostWithAuthor> = posts
        .into_iter()
        .filter(|p| permissions::can_see_post(viewer, &p.post))
        .collect();
    let (comments, posts): (Vec<_>, Vec<_>) =
        visible.into_iter().partition(|p| p.post.is_comment());

    let mut comments = comments;
    comments.sort_by_key(|c| (c.post.added_at, c.post.id));
    let with_comments = |p: PostWithAuthor| {
        let own: Vec<PostWithAuthor> = comments
            .iter()
            .filter(|c| c.post.parent_id == Some(p.post.id))
            .cloned()
            .collect();
        PostWithComments {
            post: p,
            comments: own,
        }
    };

    let mut question = None;
    let mut answers = Vec::new();
    for p in posts {
        match p.post.kind() {
            PostType::Question => question = Some(with_comments(p)),
            PostType::Answer => answers.push(with_comments(p)),
            _ => {}
        }
    }
    question.map(|q| (q, answers))
}

/// Loads a question page and counts the view.
pub async fn view_question(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    viewer: Option<&User>,
    question_id: i64,
) -> Result<QuestionView, AppError> {
    let (question, thread) = load_question(conn, question_id).await?;
    if !permissions::can_see_post(viewer, &question) {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    let thread = sqlx::query_as::<_, Thread>(
        "UPDATE threads SET view_count = view_count + 1 WHERE id = ? RETURNING *",
    )
    .bind(thread.id)
    .fetch_one(&mut *conn)
    .await?;
    let actor_id = viewer.map(|v| v.id).unwrap_or(question.author_id);
    badges::handle_event(conn, settings, BadgeEvent::ViewQuestion, actor_id, Some(question.id))
        .await?;

    let is_favorite = match viewer {
        Some(v) => {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM favorite_questions WHERE user_id = ? AND thread_id = ?",
            )
            .bind(v.id)
            .bind(thread.id)
            .fetch_one(&mut *conn)
            .await?;
            count > 0
        }
        None => false,
    };

    let posts = thread_posts(conn, thread.id).await?;
    let (question, answers) = arrange_thread(posts, viewer)
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
    Ok(QuestionView {
        thread,
        question,
        answers,
        is_favorite,
    })
}

#[derive(Debug, Serialize)]
pub struct QuestionPage {
    pub questions: Vec<QuestionSummary>,
    pub paginator: Paginator,
}

fn push_question_filters(qb: &mut QueryBuilder<'_, Sqlite>, params: &QuestionListParams) {
    qb.push(" WHERE p.deleted = FALSE AND p.approved = TRUE");
    if params.scope.as_deref() == Some("unanswered") {
        qb.push(" AND t.answer_count = 0");
    }
    if let Some(raw) = &params.tags {
        for tag in raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            qb.push(
                " AND EXISTS (SELECT 1 FROM thread_tags tt JOIN tags tg ON tg.id = tt.tag_id WHERE tt.thread_id = t.id AND tg.name = ",
            )
            .push_bind(tag.to_lowercase())
            .push(")");
        }
    }
    if let Some(query) = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", query.to_lowercase());
        qb.push(" AND (LOWER(t.title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(p.text) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn question_order(sort: Option<&str>) -> &'static str {
    match sort {
        Some("age") => "p.added_at DESC, p.id DESC",
        Some("answers") => "t.answer_count DESC, t.last_activity_at DESC, p.id DESC",
        Some("votes") => "p.score DESC, t.last_activity_at DESC, p.id DESC",
        _ => "t.last_activity_at DESC, p.id DESC",
    }
}

pub async fn list_questions(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    params: &QuestionListParams,
) -> Result<QuestionPage, sqlx::Error> {
    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COUNT(*) FROM threads t JOIN posts p ON p.thread_id = t.id AND p.post_type = 'question'",
    );
    push_question_filters(&mut count_qb, params);
    let (total,): (i64,) = count_qb.build_query_as().fetch_one(&mut *conn).await?;

    let paginator = Paginator::new(
        total,
        settings.questions_page_size,
        parse_page(params.page.as_deref()),
    );

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT t.id AS thread_id, p.id AS question_id, t.title, t.tagnames, p.score,
               t.answer_count, t.view_count, t.favourite_count, t.closed,
               (t.accepted_answer_id IS NOT NULL) AS has_accepted_answer, p.summary,
               p.author_id,
               CASE WHEN p.is_anonymous THEN NULL ELSE u.username END AS author_username,
               p.added_at, t.last_activity_at
        FROM threads t
        JOIN posts p ON p.thread_id = t.id AND p.post_type = 'question'
        JOIN users u ON u.id = p.author_id
        "#,
    );
    push_question_filters(&mut qb, params);
    qb.push(" ORDER BY ")
        .push(question_order(params.sort.as_deref()))
        .push(" LIMIT ")
        .push_bind(paginator.per_page)
        .push(" OFFSET ")
        .push_bind(paginator.offset());
    let questions = qb
        .build_query_as::<QuestionSummary>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(QuestionPage {
        questions,
        paginator,
    })
}

/// Revision history, newest first.
pub async fn revisions(
    conn: &mut SqliteConnection,
    viewer: Option<&User>,
    post_id: i64,
) -> Result<Vec<PostRevision>, AppError> {
    let post = load_post(conn, post_id).await?;
    if !permissions::can_see_post(viewer, &post) {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    Ok(sqlx::query_as::<_, PostRevision>(
        "SELECT * FROM post_revisions WHERE post_id = ? ORDER BY revision DESC",
    )
    .bind(post.id)
    .fetch_all(&mut *conn)
    .await?)
}
