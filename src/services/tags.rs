//! Tag validation, thread tagging and marked ("interesting"/"ignored") tags.

use std::sync::LazyLock;

use regex::Regex;
use sqlx::SqliteConnection;

use crate::config::ForumSettings;
use crate::error::AppError;
use crate::models::tag::{MarkAction, MarkedTagNames, Tag, TagMarkReason, UserTagUsage};

static TAG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w+.#-]+$").expect("valid tag regex"));

/// How many deleted tag names a cleanup report lists.
pub const REPORTED_TAGS_LIMIT: usize = 50;

/// Lower-cases, splits on whitespace and commas, removes duplicates (first occurrence
/// wins) and validates every name.
pub fn clean_tag_names(raw: &[String], settings: &ForumSettings) -> Result<Vec<String>, AppError> {
    let mut names: Vec<String> = Vec::new();
    for name in raw
        .iter()
        .flat_map(|r| r.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|n| !n.is_empty())
    {
        let name = name.to_lowercase();
        if name.chars().count() > settings.max_tag_length {
            return Err(AppError::BadRequest(format!(
                "Each tag must be shorter than {} characters",
                settings.max_tag_length + 1
            )));
        }
        if !TAG_NAME_RE.is_match(&name) {
            return Err(AppError::BadRequest(format!(
                "Tag '{}' may only contain letters, digits and the characters + . # -",
                name
            )));
        }
        if !names.contains(&name) {
            names.push(name);
        }
    }

    if names.is_empty() {
        return Err(AppError::BadRequest("At least one tag is required".to_string()));
    }
    if names.len() > settings.max_tags_per_question {
        return Err(AppError::BadRequest(format!(
            "Please use {} tags or less",
            settings.max_tags_per_question
        )));
    }
    Ok(names)
}

async fn get_or_create_tag(
    conn: &mut SqliteConnection,
    name: &str,
    user_id: i64,
) -> Result<Tag, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO tags (name, created_by, used_count) VALUES (?, ?, 0)")
        .bind(name)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
}

/// Replaces the tags of a thread, keeping `used_count` and `threads.tagnames` in step.
pub async fn set_thread_tags(
    conn: &mut SqliteConnection,
    thread_id: i64,
    user_id: i64,
    names: &[String],
) -> Result<(), sqlx::Error> {
    let old: Vec<(i64,)> = sqlx::query_as("SELECT tag_id FROM thread_tags WHERE thread_id = ?")
        .bind(thread_id)
        .fetch_all(&mut *conn)
        .await?;
    for (tag_id,) in old {
        sqlx::query("UPDATE tags SET used_count = MAX(used_count - 1, 0) WHERE id = ?")
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query("DELETE FROM thread_tags WHERE thread_id = ?")
        .bind(thread_id)
        .execute(&mut *conn)
        .await?;

    for name in names {
        let tag = get_or_create_tag(conn, name, user_id).await?;
        sqlx::query("INSERT INTO thread_tags (thread_id, tag_id) VALUES (?, ?)")
            .bind(thread_id)
            .bind(tag.id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE tags SET used_count = used_count + 1, deleted = FALSE WHERE id = ?")
            .bind(tag.id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("UPDATE threads SET tagnames = ? WHERE id = ?")
        .bind(names.join(" "))
        .bind(thread_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Adds or removes marks; names ending in `*` are stored as wildcards.
pub async fn mark_tags(
    conn: &mut SqliteConnection,
    user_id: i64,
    names: &[String],
    reason: TagMarkReason,
    action: MarkAction,
) -> Result<MarkedTagNames, AppError> {
    for raw in names {
        let name = raw.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }

        if let Some(prefix) = name.strip_suffix('*') {
            if !prefix.is_empty() && !TAG_NAME_RE.is_match(prefix) {
                return Err(AppError::BadRequest(format!("Invalid wildcard '{}'", name)));
            }
            match action {
                MarkAction::Add => {
                    sqlx::query(
                        r#"
                        INSERT INTO marked_tag_wildcards (user_id, pattern, reason) VALUES (?, ?, ?)
                        ON CONFLICT (user_id, pattern) DO UPDATE SET reason = excluded.reason
                        "#,
                    )
                    .bind(user_id)
                    .bind(&name)
                    .bind(reason.as_str())
                    .execute(&mut *conn)
                    .await?;
                }
                MarkAction::Remove => {
                    sqlx::query(
                        "DELETE FROM marked_tag_wildcards WHERE user_id = ? AND pattern = ? AND reason = ?",
                    )
                    .bind(user_id)
                    .bind(&name)
                    .bind(reason.as_str())
                    .execute(&mut *conn)
                    .await?;
                }
            }
            continue;
        }

        if !TAG_NAME_RE.is_match(&name) {
            return Err(AppError::BadRequest(format!("Invalid tag '{}'", name)));
        }

        match action {
            MarkAction::Add => {
                let tag = get_or_create_tag(conn, &name, user_id).await?;
                sqlx::query(
                    r#"
                    INSERT INTO marked_tags (user_id, tag_id, reason) VALUES (?, ?, ?)
                    ON CONFLICT (user_id, tag_id) DO UPDATE SET reason = excluded.reason
                    "#,
                )
                .bind(user_id)
                .bind(tag.id)
                .bind(reason.as_str())
                .execute(&mut *conn)
                .await?;
            }
            MarkAction::Remove => {
                sqlx::query(
                    r#"
                    DELETE FROM marked_tags
                    WHERE user_id = ? AND reason = ?
                      AND tag_id IN (SELECT id FROM tags WHERE name = ?)
                    "#,
                )
                .bind(user_id)
                .bind(reason.as_str())
                .bind(&name)
                .execute(&mut *conn)
                .await?;
            }
        }
    }

    Ok(marked_tag_names(conn, user_id).await?)
}

pub async fn marked_tag_names(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<MarkedTagNames, sqlx::Error> {
    let mut marks: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT t.name, m.reason FROM marked_tags m JOIN tags t ON t.id = m.tag_id
        WHERE m.user_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let wildcards: Vec<(String, String)> = sqlx::query_as(
        "SELECT pattern, reason FROM marked_tag_wildcards WHERE user_id = ? ORDER BY pattern",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    marks.extend(wildcards);

    let mut names = MarkedTagNames::default();
    for (name, reason) in marks {
        match reason.as_str() {
            "good" => names.good.push(name),
            "bad" => names.bad.push(name),
            "subscribed" => names.subscribed.push(name),
            _ => {}
        }
    }
    Ok(names)
}

/// Lists live tags by usage (default) or name, optionally filtered by substring.
pub async fn list_tags(
    conn: &mut SqliteConnection,
    sort: Option<&str>,
    query: Option<&str>,
) -> Result<Vec<Tag>, sqlx::Error> {
    let order = match sort {
        Some("name") => "name ASC",
        _ => "used_count DESC, name ASC",
    };
    let pattern = format!("%{}%", query.unwrap_or("").trim().to_lowercase());
    sqlx::query_as::<_, Tag>(&format!(
        "SELECT * FROM tags WHERE deleted = FALSE AND name LIKE ? ORDER BY {}",
        order
    ))
    .bind(pattern)
    .fetch_all(&mut *conn)
    .await
}

/// Tags the user put on their own questions, most used first.
pub async fn user_tag_usage(
    conn: &mut SqliteConnection,
    user_id: i64,
    limit: i64,
) -> Result<Vec<UserTagUsage>, sqlx::Error> {
    sqlx::query_as::<_, UserTagUsage>(
        r#"
        SELECT t.id, t.name, COUNT(*) AS user_tag_usage_count
        FROM tags t
        JOIN thread_tags tt ON tt.tag_id = t.id
        JOIN posts p ON p.thread_id = tt.thread_id AND p.post_type = 'question'
        WHERE p.author_id = ? AND p.deleted = FALSE
        GROUP BY t.id, t.name
        ORDER BY user_tag_usage_count DESC, t.name ASC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
}

/// Deletes every tag that no thread uses and returns their names.
pub async fn delete_unused_tags(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let unused: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, name FROM tags WHERE id NOT IN (SELECT tag_id FROM thread_tags) ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await?;

    for (id, _) in &unused {
        sqlx::query("DELETE FROM marked_tags WHERE tag_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(unused.into_iter().map(|(_, name)| name).collect())
}

/// Human readable summary of a cleanup; lists at most [`REPORTED_TAGS_LIMIT`] names.
pub fn deleted_tags_report(names: &[String]) -> String {
    match names.len() {
        0 => "Did not find any unused tags".to_string(),
        n if n <= REPORTED_TAGS_LIMIT => format!("Deleted unused tags: {}", names.join(", ")),
        n => format!(
            "Deleted {} unused tags, first {}: {}",
            n,
            REPORTED_TAGS_LIMIT,
            names[..REPORTED_TAGS_LIMIT].join(", ")
        ),
    }
}

/// Seeds `tag0..tag{count-1}` owned by `user_id`; returns how many were new.
pub async fn create_tags(
    conn: &mut SqliteConnection,
    count: usize,
    user_id: i64,
) -> Result<u64, sqlx::Error> {
    let mut created = 0;
    for i in 0..count {
        let result =
            sqlx::query("INSERT OR IGNORE INTO tags (name, created_by, used_count) VALUES (?, ?, 0)")
                .bind(format!("tag{}", i))
                .bind(user_id)
                .execute(&mut *conn)
                .await?;
        created += result.rows_affected();
    }
    Ok(created)
}
