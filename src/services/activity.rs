//! Activity log, inbox audit rows and the feeds built from them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::config::ForumSettings;
use crate::models::{
    activity::{
        ActivityType, ContentType, RESPONSE_ACTIVITY_TYPES_FOR_DISPLAY, STATUS_NEW, STATUS_SEEN,
    },
    post::{PostType, RejectReason},
    user::User,
};
use crate::services::badges::Badge;
use crate::utils::slug::slugify;

/// Activity about to be written.
#[derive(Debug, Clone)]
pub struct NewActivity {
    /// The acting user.
    pub user_id: i64,
    pub activity_type: ActivityType,
    pub content_type: ContentType,
    pub object_id: i64,
    pub question_id: Option<i64>,
    pub summary: String,
}

impl NewActivity {
    pub fn new(
        user_id: i64,
        activity_type: ActivityType,
        content_type: ContentType,
        object_id: i64,
    ) -> Self {
        Self {
            user_id,
            activity_type,
            content_type,
            object_id,
            question_id: None,
            summary: String::new(),
        }
    }

    pub fn question(mut self, question_id: i64) -> Self {
        self.question_id = Some(question_id);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

pub async fn record(conn: &mut SqliteConnection, activity: &NewActivity) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO activities (user_id, activity_type, active_at, content_type, object_id, question_id, summary)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(activity.user_id)
    .bind(activity.activity_type.code())
    .bind(Utc::now())
    .bind(activity.content_type.as_str())
    .bind(activity.object_id)
    .bind(activity.question_id)
    .bind(&activity.summary)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Adds inbox rows (status new); users already on the list are left alone.
pub async fn add_recipients(
    conn: &mut SqliteConnection,
    activity_id: i64,
    recipients: &[i64],
) -> Result<(), sqlx::Error> {
    for user_id in recipients {
        sqlx::query(
            "INSERT OR IGNORE INTO activity_audit_status (activity_id, user_id, status) VALUES (?, ?, ?)",
        )
        .bind(activity_id)
        .bind(user_id)
        .bind(STATUS_NEW)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn record_with_recipients(
    conn: &mut SqliteConnection,
    activity: &NewActivity,
    recipients: &[i64],
) -> Result<i64, sqlx::Error> {
    let id = record(conn, activity).await?;
    add_recipients(conn, id, recipients).await?;
    Ok(id)
}

/// Removes activities of one type about an object, optionally only those by one actor.
pub async fn delete_activities(
    conn: &mut SqliteConnection,
    activity_type: ActivityType,
    content_type: ContentType,
    object_id: i64,
    user_id: Option<i64>,
) -> Result<u64, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("DELETE FROM activities WHERE activity_type = ");
    qb.push_bind(activity_type.code())
        .push(" AND content_type = ")
        .push_bind(content_type.as_str())
        .push(" AND object_id = ")
        .push_bind(object_id);
    if let Some(user_id) = user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    let result = qb.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

pub async fn get_admins_and_moderators(
    conn: &mut SqliteConnection,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE is_superuser = TRUE OR status IN ('m', 'd') ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await
}

/// Site-relative link to a post inside its thread, anchored at the answer for answers
/// and at the parent answer for comments on answers.
pub fn recent_link(
    question_id: i64,
    title: &str,
    post_type: PostType,
    post_id: i64,
    parent: Option<(PostType, i64)>,
) -> String {
    let base = format!("/question/{}/{}", question_id, slugify(title));
    match (post_type, parent) {
        (PostType::Answer, _) => format!("{}#{}", base, post_id),
        (PostType::Comment, Some((PostType::Answer, parent_id))) => {
            format!("{}#{}", base, parent_id)
        }
        _ => base,
    }
}

/// Entry of the "recent activity" profile tab.
#[derive(Debug, Clone, Serialize)]
pub struct RecentEvent {
    pub time: DateTime<Utc>,
    pub activity_type: i64,
    pub type_name: String,
    pub title: String,
    pub summary: String,
    pub title_link: String,
}

#[derive(FromRow)]
struct RecentPostRow {
    activity_type: i64,
    active_at: DateTime<Utc>,
    post_id: i64,
    post_type: String,
    summary: String,
    parent_id: Option<i64>,
    parent_type: Option<String>,
    question_id: i64,
    title: String,
}

#[derive(FromRow)]
struct RecentAwardRow {
    active_at: DateTime<Utc>,
    slug: String,
}

const RECENT_POST_TYPES: [ActivityType; 7] = [
    ActivityType::AskQuestion,
    ActivityType::Answer,
    ActivityType::CommentQuestion,
    ActivityType::CommentAnswer,
    ActivityType::UpdateQuestion,
    ActivityType::UpdateAnswer,
    ActivityType::MarkAnswer,
];

/// The user's own recent actions, newest first. Deleted posts and posts in deleted
/// questions are left out.
pub async fn user_recent(
    conn: &mut SqliteConnection,
    user_id: i64,
    limit: usize,
) -> Result<Vec<RecentEvent>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT a.activity_type, a.active_at, p.id AS post_id, p.post_type, p.summary,
               parent.id AS parent_id, parent.post_type AS parent_type,
               q.id AS question_id, t.title
        FROM activities a
        JOIN posts p ON p.id = a.object_id
        JOIN threads t ON t.id = p.thread_id
        JOIN posts q ON q.thread_id = t.id AND q.post_type = 'question'
        LEFT JOIN posts parent ON parent.id = p.parent_id
        WHERE a.content_type = 'post' AND p.deleted = FALSE AND q.deleted = FALSE
          AND a.user_id = "#,
    );
    qb.push_bind(user_id).push(" AND a.activity_type IN (");
    let mut codes = qb.separated(", ");
    for t in RECENT_POST_TYPES {
        codes.push_bind(t.code());
    }
    qb.push(") ORDER BY a.active_at DESC, a.id DESC LIMIT ")
        .push_bind(limit as i64);

    let rows: Vec<RecentPostRow> = qb.build_query_as().fetch_all(&mut *conn).await?;

    let mut events: Vec<RecentEvent> = rows
        .into_iter()
        .filter_map(|row| {
            let activity = ActivityType::from_code(row.activity_type)?;
            let post_type = PostType::parse(&row.post_type)?;
            let parent = match (row.parent_type.as_deref().and_then(PostType::parse), row.parent_id) {
                (Some(t), Some(id)) => Some((t, id)),
                _ => None,
            };
            Some(RecentEvent {
                time: row.active_at,
                activity_type: row.activity_type,
                type_name: activity.label().to_string(),
                title_link: recent_link(row.question_id, &row.title, post_type, row.post_id, parent),
                title: row.title,
                summary: row.summary,
            })
        })
        .collect();

    let awards: Vec<RecentAwardRow> = sqlx::query_as(
        r#"
        SELECT a.active_at, b.slug
        FROM activities a
        JOIN awards aw ON aw.id = a.object_id
        JOIN badges b ON b.id = aw.badge_id
        WHERE a.user_id = ? AND a.activity_type = ? AND a.content_type = 'award'
        ORDER BY a.active_at DESC, a.id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(ActivityType::Prize.code())
    .bind(limit as i64)
    .fetch_all(&mut *conn)
    .await?;

    events.extend(awards.into_iter().filter_map(|row| {
        let badge = Badge::from_slug(&row.slug)?;
        Some(RecentEvent {
            time: row.active_at,
            activity_type: ActivityType::Prize.code(),
            type_name: ActivityType::Prize.label().to_string(),
            title: badge.name().to_string(),
            summary: badge.description().to_string(),
            title_link: format!("/badges/{}", badge.slug()),
        })
    }));

    events.sort_by(|a, b| b.time.cmp(&a.time));
    events.truncate(limit);
    Ok(events)
}

/// Inbox sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxSection {
    Forum,
    Flags,
}

impl InboxSection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "forum" => Some(InboxSection::Forum),
            "flags" => Some(InboxSection::Flags),
            _ => None,
        }
    }

    pub fn activity_types(self, settings: &ForumSettings) -> Vec<ActivityType> {
        match self {
            InboxSection::Forum => RESPONSE_ACTIVITY_TYPES_FOR_DISPLAY.to_vec(),
            InboxSection::Flags => {
                let mut types = vec![ActivityType::MarkOffensive];
                if settings.enable_content_moderation {
                    types.push(ActivityType::ModeratedNewPost);
                    types.push(ActivityType::ModeratedPostEdit);
                }
                types
            }
        }
    }
}

/// Inbox entry; items about the same question nest under the newest one.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseItem {
    /// Audit row id, used to mark the item seen.
    pub id: i64,
    pub activity_id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub username: String,
    pub is_new: bool,
    pub response_type: String,
    pub response_title: String,
    pub response_url: String,
    pub response_snippet: String,
    pub question_id: Option<i64>,
    pub nested_responses: Vec<ResponseItem>,
}

#[derive(FromRow)]
struct ResponseRow {
    memo_id: i64,
    status: i64,
    activity_id: i64,
    activity_type: i64,
    active_at: DateTime<Utc>,
    activity_summary: String,
    question_id: Option<i64>,
    actor_id: i64,
    actor_username: String,
    post_id: Option<i64>,
    post_type: Option<String>,
    post_summary: Option<String>,
    title: Option<String>,
}

impl ResponseRow {
    fn into_item(self) -> ResponseItem {
        let response_type = ActivityType::from_code(self.activity_type)
            .map(|t| t.label().to_string())
            .unwrap_or_default();

        let response_url = match (self.question_id, &self.title) {
            (Some(qid), Some(title)) => {
                let base = format!("/question/{}/{}", qid, slugify(title));
                match (self.post_type.as_deref().and_then(PostType::parse), self.post_id) {
                    (Some(PostType::Answer), Some(id)) => format!("{}#post-id-{}", base, id),
                    (Some(PostType::Comment), Some(id)) => format!("{}#comment-{}", base, id),
                    _ => base,
                }
            }
            _ => String::new(),
        };

        ResponseItem {
            id: self.memo_id,
            activity_id: self.activity_id,
            timestamp: self.active_at,
            user_id: self.actor_id,
            username: self.actor_username,
            is_new: self.status == STATUS_NEW,
            response_type,
            response_title: self.title.unwrap_or_default(),
            response_url,
            response_snippet: self.post_summary.unwrap_or(self.activity_summary),
            question_id: self.question_id,
            nested_responses: Vec::new(),
        }
    }
}

/// Nests consecutive items of the same question under the newest of them, then orders
/// the groups newest first.
pub fn group_responses(mut items: Vec<ResponseItem>) -> Vec<ResponseItem> {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    items.sort_by(|a, b| b.question_id.cmp(&a.question_id));

    let mut grouped: Vec<ResponseItem> = Vec::new();
    for item in items {
        match grouped.last_mut() {
            Some(last) if last.question_id.is_some() && last.question_id == item.question_id => {
                last.nested_responses.push(item)
            }
            _ => grouped.push(item),
        }
    }
    grouped.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    grouped
}

#[derive(Debug, Serialize)]
pub struct InboxView {
    pub section: &'static str,
    pub responses: Vec<ResponseItem>,
    pub reject_reasons: Vec<RejectReason>,
}

pub async fn user_responses(
    conn: &mut SqliteConnection,
    user_id: i64,
    section: InboxSection,
    settings: &ForumSettings,
) -> Result<InboxView, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT s.id AS memo_id, s.status, a.id AS activity_id, a.activity_type, a.active_at,
               a.summary AS activity_summary, a.question_id,
               u.id AS actor_id, u.username AS actor_username,
               p.id AS post_id, p.post_type, p.summary AS post_summary,
               t.title
        FROM activity_audit_status s
        JOIN activities a ON a.id = s.activity_id
        JOIN users u ON u.id = a.user_id
        LEFT JOIN posts p ON a.content_type = 'post' AND p.id = a.object_id
        LEFT JOIN posts q ON q.id = a.question_id
        LEFT JOIN threads t ON t.id = q.thread_id
        WHERE s.user_id = "#,
    );
    qb.push_bind(user_id).push(" AND a.activity_type IN (");
    let mut codes = qb.separated(", ");
    for t in section.activity_types(settings) {
        codes.push_bind(t.code());
    }
    qb.push(") ORDER BY a.active_at DESC, a.id DESC LIMIT ")
        .push_bind(settings.user_view_data_size as i64);

    let rows: Vec<ResponseRow> = qb.build_query_as().fetch_all(&mut *conn).await?;
    let responses = group_responses(rows.into_iter().map(ResponseRow::into_item).collect());

    let reject_reasons = sqlx::query_as::<_, RejectReason>(
        "SELECT * FROM post_flag_reasons ORDER BY title",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(InboxView {
        section: match section {
            InboxSection::Forum => "forum",
            InboxSection::Flags => "flags",
        },
        responses,
        reject_reasons,
    })
}

/// Marks the given inbox rows of `user_id` as seen; returns how many changed.
pub async fn mark_seen(
    conn: &mut SqliteConnection,
    user_id: i64,
    memo_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    if memo_ids.is_empty() {
        return Ok(0);
    }
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE activity_audit_status SET status = ");
    qb.push_bind(STATUS_SEEN)
        .push(" WHERE user_id = ")
        .push_bind(user_id)
        .push(" AND id IN (");
    let mut ids = qb.separated(", ");
    for id in memo_ids {
        ids.push_bind(*id);
    }
    qb.push(")");
    let result = qb.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(id: i64, question_id: Option<i64>, minutes_ago: i64) -> ResponseItem {
        ResponseItem {
            id,
            activity_id: id,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            user_id: 1,
            username: "alice".to_string(),
            is_new: true,
            response_type: "answered a question".to_string(),
            response_title: String::new(),
            response_url: String::new(),
            response_snippet: String::new(),
            question_id,
            nested_responses: Vec::new(),
        }
    }

    #[test]
    fn responses_for_same_question_nest_under_newest() {
        let grouped = group_responses(vec![
            item(1, Some(10), 30),
            item(2, Some(20), 20),
            item(3, Some(10), 5),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].id, 3);
        assert_eq!(grouped[0].nested_responses.len(), 1);
        assert_eq!(grouped[0].nested_responses[0].id, 1);
        assert_eq!(grouped[1].id, 2);
    }

    #[test]
    fn items_without_question_are_never_grouped() {
        let grouped = group_responses(vec![item(1, None, 3), item(2, None, 2)]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].id, 2);
    }

    #[test]
    fn recent_links_anchor_on_answers() {
        assert_eq!(
            recent_link(5, "How to borrow?", PostType::Question, 5, None),
            "/question/5/how-to-borrow"
        );
        assert_eq!(
            recent_link(5, "How to borrow?", PostType::Answer, 9, Some((PostType::Question, 5))),
            "/question/5/how-to-borrow#9"
        );
        assert_eq!(
            recent_link(5, "How to borrow?", PostType::Comment, 12, Some((PostType::Answer, 9))),
            "/question/5/how-to-borrow#9"
        );
        assert_eq!(
            recent_link(5, "How to borrow?", PostType::Comment, 13, Some((PostType::Question, 5))),
            "/question/5/how-to-borrow"
        );
    }

    #[test]
    fn flags_section_grows_under_moderation() {
        let mut settings = ForumSettings::default();
        assert_eq!(InboxSection::Flags.activity_types(&settings).len(), 1);
        settings.enable_content_moderation = true;
        assert_eq!(InboxSection::Flags.activity_types(&settings).len(), 3);
        assert!(
            InboxSection::Forum
                .activity_types(&settings)
                .contains(&ActivityType::Mention)
        );
    }
}
