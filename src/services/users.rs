//! Accounts, the user directory and profile tabs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::config::{ForumSettings, KarmaMode, MarkedTagsVisibility};
use crate::error::{AppError, is_unique_violation};
use crate::models::{
    activity::{ActivityType, ContentType},
    email_feed::{EmailFeedSetting, EmailSubscriptionsRequest, FeedType, Frequency},
    tag::{MarkedTagNames, UserTagUsage},
    thread::QuestionSummary,
    user::{CreateUserRequest, EditUserRequest, User, UserCard, UserListParams, UserStatus},
};
use crate::services::{
    activity::{self, NewActivity},
    badges::{self, BadgeCount, BadgeEvent},
    groups::{self, GroupEntry},
    notifications::{EXCLUDE_IGNORED, INCLUDE_ALL, INCLUDE_INTERESTING},
    permissions, reputation, tags, voting,
};
use crate::utils::{
    hash::hash_password,
    html::{clean_html, strip_tags},
    pagination::{Paginator, parse_page},
};

const USER_CARD_COLUMNS: &str =
    "u.id, u.username, u.status, u.reputation, u.gold, u.silver, u.bronze, u.location, u.date_joined";

pub async fn load_user(conn: &mut SqliteConnection, user_id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Creates feed settings the user does not have yet, with each feed's default frequency.
pub async fn add_missing_subscriptions(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<u64, sqlx::Error> {
    let mut added = 0;
    for feed in FeedType::ALL {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO email_feed_settings (subscriber_id, feed_type, frequency, added_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(feed.as_str())
        .bind(feed.default_frequency().as_str())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        added += result.rows_affected();
    }
    Ok(added)
}

/// Creates an account with default email subscriptions.
pub async fn register(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    req: &CreateUserRequest,
) -> Result<User, AppError> {
    let password = hash_password(&req.password)?;
    let status = if settings.enable_content_moderation {
        UserStatus::Watched
    } else {
        UserStatus::Approved
    };

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password, status, reputation, date_joined)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(req.username.trim())
    .bind(req.email.trim())
    .bind(password)
    .bind(status.code())
    .bind(settings.min_reputation)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Username already exists".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    add_missing_subscriptions(conn, user.id).await?;
    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok(user)
}

/// New consecutive-days count for a visit at `now`, and whether it grew.
///
/// Same-day visits leave it alone; a visit on the next calendar day extends the streak
/// and any longer gap restarts it at 1.
pub fn next_visit_count(
    last_seen: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    count: i64,
) -> (i64, bool) {
    let Some(last_seen) = last_seen else {
        return (1, false);
    };
    let gap = (now.date_naive() - last_seen.date_naive()).num_days();
    match gap {
        0 => (count.max(1), false),
        1 => (count + 1, true),
        _ => (1, false),
    }
}

pub async fn record_user_visit(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let (count, extended) =
        next_visit_count(user.last_seen, now, user.consecutive_days_visit_count);
    sqlx::query("UPDATE users SET last_seen = ?, consecutive_days_visit_count = ? WHERE id = ?")
        .bind(now)
        .bind(count)
        .bind(user.id)
        .execute(&mut *conn)
        .await?;
    if extended {
        badges::handle_event(conn, settings, BadgeEvent::SiteVisit, user.id, None).await?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<UserCard>,
    pub paginator: Paginator,
    pub sort: String,
    pub query: Option<String>,
}

/// Effective directory sort; reputation order is not offered when karma is private.
pub fn effective_user_sort(requested: Option<&str>, karma_mode: KarmaMode) -> &'static str {
    match requested {
        Some("newest") => "newest",
        Some("last") => "last",
        Some("user") => "user",
        _ if karma_mode == KarmaMode::Private => "newest",
        _ => "reputation",
    }
}

fn user_order(sort: &str) -> &'static str {
    match sort {
        "newest" => "u.date_joined DESC, u.id DESC",
        "last" => "u.date_joined ASC, u.id ASC",
        "user" => "u.username ASC",
        _ => "u.reputation DESC, u.id ASC",
    }
}

fn push_user_filter(qb: &mut QueryBuilder<'_, Sqlite>, query: Option<&str>) {
    if let Some(q) = query {
        let pattern = format!("%{}%", q.to_lowercase());
        qb.push(" WHERE LOWER(u.username) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(u.about) LIKE ")
            .push_bind(pattern);
    }
}

/// Drops reputation from cards whose owner's karma the viewer may not see.
pub fn redact_karma(cards: &mut [UserCard], viewer: Option<&User>, mode: KarmaMode) {
    for card in cards.iter_mut() {
        if !permissions::can_show_karma_of(viewer, card.id, mode) {
            card.reputation = None;
        }
    }
}

pub async fn show_users(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    viewer: Option<&User>,
    params: &UserListParams,
) -> Result<UserPage, sqlx::Error> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);
    let sort = match &query {
        Some(_) => "reputation",
        None => effective_user_sort(params.sort.as_deref(), settings.karma_mode),
    };

    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM users u");
    push_user_filter(&mut count_qb, query.as_deref());
    let (total,): (i64,) = count_qb.build_query_as().fetch_one(&mut *conn).await?;

    let paginator = Paginator::new(
        total,
        settings.users_page_size,
        parse_page(params.page.as_deref()),
    );

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM users u", USER_CARD_COLUMNS));
    push_user_filter(&mut qb, query.as_deref());
    qb.push(" ORDER BY ")
        .push(user_order(sort))
        .push(" LIMIT ")
        .push_bind(paginator.per_page)
        .push(" OFFSET ")
        .push_bind(paginator.offset());
    let mut users = qb.build_query_as::<UserCard>().fetch_all(&mut *conn).await?;
    redact_karma(&mut users, viewer, settings.karma_mode);

    Ok(UserPage {
        users,
        paginator,
        sort: sort.to_string(),
        query,
    })
}

/// Case-insensitive match on username and about text, by reputation.
pub async fn get_users_by_text_query(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    viewer: Option<&User>,
    query: &str,
) -> Result<Vec<UserCard>, sqlx::Error> {
    let pattern = format!("%{}%", query.trim().to_lowercase());
    let mut found = sqlx::query_as::<_, UserCard>(&format!(
        r#"
        SELECT {} FROM users u
        WHERE LOWER(u.username) LIKE ? OR LOWER(u.about) LIKE ?
        ORDER BY u.reputation DESC, u.id ASC
        "#,
        USER_CARD_COLUMNS
    ))
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(&mut *conn)
    .await?;
    redact_karma(&mut found, viewer, settings.karma_mode);
    Ok(found)
}

pub async fn edit_user(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    editor: &User,
    user_id: i64,
    req: &EditUserRequest,
) -> Result<User, AppError> {
    if editor.id != user_id && !editor.is_administrator() {
        return Err(AppError::Forbidden(
            "Sorry, you can only edit your own profile".to_string(),
        ));
    }
    let user = load_user(conn, user_id).await?;

    let email = req.email.trim().to_string();
    let email_isvalid = user.email_isvalid && email == user.email;
    let username = match &req.username {
        Some(name) if settings.editable_screen_name && name.trim() != user.username => {
            name.trim().to_string()
        }
        _ => user.username.clone(),
    };

    let updated = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET username = ?, email = ?, email_isvalid = ?, real_name = ?, website = ?,
            location = ?, date_of_birth = ?, about = ?, country = ?, show_country = ?,
            show_marked_tags = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&username)
    .bind(&email)
    .bind(email_isvalid)
    .bind(strip_tags(req.realname.trim()))
    .bind(strip_tags(req.website.trim()))
    .bind(strip_tags(req.city.trim()))
    .bind(req.birthday)
    .bind(clean_html(req.about.trim()))
    .bind(req.country.trim().to_uppercase())
    .bind(req.show_country)
    .bind(req.show_marked_tags)
    .bind(user.id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("This screen name is taken".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    activity::record(
        conn,
        &NewActivity::new(
            updated.id,
            ActivityType::UserFullUpdated,
            ContentType::User,
            updated.id,
        ),
    )
    .await?;
    badges::handle_event(conn, settings, BadgeEvent::UpdateUserProfile, updated.id, None).await?;
    tracing::info!(user_id = updated.id, editor_id = editor.id, "Profile updated");
    Ok(updated)
}

/// Whether the owner's interesting/ignored tags appear on their profile.
pub fn marked_tags_visible(
    mode: MarkedTagsVisibility,
    owner_wants: bool,
    viewer_is_owner: bool,
) -> bool {
    if viewer_is_owner {
        return true;
    }
    match mode {
        MarkedTagsVisibility::Always => true,
        MarkedTagsVisibility::WhenUserWants => owner_wants,
        MarkedTagsVisibility::Never => false,
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TopAnswer {
    pub id: i64,
    pub question_id: i64,
    pub title: String,
    pub score: i64,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub questions: Vec<QuestionSummary>,
    pub question_count: i64,
    pub top_answers: Vec<TopAnswer>,
    pub answer_count: i64,
    pub up_votes: i64,
    pub down_votes: i64,
    /// Owner only.
    pub votes_left_today: Option<i64>,
    pub user_tags: Vec<UserTagUsage>,
    pub marked_tags: Option<MarkedTagNames>,
    pub badges: Vec<BadgeCount>,
    /// Owner only, and only when groups are enabled.
    pub groups: Option<Vec<GroupEntry>>,
}

const USER_QUESTIONS_LIMIT: i64 = 100;
const USER_TAGS_LIMIT: i64 = 50;

pub async fn user_stats(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    viewer: Option<&User>,
    owner: &User,
) -> Result<UserStats, sqlx::Error> {
    let is_owner = viewer.is_some_and(|v| v.id == owner.id);
    let show_anonymous = is_owner;
    let approved_only = settings.enable_content_moderation;

    let questions = sqlx::query_as::<_, QuestionSummary>(
        r#"
        SELECT t.id AS thread_id, p.id AS question_id, t.title, t.tagnames, p.score,
               t.answer_count, t.view_count, t.favourite_count, t.closed,
               (t.accepted_answer_id IS NOT NULL) AS has_accepted_answer, p.summary,
               p.author_id, u.username AS author_username, p.added_at, t.last_activity_at
        FROM posts p
        JOIN threads t ON t.id = p.thread_id
        JOIN users u ON u.id = p.author_id
        WHERE p.author_id = ? AND p.post_type = 'question' AND p.deleted = FALSE
          AND (? OR p.is_anonymous = FALSE)
          AND (? = FALSE OR p.approved = TRUE)
        ORDER BY p.score DESC, p.added_at DESC, p.id DESC
        LIMIT ?
        "#,
    )
    .bind(owner.id)
    .bind(show_anonymous)
    .bind(approved_only)
    .bind(USER_QUESTIONS_LIMIT)
    .fetch_all(&mut *conn)
    .await?;

    let (question_count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM posts
        WHERE author_id = ? AND post_type = 'question' AND deleted = FALSE
          AND (? OR is_anonymous = FALSE)
          AND (? = FALSE OR approved = TRUE)
        "#,
    )
    .bind(owner.id)
    .bind(show_anonymous)
    .bind(approved_only)
    .fetch_one(&mut *conn)
    .await?;

    let top_answers = sqlx::query_as::<_, TopAnswer>(
        r#"
        SELECT a.id, q.id AS question_id, t.title, a.score, a.added_at
        FROM posts a
        JOIN threads t ON t.id = a.thread_id
        JOIN posts q ON q.thread_id = a.thread_id AND q.post_type = 'question'
        WHERE a.author_id = ? AND a.post_type = 'answer' AND a.deleted = FALSE AND q.deleted = FALSE
        ORDER BY a.score DESC, a.added_at DESC, a.id DESC
        LIMIT 100
        "#,
    )
    .bind(owner.id)
    .fetch_all(&mut *conn)
    .await?;

    let (answer_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM posts WHERE author_id = ? AND post_type = 'answer' AND deleted = FALSE",
    )
    .bind(owner.id)
    .fetch_one(&mut *conn)
    .await?;

    let (up_votes, down_votes): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(CASE WHEN vote > 0 THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN vote < 0 THEN 1 ELSE 0 END), 0)
        FROM votes WHERE user_id = ?
        "#,
    )
    .bind(owner.id)
    .fetch_one(&mut *conn)
    .await?;

    let votes_left_today = if is_owner {
        let today = voting::votes_cast_today(conn, owner.id).await?;
        Some((settings.max_votes_per_user_per_day - today).max(0))
    } else {
        None
    };

    let user_tags = tags::user_tag_usage(conn, owner.id, USER_TAGS_LIMIT).await?;
    let marked_tags = if marked_tags_visible(
        settings.marked_tags_are_public_when,
        owner.show_marked_tags,
        is_owner,
    ) {
        Some(tags::marked_tag_names(conn, owner.id).await?)
    } else {
        None
    };
    let badges = badges::user_badges(conn, owner.id).await?;
    let groups = if is_owner && settings.groups_enabled {
        Some(groups::user_groups(conn, owner).await?)
    } else {
        None
    };

    Ok(UserStats {
        questions,
        question_count,
        top_answers,
        answer_count,
        up_votes,
        down_votes,
        votes_left_today,
        user_tags,
        marked_tags,
        badges,
        groups,
    })
}

#[derive(Debug, Serialize)]
pub struct Network {
    pub followers: Vec<UserCard>,
    pub followed: Vec<UserCard>,
}

pub async fn user_network(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    viewer: Option<&User>,
    user_id: i64,
) -> Result<Network, sqlx::Error> {
    let mut followers = sqlx::query_as::<_, UserCard>(&format!(
        "SELECT {} FROM users u JOIN follows f ON f.follower_id = u.id WHERE f.followed_id = ? ORDER BY u.username",
        USER_CARD_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    let mut followed = sqlx::query_as::<_, UserCard>(&format!(
        "SELECT {} FROM users u JOIN follows f ON f.followed_id = u.id WHERE f.follower_id = ? ORDER BY u.username",
        USER_CARD_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    redact_karma(&mut followers, viewer, settings.karma_mode);
    redact_karma(&mut followed, viewer, settings.karma_mode);
    Ok(Network {
        followers,
        followed,
    })
}

pub async fn follow(
    conn: &mut SqliteConnection,
    follower: &User,
    followed_id: i64,
) -> Result<(), AppError> {
    if follower.id == followed_id {
        return Err(AppError::BadRequest("You cannot follow yourself".to_string()));
    }
    load_user(conn, followed_id).await?;
    sqlx::query("INSERT OR IGNORE INTO follows (follower_id, followed_id) VALUES (?, ?)")
        .bind(follower.id)
        .bind(followed_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn unfollow(
    conn: &mut SqliteConnection,
    follower: &User,
    followed_id: i64,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
        .bind(follower.id)
        .bind(followed_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn user_favorites(
    conn: &mut SqliteConnection,
    user_id: i64,
    limit: usize,
) -> Result<Vec<QuestionSummary>, sqlx::Error> {
    sqlx::query_as::<_, QuestionSummary>(
        r#"
        SELECT t.id AS thread_id, p.id AS question_id, t.title, t.tagnames, p.score,
               t.answer_count, t.view_count, t.favourite_count, t.closed,
               (t.accepted_answer_id IS NOT NULL) AS has_accepted_answer, p.summary,
               p.author_id,
               CASE WHEN p.is_anonymous THEN NULL ELSE u.username END AS author_username,
               p.added_at, t.last_activity_at
        FROM favorite_questions f
        JOIN threads t ON t.id = f.thread_id
        JOIN posts p ON p.thread_id = t.id AND p.post_type = 'question'
        JOIN users u ON u.id = p.author_id
        WHERE f.user_id = ? AND p.deleted = FALSE
        ORDER BY f.added_at DESC, f.id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(&mut *conn)
    .await
}

/// A vote as listed on the votes tab.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VoteRecord {
    pub post_id: i64,
    pub post_type: String,
    pub question_id: i64,
    pub title: String,
    pub vote: i64,
    pub voted_at: DateTime<Utc>,
}

pub async fn user_votes(
    conn: &mut SqliteConnection,
    user_id: i64,
    limit: usize,
) -> Result<Vec<VoteRecord>, sqlx::Error> {
    sqlx::query_as::<_, VoteRecord>(
        r#"
        SELECT p.id AS post_id, p.post_type, q.id AS question_id, t.title, v.vote, v.voted_at
        FROM votes v
        JOIN posts p ON p.id = v.post_id
        JOIN threads t ON t.id = p.thread_id
        JOIN posts q ON q.thread_id = p.thread_id AND q.post_type = 'question'
        WHERE v.user_id = ? AND p.deleted = FALSE
        ORDER BY v.voted_at DESC, v.id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(&mut *conn)
    .await
}

#[derive(Debug, Serialize)]
pub struct EmailSubscriptions {
    pub feeds: Vec<EmailFeedSetting>,
    pub email_tag_filter_strategy: i64,
}

pub async fn email_subscriptions(
    conn: &mut SqliteConnection,
    user: &User,
) -> Result<EmailSubscriptions, sqlx::Error> {
    add_missing_subscriptions(conn, user.id).await?;
    let feeds = sqlx::query_as::<_, EmailFeedSetting>(
        "SELECT * FROM email_feed_settings WHERE subscriber_id = ? ORDER BY feed_type",
    )
    .bind(user.id)
    .fetch_all(&mut *conn)
    .await?;
    let (strategy,): (i64,) =
        sqlx::query_as("SELECT email_tag_filter_strategy FROM users WHERE id = ?")
            .bind(user.id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(EmailSubscriptions {
        feeds,
        email_tag_filter_strategy: strategy,
    })
}

pub async fn save_email_subscriptions(
    conn: &mut SqliteConnection,
    user: &User,
    req: &EmailSubscriptionsRequest,
) -> Result<EmailSubscriptions, AppError> {
    if let Some(strategy) = req.email_tag_filter_strategy {
        if ![INCLUDE_ALL, EXCLUDE_IGNORED, INCLUDE_INTERESTING].contains(&strategy) {
            return Err(AppError::BadRequest(
                "Unknown email tag filter strategy".to_string(),
            ));
        }
        sqlx::query("UPDATE users SET email_tag_filter_strategy = ? WHERE id = ?")
            .bind(strategy)
            .bind(user.id)
            .execute(&mut *conn)
            .await?;
    }

    let changes: Vec<(FeedType, Frequency)> = if req.stop_email {
        FeedType::ALL.iter().map(|f| (*f, Frequency::Never)).collect()
    } else {
        req.feeds.iter().map(|(f, q)| (*f, *q)).collect()
    };
    for (feed, frequency) in changes {
        sqlx::query(
            r#"
            INSERT INTO email_feed_settings (subscriber_id, feed_type, frequency, added_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (subscriber_id, feed_type) DO UPDATE SET frequency = excluded.frequency
            "#,
        )
        .bind(user.id)
        .bind(feed.as_str())
        .bind(frequency.as_str())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    }
    tracing::info!(user_id = user.id, stop_email = req.stop_email, "Email subscriptions saved");
    Ok(email_subscriptions(conn, user).await?)
}

pub async fn change_status(
    conn: &mut SqliteConnection,
    moderator: &User,
    subject_id: i64,
    status: UserStatus,
) -> Result<User, AppError> {
    let subject = load_user(conn, subject_id).await?;
    permissions::assert_can_change_status(moderator, &subject, status)?;
    let updated = sqlx::query_as::<_, User>("UPDATE users SET status = ? WHERE id = ? RETURNING *")
        .bind(status.code())
        .bind(subject.id)
        .fetch_one(&mut *conn)
        .await?;
    tracing::info!(
        moderator_id = moderator.id,
        user_id = subject.id,
        status = status.code(),
        "User status changed"
    );
    Ok(updated)
}

pub async fn adjust_reputation(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    moderator: &User,
    subject_id: i64,
    delta: i64,
    comment: &str,
) -> Result<i64, AppError> {
    let subject = load_user(conn, subject_id).await?;
    if !permissions::can_moderate_user(moderator, &subject) || moderator.id == subject.id {
        return Err(AppError::Forbidden(
            "Sorry, you cannot moderate this user".to_string(),
        ));
    }
    if delta == 0 {
        return Err(AppError::BadRequest("Enter a non-zero amount".to_string()));
    }
    Ok(reputation::moderate_user_reputation(conn, settings, subject.id, delta, comment).await?)
}
