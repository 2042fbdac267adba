//! Reputation bookkeeping.
//!
//! Every change goes through [`change_reputation`], which enforces the floor and the daily
//! gain cap and writes the matching `reputes` row.

use chrono::{DateTime, NaiveTime, Utc};
use sqlx::SqliteConnection;

use crate::config::ForumSettings;
use crate::models::repute::{Repute, ReputeType};

/// Portion of `delta` that fits under the daily cap. Losses are never capped.
pub fn capped_gain(delta: i64, gained_today: i64, cap: i64) -> i64 {
    if delta <= 0 {
        delta
    } else {
        delta.min((cap - gained_today).max(0))
    }
}

/// Resulting total, never below `floor`.
pub fn apply_floor(current: i64, delta: i64, floor: i64) -> i64 {
    (current + delta).max(floor)
}

pub(crate) fn start_of_today() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}

async fn gained_today(conn: &mut SqliteConnection, user_id: i64) -> Result<i64, sqlx::Error> {
    let (sum,): (Option<i64>,) = sqlx::query_as(
        "SELECT SUM(positive) FROM reputes WHERE user_id = ? AND reputed_at >= ? AND reputation_type != ?",
    )
    .bind(user_id)
    .bind(start_of_today())
    .bind(ReputeType::AssignedByModerator.code())
    .fetch_one(&mut *conn)
    .await?;
    Ok(sum.unwrap_or(0))
}

async fn write_change(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user_id: i64,
    delta: i64,
    kind: ReputeType,
    question_id: Option<i64>,
    comment: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let (current,): (i64,) = sqlx::query_as("SELECT reputation FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    let total = apply_floor(current, delta, settings.min_reputation);

    sqlx::query("UPDATE users SET reputation = ? WHERE id = ?")
        .bind(total)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO reputes (user_id, positive, negative, question_id, reputed_at, reputation_type, reputation, comment)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(delta.max(0))
    .bind(delta.min(0))
    .bind(question_id)
    .bind(Utc::now())
    .bind(kind.code())
    .bind(total)
    .bind(comment)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(user_id, delta, total, kind = ?kind, "Reputation changed");
    Ok(total)
}

/// Applies a rule-driven reputation change and returns the new total.
pub async fn change_reputation(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user_id: i64,
    delta: i64,
    kind: ReputeType,
    question_id: Option<i64>,
) -> Result<i64, sqlx::Error> {
    let delta = if delta > 0 {
        let gained = gained_today(conn, user_id).await?;
        capped_gain(delta, gained, settings.max_rep_gain_per_user_per_day)
    } else {
        delta
    };

    if delta == 0 {
        let (current,): (i64,) = sqlx::query_as("SELECT reputation FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
        return Ok(current);
    }

    write_change(conn, settings, user_id, delta, kind, question_id, None).await
}

/// Manual adjustment from the moderation tab; not subject to the daily cap.
pub async fn moderate_user_reputation(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user_id: i64,
    delta: i64,
    comment: &str,
) -> Result<i64, sqlx::Error> {
    write_change(
        conn,
        settings,
        user_id,
        delta,
        ReputeType::AssignedByModerator,
        None,
        Some(comment),
    )
    .await
}

pub async fn list_reputes(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<Repute>, sqlx::Error> {
    sqlx::query_as::<_, Repute>(
        "SELECT * FROM reputes WHERE user_id = ? ORDER BY reputed_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
}

/// Reputation graph points `[unix_ms, total]`, newest first, starting with now and
/// the current total.
pub fn reputation_graph(current: i64, reputes: &[Repute]) -> Vec<[i64; 2]> {
    let mut points = vec![[Utc::now().timestamp_millis(), current]];
    points.extend(
        reputes
            .iter()
            .map(|r| [r.reputed_at.timestamp_millis(), r.reputation]),
    );
    points
}
