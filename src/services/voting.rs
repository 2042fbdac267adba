//! Up and down votes on posts.

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::config::ForumSettings;
use crate::error::AppError;
use crate::models::{
    activity::{ActivityType, ContentType},
    post::Post,
    repute::ReputeType,
    user::User,
    vote::{Vote, VoteDirection, VoteResponse},
};
use crate::services::{
    activity::{self, NewActivity},
    badges::{self, BadgeEvent},
    permissions,
    reputation::{self, start_of_today},
};

/// Who a reputation change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Voter,
    Author,
}

/// Reputation changes caused by casting (or cancelling) a vote.
pub fn reputation_effects(
    direction: VoteDirection,
    cancel: bool,
    s: &ForumSettings,
) -> Vec<(Party, i64, ReputeType)> {
    match (direction, cancel) {
        (VoteDirection::Up, false) => vec![(
            Party::Author,
            s.rep_gain_for_receiving_upvote,
            ReputeType::GainByUpvoted,
        )],
        (VoteDirection::Up, true) => vec![(
            Party::Author,
            s.rep_loss_for_receiving_upvote_cancelation,
            ReputeType::LoseByUpvoteCanceled,
        )],
        (VoteDirection::Down, false) => vec![
            (
                Party::Author,
                s.rep_loss_for_receiving_downvote,
                ReputeType::LoseByDownvoted,
            ),
            (
                Party::Voter,
                s.rep_loss_for_downvoting,
                ReputeType::LoseByDownvoting,
            ),
        ],
        (VoteDirection::Down, true) => vec![
            (
                Party::Author,
                s.rep_gain_for_receiving_downvote_cancelation,
                ReputeType::GainByDownvoteCanceled,
            ),
            (
                Party::Voter,
                s.rep_gain_for_canceling_downvote,
                ReputeType::GainByCancelingDownvote,
            ),
        ],
    }
}

pub async fn votes_cast_today(conn: &mut SqliteConnection, user_id: i64) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM votes WHERE user_id = ? AND voted_at >= ?")
            .bind(user_id)
            .bind(start_of_today())
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}

async fn question_id_of(conn: &mut SqliteConnection, thread_id: i64) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) =
        sqlx::query_as("SELECT id FROM posts WHERE thread_id = ? AND post_type = 'question'")
            .bind(thread_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(id)
}

async fn apply_reputation(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    voter_id: i64,
    post: &Post,
    question_id: i64,
    direction: VoteDirection,
    cancel: bool,
) -> Result<(), sqlx::Error> {
    // Community wiki posts and comments earn nobody reputation.
    if post.wiki || post.is_comment() {
        return Ok(());
    }
    for (party, delta, kind) in reputation_effects(direction, cancel, settings) {
        let user_id = match party {
            Party::Voter => voter_id,
            Party::Author => post.author_id,
        };
        reputation::change_reputation(conn, settings, user_id, delta, kind, Some(question_id))
            .await?;
    }
    Ok(())
}

async fn adjust_counts(
    conn: &mut SqliteConnection,
    post_id: i64,
    direction: VoteDirection,
    sign: i64,
) -> Result<(), sqlx::Error> {
    let (up, down) = match direction {
        VoteDirection::Up => (sign, 0),
        VoteDirection::Down => (0, sign),
    };
    sqlx::query(
        r#"
        UPDATE posts
        SET score = score + ?, vote_up_count = vote_up_count + ?, vote_down_count = vote_down_count + ?
        WHERE id = ?
        "#,
    )
    .bind(direction.value() * sign)
    .bind(up)
    .bind(down)
    .bind(post_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn cancel_vote(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    post: &Post,
    question_id: i64,
    existing: &Vote,
) -> Result<(), sqlx::Error> {
    let direction = VoteDirection::from_value(existing.vote);
    sqlx::query("DELETE FROM votes WHERE id = ?")
        .bind(existing.id)
        .execute(&mut *conn)
        .await?;
    adjust_counts(conn, post.id, direction, -1).await?;
    apply_reputation(conn, settings, user.id, post, question_id, direction, true).await?;

    activity::delete_activities(
        conn,
        match direction {
            VoteDirection::Up => ActivityType::VoteUp,
            VoteDirection::Down => ActivityType::VoteDown,
        },
        ContentType::Vote,
        existing.id,
        None,
    )
    .await?;
    activity::record(
        conn,
        &NewActivity::new(user.id, ActivityType::CancelVote, ContentType::Vote, existing.id)
            .question(question_id),
    )
    .await?;
    Ok(())
}

/// Casts, cancels or switches the user's vote on a post.
///
/// Voting the same direction twice cancels the vote; the opposite direction replaces it.
pub async fn vote(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    user: &User,
    post_id: i64,
    direction: VoteDirection,
) -> Result<VoteResponse, AppError> {
    let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
    if post.is_comment() && direction == VoteDirection::Down {
        return Err(AppError::BadRequest(
            "Comments can only be voted up".to_string(),
        ));
    }
    let question_id = question_id_of(conn, post.thread_id).await?;

    let existing = sqlx::query_as::<_, Vote>("SELECT * FROM votes WHERE user_id = ? AND post_id = ?")
        .bind(user.id)
        .bind(post.id)
        .fetch_optional(&mut *conn)
        .await?;

    let current = match existing {
        Some(existing) if existing.vote == direction.value() => {
            permissions::assert_can_vote(user, &post, direction, 0, settings)?;
            cancel_vote(conn, settings, user, &post, question_id, &existing).await?;
            tracing::info!(user_id = user.id, post_id = post.id, "Vote cancelled");
            None
        }
        existing => {
            let votes_today = votes_cast_today(conn, user.id).await?;
            permissions::assert_can_vote(user, &post, direction, votes_today, settings)?;
            if let Some(old) = &existing {
                cancel_vote(conn, settings, user, &post, question_id, old).await?;
            }

            let (vote_id,): (i64,) = sqlx::query_as(
                "INSERT INTO votes (user_id, post_id, vote, voted_at) VALUES (?, ?, ?, ?) RETURNING id",
            )
            .bind(user.id)
            .bind(post.id)
            .bind(direction.value())
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await?;
            adjust_counts(conn, post.id, direction, 1).await?;
            apply_reputation(conn, settings, user.id, &post, question_id, direction, false).await?;

            let (activity_type, event) = match direction {
                VoteDirection::Up => (ActivityType::VoteUp, BadgeEvent::Upvote),
                VoteDirection::Down => (ActivityType::VoteDown, BadgeEvent::Downvote),
            };
            activity::record(
                conn,
                &NewActivity::new(user.id, activity_type, ContentType::Vote, vote_id)
                    .question(question_id),
            )
            .await?;
            badges::handle_event(conn, settings, event, user.id, Some(post.id)).await?;
            tracing::info!(user_id = user.id, post_id = post.id, ?direction, "Vote cast");
            Some(direction)
        }
    };

    let (score,): (i64,) = sqlx::query_as("SELECT score FROM posts WHERE id = ?")
        .bind(post.id)
        .fetch_one(&mut *conn)
        .await?;
    let votes_today = votes_cast_today(conn, user.id).await?;

    Ok(VoteResponse {
        score,
        vote: current,
        votes_left_today: (settings.max_votes_per_user_per_day - votes_today).max(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downvote_costs_both_sides() {
        let s = ForumSettings::default();
        let effects = reputation_effects(VoteDirection::Down, false, &s);
        assert_eq!(
            effects,
            vec![
                (Party::Author, -1, ReputeType::LoseByDownvoted),
                (Party::Voter, -2, ReputeType::LoseByDownvoting),
            ]
        );
    }

    #[test]
    fn cancelling_reverses_with_configured_amounts() {
        let s = ForumSettings::default();
        assert_eq!(
            reputation_effects(VoteDirection::Up, true, &s),
            vec![(Party::Author, -10, ReputeType::LoseByUpvoteCanceled)]
        );
        let down = reputation_effects(VoteDirection::Down, true, &s);
        assert_eq!(down[0], (Party::Author, 2, ReputeType::GainByDownvoteCanceled));
        assert_eq!(down[1], (Party::Voter, 1, ReputeType::GainByCancelingDownvote));
    }
}
