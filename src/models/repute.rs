// src/models/repute.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Reason codes stored in `reputes.reputation_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputeType {
    GainByUpvoted = 1,
    GainByAnswerAccepted = 2,
    GainByAcceptingAnswer = 3,
    GainByDownvoteCanceled = 4,
    GainByCancelingDownvote = 5,
    LoseByCancelingAcceptedAnswer = -1,
    LoseByAcceptedAnswerCanceled = -2,
    LoseByDownvoted = -3,
    LoseByFlagged = -4,
    LoseByDownvoting = -5,
    LoseByFlaggedLastRevision3Times = -6,
    LoseByFlaggedLastRevision5Times = -7,
    LoseByUpvoteCanceled = -8,
    AssignedByModerator = 10,
}

impl ReputeType {
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Represents the 'reputes' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Repute {
    pub id: i64,
    pub user_id: i64,
    pub positive: i64,
    pub negative: i64,
    pub question_id: Option<i64>,
    pub reputed_at: DateTime<Utc>,
    pub reputation_type: i64,
    /// Reputation total right after this change.
    pub reputation: i64,
    pub comment: Option<String>,
}
