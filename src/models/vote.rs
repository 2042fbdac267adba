// src/models/vote.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn value(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    pub fn from_value(value: i64) -> Self {
        if value > 0 {
            VoteDirection::Up
        } else {
            VoteDirection::Down
        }
    }
}

/// Represents the 'votes' table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Vote {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    /// +1 or -1.
    pub vote: i64,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

/// Outcome of a vote request.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    pub score: i64,
    /// Current vote of the requesting user after the action, if any.
    pub vote: Option<VoteDirection>,
    pub votes_left_today: i64,
}
