// src/models/badge.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeLevel {
    Gold = 1,
    Silver = 2,
    Bronze = 3,
}

/// Represents the 'awards' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Award {
    pub id: i64,
    pub user_id: i64,
    pub badge_id: i64,
    pub content_type: String,
    pub object_id: i64,
    pub awarded_at: DateTime<Utc>,
}

