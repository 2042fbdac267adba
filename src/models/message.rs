// src/models/message.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'user_messages' table: one-shot notices popped on read.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserMessage {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
