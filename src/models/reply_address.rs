// src/models/reply_address.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyAction {
    PostAnswer,
    PostComment,
    ValidateEmail,
}

impl ReplyAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplyAction::PostAnswer => "post_answer",
            ReplyAction::PostComment => "post_comment",
            ReplyAction::ValidateEmail => "validate_email",
        }
    }
}

/// Represents the 'reply_addresses' table: one-off codes that let a user answer by email.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReplyAddress {
    pub id: i64,
    pub address: String,
    pub post_id: Option<i64>,
    pub user_id: i64,
    pub reply_action: String,
    pub allowed_from_email: String,
    pub used_at: Option<DateTime<Utc>>,
}

impl ReplyAddress {
    pub fn as_email_address(&self, hostname: &str) -> String {
        format!("reply-{}@{}", self.address, hostname)
    }
}
