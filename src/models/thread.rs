// src/models/thread.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::utils::slug::slugify;

/// Represents the 'threads' table: a question together with its answers and comments.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Thread {
    pub id: i64,
    pub title: String,
    /// Space separated tag names, in the order given by the asker.
    pub tagnames: String,
    pub view_count: i64,
    pub favourite_count: i64,
    pub answer_count: i64,
    pub last_activity_at: DateTime<Utc>,
    pub last_activity_by: i64,
    pub language_code: String,
    pub closed: bool,
    pub closed_by: Option<i64>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<String>,
    pub accepted_answer_id: Option<i64>,
    pub approved: bool,
    pub added_at: DateTime<Utc>,
}

impl Thread {
    pub fn tag_names(&self) -> Vec<String> {
        self.tagnames.split_whitespace().map(str::to_string).collect()
    }

    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

/// Question list row: thread joined with its question post.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct QuestionSummary {
    pub thread_id: i64,
    pub question_id: i64,
    pub title: String,
    pub tagnames: String,
    pub score: i64,
    pub answer_count: i64,
    pub view_count: i64,
    pub favourite_count: i64,
    pub closed: bool,
    pub has_accepted_answer: bool,
    pub summary: String,
    pub author_id: i64,
    pub author_username: Option<String>,
    pub added_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Query parameters for listing questions.
#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    /// 'activity' (default), 'age', 'answers' or 'votes'.
    pub sort: Option<String>,
    /// 'all' (default) or 'unanswered'.
    pub scope: Option<String>,
    /// Comma separated tag names; a thread must carry all of them.
    pub tags: Option<String>,
    /// Case-insensitive match on title and question text.
    pub query: Option<String>,
    pub page: Option<String>,
}

/// DTO for closing a question.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CloseRequest {
    #[validate(length(min = 1, max = 200, message = "Give a reason for closing"))]
    pub reason: String,
}
