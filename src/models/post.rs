// src/models/post.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Discriminator of the polymorphic 'posts' table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Question,
    Answer,
    Comment,
    TagWiki,
}

impl PostType {
    pub fn as_str(self) -> &'static str {
        match self {
            PostType::Question => "question",
            PostType::Answer => "answer",
            PostType::Comment => "comment",
            PostType::TagWiki => "tag_wiki",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "question" => Some(PostType::Question),
            "answer" => Some(PostType::Answer),
            "comment" => Some(PostType::Comment),
            "tag_wiki" => Some(PostType::TagWiki),
            _ => None,
        }
    }
}

/// Represents the 'posts' table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Post {
    pub id: i64,
    pub post_type: String,
    pub thread_id: i64,
    pub parent_id: Option<i64>,
    pub author_id: i64,

    /// Markdown source.
    pub text: String,
    /// Rendered and sanitized.
    pub html: String,
    pub summary: String,

    pub score: i64,
    pub vote_up_count: i64,
    pub vote_down_count: i64,
    pub comment_count: i64,
    pub offensive_flag_count: i64,

    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<i64>,
    pub locked: bool,
    pub wiki: bool,
    pub is_anonymous: bool,
    pub approved: bool,
    /// Set on the accepted answer.
    pub endorsed: bool,

    pub added_at: DateTime<Utc>,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub last_edited_by: Option<i64>,
}

impl Post {
    pub fn kind(&self) -> PostType {
        PostType::parse(&self.post_type).unwrap_or(PostType::Comment)
    }

    pub fn is_question(&self) -> bool {
        self.kind() == PostType::Question
    }

    pub fn is_answer(&self) -> bool {
        self.kind() == PostType::Answer
    }

    pub fn is_comment(&self) -> bool {
        self.kind() == PostType::Comment
    }

    /// Site-relative url; answers and comments point into their thread.
    pub fn url(&self, question_id: i64, thread_slug: &str) -> String {
        match self.kind() {
            PostType::Question | PostType::TagWiki => {
                format!("/question/{}/{}", question_id, thread_slug)
            }
            PostType::Answer => format!("/question/{}/{}#post-id-{}", question_id, thread_slug, self.id),
            PostType::Comment => {
                format!("/question/{}/{}#comment-{}", question_id, thread_slug, self.id)
            }
        }
    }
}

/// Post joined with the author's screen name (hidden for anonymous questions).
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct PostWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub post: Post,
    pub author_username: Option<String>,
    pub author_reputation: i64,
}

/// Represents the 'post_revisions' table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct PostRevision {
    pub id: i64,
    pub post_id: i64,
    pub revision: i64,
    pub author_id: i64,
    pub text: String,
    pub html: String,
    pub title: Option<String>,
    pub tagnames: Option<String>,
    /// Edit note.
    pub summary: String,
    pub revised_at: DateTime<Utc>,
}

/// DTO for asking a question.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AskRequest {
    #[validate(length(
        min = 10,
        max = 255,
        message = "Title length must be between 10 and 255 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 10,
        max = 30000,
        message = "Question text must be between 10 and 30000 chars"
    ))]
    pub text: String,

    #[validate(length(min = 1, message = "At least one tag is required"))]
    pub tags: Vec<String>,

    #[serde(default)]
    pub is_anonymous: bool,

    #[serde(default)]
    pub wiki: bool,
}

/// DTO for answering.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AnswerRequest {
    #[validate(length(
        min = 10,
        max = 30000,
        message = "Answer text must be between 10 and 30000 chars"
    ))]
    pub text: String,

    #[serde(default)]
    pub wiki: bool,
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommentRequest {
    #[validate(length(
        min = 1,
        max = 600,
        message = "Comment must be between 1 and 600 characters"
    ))]
    pub text: String,
}

/// DTO for editing a post. Title and tags only apply to questions.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EditPostRequest {
    #[validate(length(min = 1, max = 30000))]
    pub text: String,

    #[validate(length(min = 10, max = 255))]
    pub title: Option<String>,

    pub tags: Option<Vec<String>>,

    #[validate(length(max = 300))]
    #[serde(default)]
    pub summary: String,
}

/// DTO for retagging a question.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RetagRequest {
    #[validate(length(min = 1, message = "At least one tag is required"))]
    pub tags: Vec<String>,
}

/// Represents the 'post_flag_reasons' table: canned reasons shown to moderators.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct RejectReason {
    pub id: i64,
    pub title: String,
    pub details: String,
    pub author_id: i64,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRejectReasonRequest {
    #[validate(length(min = 1, max = 128))]
    pub title: String,
    #[validate(length(min = 1, max = 1000))]
    pub details: String,
}
