// src/models/tag.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Represents the 'tags' table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub created_by: i64,
    pub used_count: i64,
    pub deleted: bool,
}

/// Tag with how often one user used it.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct UserTagUsage {
    pub id: i64,
    pub name: String,
    pub user_tag_usage_count: i64,
}

/// Why a user marked a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagMarkReason {
    /// Interesting.
    Good,
    /// Ignored.
    Bad,
    Subscribed,
}

impl TagMarkReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TagMarkReason::Good => "good",
            TagMarkReason::Bad => "bad",
            TagMarkReason::Subscribed => "subscribed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MarkAction {
    Add,
    Remove,
}

/// DTO for marking tags; names ending in `*` are stored as wildcards.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MarkTagsRequest {
    #[validate(length(min = 1, max = 100))]
    pub tags: Vec<String>,
    pub reason: TagMarkReason,
    pub action: MarkAction,
}

/// A user's marked tags grouped by reason; wildcards are included as `prefix*`.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct MarkedTagNames {
    pub good: Vec<String>,
    pub bad: Vec<String>,
    pub subscribed: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TagListParams {
    /// 'name' or 'used' (default).
    pub sort: Option<String>,
    pub query: Option<String>,
}
