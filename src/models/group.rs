// src/models/group.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

pub const MEMBERSHIP_PENDING: i64 = 0;
pub const MEMBERSHIP_FULL: i64 = 1;

/// Represents the 'groups' table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Anyone may join without approval.
    pub is_open: bool,
    pub moderate_email: bool,
    /// Whitespace separated addresses that join without approval.
    pub preapproved_emails: String,
    /// Whitespace separated domains that join without approval.
    pub preapproved_email_domains: String,
}

/// Represents the 'group_memberships' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GroupMembership {
    pub id: i64,
    pub user_id: i64,
    pub group_id: i64,
    pub level: i64,
}

/// Per-group view of the requesting user's membership.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct MembershipInfo {
    pub is_member: bool,
    pub is_pending: bool,
    pub can_join: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub preapproved_emails: String,
    #[serde(default)]
    pub preapproved_email_domains: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupListParams {
    /// 'all-groups' (default) or 'my-groups'.
    pub sort: Option<String>,
}
