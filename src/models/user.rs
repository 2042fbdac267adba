// src/models/user.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Account status codes as stored in `users.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum UserStatus {
    #[serde(rename = "w")]
    Watched,
    #[serde(rename = "a")]
    Approved,
    #[serde(rename = "s")]
    Suspended,
    #[serde(rename = "b")]
    Blocked,
    #[serde(rename = "m")]
    Moderator,
    #[serde(rename = "d")]
    Administrator,
}

impl UserStatus {
    pub fn code(self) -> &'static str {
        match self {
            UserStatus::Watched => "w",
            UserStatus::Approved => "a",
            UserStatus::Suspended => "s",
            UserStatus::Blocked => "b",
            UserStatus::Moderator => "m",
            UserStatus::Administrator => "d",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "w" => Some(UserStatus::Watched),
            "a" => Some(UserStatus::Approved),
            "s" => Some(UserStatus::Suspended),
            "b" => Some(UserStatus::Blocked),
            "m" => Some(UserStatus::Moderator),
            "d" => Some(UserStatus::Administrator),
            _ => None,
        }
    }
}

/// Represents the 'users' table: account plus forum profile.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct User {
    pub id: i64,

    /// Unique screen name.
    pub username: String,

    /// Only shown to the owner via dedicated endpoints.
    #[serde(skip_serializing)]
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// One of the `UserStatus` codes.
    pub status: String,
    pub is_superuser: bool,

    /// Exposed only through karma-aware views.
    #[serde(skip_serializing)]
    pub reputation: i64,
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,

    pub real_name: String,
    pub website: String,
    pub location: String,
    pub about: String,
    pub country: String,
    pub show_country: bool,
    pub date_of_birth: Option<NaiveDate>,
    pub show_marked_tags: bool,

    #[serde(skip_serializing)]
    pub email_isvalid: bool,
    /// 0 = all questions, 1 = exclude ignored tags, 2 = only interesting tags.
    pub email_tag_filter_strategy: i64,

    pub last_seen: Option<DateTime<Utc>>,
    pub consecutive_days_visit_count: i64,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn status(&self) -> UserStatus {
        UserStatus::from_code(&self.status).unwrap_or(UserStatus::Approved)
    }

    pub fn is_administrator(&self) -> bool {
        self.is_superuser || self.status() == UserStatus::Administrator
    }

    pub fn is_moderator(&self) -> bool {
        self.status() == UserStatus::Moderator
    }

    pub fn is_administrator_or_moderator(&self) -> bool {
        self.is_administrator() || self.is_moderator()
    }

    pub fn is_blocked(&self) -> bool {
        self.status() == UserStatus::Blocked
    }

    pub fn is_suspended(&self) -> bool {
        self.status() == UserStatus::Suspended
    }

    pub fn is_watched(&self) -> bool {
        self.status() == UserStatus::Watched
    }

    /// Role claim carried in issued tokens.
    pub fn role(&self) -> &'static str {
        if self.is_administrator() {
            "admin"
        } else if self.is_moderator() {
            "moderator"
        } else {
            "user"
        }
    }

    pub fn full_name_or_username(&self) -> &str {
        if self.real_name.trim().is_empty() {
            &self.username
        } else {
            &self.real_name
        }
    }

    /// Every optional profile field is filled in.
    pub fn profile_is_complete(&self) -> bool {
        !self.real_name.trim().is_empty()
            && !self.website.trim().is_empty()
            && !self.location.trim().is_empty()
            && !self.about.trim().is_empty()
            && self.date_of_birth.is_some()
    }
}

/// Public card shown in user listings.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct UserCard {
    pub id: i64,
    pub username: String,
    pub status: String,
    /// `None` when karma is hidden from the viewer.
    pub reputation: Option<i64>,
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
    pub location: String,
    pub date_joined: DateTime<Utc>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 30,
        message = "Username length must be between 3 and 30 characters."
    ))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 30))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for editing a profile.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EditUserRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    /// Only honored when screen names are editable.
    #[validate(length(min = 3, max = 30))]
    pub username: Option<String>,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub realname: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub website: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub city: String,
    pub birthday: Option<NaiveDate>,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub about: String,
    #[validate(length(max = 2))]
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub show_country: bool,
    #[serde(default = "default_true")]
    pub show_marked_tags: bool,
}

fn default_true() -> bool {
    true
}

/// Query parameters of the user directory.
#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub sort: Option<String>,
    pub query: Option<String>,
    pub page: Option<String>,
}
