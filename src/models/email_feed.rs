// src/models/email_feed.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum FeedType {
    /// Entire forum (filtered by the user's tag strategy).
    #[serde(rename = "q_all")]
    QAll,
    /// Questions the user asked.
    #[serde(rename = "q_ask")]
    QAsk,
    /// Questions the user answered.
    #[serde(rename = "q_ans")]
    QAns,
    /// Questions the user favourited.
    #[serde(rename = "q_sel")]
    QSel,
    /// Mentions and comments.
    #[serde(rename = "m_and_c")]
    MAndC,
}

impl FeedType {
    pub const ALL: [FeedType; 5] = [
        FeedType::QAll,
        FeedType::QAsk,
        FeedType::QAns,
        FeedType::QSel,
        FeedType::MAndC,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeedType::QAll => "q_all",
            FeedType::QAsk => "q_ask",
            FeedType::QAns => "q_ans",
            FeedType::QSel => "q_sel",
            FeedType::MAndC => "m_and_c",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == raw)
    }

    pub fn default_frequency(self) -> Frequency {
        match self {
            FeedType::QAll => Frequency::Weekly,
            _ => Frequency::Instant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Frequency {
    #[serde(rename = "i")]
    Instant,
    #[serde(rename = "d")]
    Daily,
    #[serde(rename = "w")]
    Weekly,
    #[serde(rename = "n")]
    Never,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Instant => "i",
            Frequency::Daily => "d",
            Frequency::Weekly => "w",
            Frequency::Never => "n",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "i" => Some(Frequency::Instant),
            "d" => Some(Frequency::Daily),
            "w" => Some(Frequency::Weekly),
            "n" => Some(Frequency::Never),
            _ => None,
        }
    }
}

/// Represents the 'email_feed_settings' table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct EmailFeedSetting {
    pub id: i64,
    pub subscriber_id: i64,
    pub feed_type: String,
    pub frequency: String,
    pub added_at: DateTime<Utc>,
    pub reported_at: Option<DateTime<Utc>>,
}

/// Email subscription tab payload.
#[derive(Debug, Deserialize)]
pub struct EmailSubscriptionsRequest {
    /// Feed type to frequency; feeds left out keep their value.
    #[serde(default)]
    pub feeds: std::collections::HashMap<FeedType, Frequency>,
    pub email_tag_filter_strategy: Option<i64>,
    /// Sets every feed to "never".
    #[serde(default)]
    pub stop_email: bool,
}
