// src/models/activity.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Activity codes; the numbering is shared with stored rows and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    AskQuestion = 1,
    Answer = 2,
    CommentQuestion = 3,
    CommentAnswer = 4,
    UpdateQuestion = 5,
    UpdateAnswer = 6,
    Prize = 7,
    MarkAnswer = 8,
    VoteUp = 9,
    VoteDown = 10,
    CancelVote = 11,
    DeleteQuestion = 12,
    DeleteAnswer = 13,
    MarkOffensive = 14,
    UpdateTags = 15,
    Favorite = 16,
    UserFullUpdated = 17,
    EmailUpdateSent = 18,
    Mention = 19,
    UnansweredReminderSent = 20,
    AcceptAnswerReminderSent = 21,
    CreateTagWiki = 22,
    UpdateTagWiki = 23,
    ModeratedNewPost = 24,
    ModeratedPostEdit = 25,
    CreateRejectReason = 26,
    UpdateRejectReason = 27,
    ValidationEmailSent = 28,
    PostShared = 29,
    AskToJoinGroup = 30,
}

impl ActivityType {
    pub const ALL: [ActivityType; 30] = [
        ActivityType::AskQuestion,
        ActivityType::Answer,
        ActivityType::CommentQuestion,
        ActivityType::CommentAnswer,
        ActivityType::UpdateQuestion,
        ActivityType::UpdateAnswer,
        ActivityType::Prize,
        ActivityType::MarkAnswer,
        ActivityType::VoteUp,
        ActivityType::VoteDown,
        ActivityType::CancelVote,
        ActivityType::DeleteQuestion,
        ActivityType::DeleteAnswer,
        ActivityType::MarkOffensive,
        ActivityType::UpdateTags,
        ActivityType::Favorite,
        ActivityType::UserFullUpdated,
        ActivityType::EmailUpdateSent,
        ActivityType::Mention,
        ActivityType::UnansweredReminderSent,
        ActivityType::AcceptAnswerReminderSent,
        ActivityType::CreateTagWiki,
        ActivityType::UpdateTagWiki,
        ActivityType::ModeratedNewPost,
        ActivityType::ModeratedPostEdit,
        ActivityType::CreateRejectReason,
        ActivityType::UpdateRejectReason,
        ActivityType::ValidationEmailSent,
        ActivityType::PostShared,
        ActivityType::AskToJoinGroup,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Human readable label used in feeds and the inbox.
    pub fn label(self) -> &'static str {
        match self {
            ActivityType::AskQuestion => "asked a question",
            ActivityType::Answer => "answered a question",
            ActivityType::CommentQuestion => "commented question",
            ActivityType::CommentAnswer => "commented answer",
            ActivityType::UpdateQuestion => "edited question",
            ActivityType::UpdateAnswer => "edited answer",
            ActivityType::Prize => "received badge",
            ActivityType::MarkAnswer => "marked best answer",
            ActivityType::VoteUp => "upvoted",
            ActivityType::VoteDown => "downvoted",
            ActivityType::CancelVote => "canceled vote",
            ActivityType::DeleteQuestion => "deleted question",
            ActivityType::DeleteAnswer => "deleted answer",
            ActivityType::MarkOffensive => "marked offensive",
            ActivityType::UpdateTags => "updated tags",
            ActivityType::Favorite => "selected favorite",
            ActivityType::UserFullUpdated => "completed user profile",
            ActivityType::EmailUpdateSent => "email update sent to user",
            ActivityType::Mention => "mentioned in the post",
            ActivityType::UnansweredReminderSent => "reminder about unanswered questions sent",
            ActivityType::AcceptAnswerReminderSent => "reminder about accepting the best answer sent",
            ActivityType::CreateTagWiki => "created tag description",
            ActivityType::UpdateTagWiki => "updated tag description",
            ActivityType::ModeratedNewPost => "made a new post",
            ActivityType::ModeratedPostEdit => "made an edit",
            ActivityType::CreateRejectReason => "created post reject reason",
            ActivityType::UpdateRejectReason => "updated post reject reason",
            ActivityType::ValidationEmailSent => "sent email address validation message",
            ActivityType::PostShared => "shared a post",
            ActivityType::AskToJoinGroup => "asked to join a group",
        }
    }

    /// Update types that send instant email notifications.
    pub fn is_instant_notification_type(self) -> bool {
        matches!(
            self,
            ActivityType::CommentQuestion
                | ActivityType::CommentAnswer
                | ActivityType::UpdateAnswer
                | ActivityType::UpdateQuestion
                | ActivityType::Answer
                | ActivityType::AskQuestion
                | ActivityType::PostShared
        )
    }

    /// Name of the notification template variant for an instant update type.
    pub fn template_update_type(self) -> Option<&'static str> {
        match self {
            ActivityType::CommentQuestion => Some("question_comment"),
            ActivityType::CommentAnswer => Some("answer_comment"),
            ActivityType::UpdateAnswer => Some("answer_update"),
            ActivityType::UpdateQuestion => Some("question_update"),
            ActivityType::Answer => Some("new_answer"),
            ActivityType::AskQuestion => Some("new_question"),
            ActivityType::PostShared => Some("post_shared"),
            _ => None,
        }
    }
}

/// Types listed in the "forum" section of the inbox.
pub const RESPONSE_ACTIVITY_TYPES_FOR_DISPLAY: [ActivityType; 8] = [
    ActivityType::Answer,
    ActivityType::AskQuestion,
    ActivityType::CommentQuestion,
    ActivityType::CommentAnswer,
    ActivityType::UpdateAnswer,
    ActivityType::UpdateQuestion,
    ActivityType::PostShared,
    ActivityType::Mention,
];

/// What an activity row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Post,
    Award,
    Vote,
    FavoriteQuestion,
    User,
    Group,
    RejectReason,
    ReplyAddress,
    Tag,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Award => "award",
            ContentType::Vote => "vote",
            ContentType::FavoriteQuestion => "favorite_question",
            ContentType::User => "user",
            ContentType::Group => "group",
            ContentType::RejectReason => "reject_reason",
            ContentType::ReplyAddress => "reply_address",
            ContentType::Tag => "tag",
        }
    }
}

/// Represents the 'activities' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Activity {
    pub id: i64,
    /// The acting user.
    pub user_id: i64,
    pub activity_type: i64,
    pub active_at: DateTime<Utc>,
    pub content_type: String,
    pub object_id: i64,
    /// Origin question post, when the activity relates to a thread.
    pub question_id: Option<i64>,
    pub summary: String,
}

/// Audit status values of the inbox.
pub const STATUS_NEW: i64 = 0;
pub const STATUS_SEEN: i64 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ActivityType::AskQuestion.code(), 1);
        assert_eq!(ActivityType::MarkOffensive.code(), 14);
        assert_eq!(ActivityType::AskToJoinGroup.code(), 30);
        assert_eq!(ActivityType::from_code(19), Some(ActivityType::Mention));
        assert_eq!(ActivityType::from_code(99), None);
    }

    #[test]
    fn only_response_types_map_to_templates() {
        for t in ActivityType::ALL {
            assert_eq!(t.is_instant_notification_type(), t.template_update_type().is_some());
        }
    }
}
