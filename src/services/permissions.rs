//! Permission assertions.
//!
//! Each `assert_*` function checks one action against the acting user and the facts the
//! caller already loaded, and explains a refusal in a sentence fit to show the user.
//! Administrators and moderators skip reputation thresholds; blocked users may not write
//! anything and suspended users may only edit their own posts.

use crate::config::{ForumSettings, KarmaMode};
use crate::models::{
    post::Post,
    thread::Thread,
    user::{User, UserStatus},
    vote::VoteDirection,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDenied(pub String);

pub type Check = Result<(), PermissionDenied>;

fn deny(msg: impl Into<String>) -> Check {
    Err(PermissionDenied(msg.into()))
}

fn assert_not_blocked(user: &User) -> Check {
    if user.is_blocked() {
        return deny("Sorry, your account appears to be blocked");
    }
    Ok(())
}

/// Blocked and suspended accounts cannot create content.
fn assert_can_write(user: &User) -> Check {
    assert_not_blocked(user)?;
    if user.is_suspended() {
        return deny("Sorry, your account appears to be suspended");
    }
    Ok(())
}

fn assert_min_reputation(user: &User, required: i64, action: &str) -> Check {
    if user.is_administrator_or_moderator() || user.reputation >= required {
        Ok(())
    } else {
        deny(format!(
            "Sorry, {} requires at least {} points of reputation",
            action, required
        ))
    }
}

pub fn assert_can_post(user: &User) -> Check {
    assert_can_write(user)
}

pub fn assert_can_vote(
    user: &User,
    post: &Post,
    direction: VoteDirection,
    votes_today: i64,
    settings: &ForumSettings,
) -> Check {
    assert_can_write(user)?;

    if post.author_id == user.id {
        return deny("Sorry, you cannot vote for your own posts");
    }
    if post.deleted {
        return deny("Sorry, this post has been deleted");
    }

    match direction {
        VoteDirection::Up => {
            assert_min_reputation(user, settings.min_rep_to_vote_up, "voting up")?
        }
        VoteDirection::Down => {
            assert_min_reputation(user, settings.min_rep_to_vote_down, "voting down")?
        }
    }

    if votes_today >= settings.max_votes_per_user_per_day {
        return deny("Sorry, you have exhausted the maximum number of votes for today");
    }
    Ok(())
}

pub fn assert_can_answer(
    user: &User,
    thread: &Thread,
    already_answered: bool,
    settings: &ForumSettings,
) -> Check {
    assert_can_write(user)?;

    if thread.closed && !user.is_administrator_or_moderator() {
        return deny("Sorry, this question is closed");
    }
    if settings.limit_one_answer_per_user
        && already_answered
        && !user.is_administrator_or_moderator()
    {
        return deny(
            "Sorry, you already gave an answer, please edit it instead of adding a new one",
        );
    }
    Ok(())
}

pub fn assert_can_comment(
    user: &User,
    parent: &Post,
    question_author_id: i64,
    settings: &ForumSettings,
) -> Check {
    assert_can_write(user)?;

    if parent.deleted {
        return deny("Sorry, you cannot comment on deleted posts");
    }
    // Authors may always discuss their own posts and questions.
    if parent.author_id == user.id || question_author_id == user.id {
        return Ok(());
    }
    assert_min_reputation(user, settings.min_rep_to_leave_comments, "leaving comments")
}

pub fn assert_can_edit(user: &User, post: &Post, settings: &ForumSettings) -> Check {
    assert_not_blocked(user)?;

    if user.is_administrator_or_moderator() {
        return Ok(());
    }
    if post.deleted {
        return deny("Sorry, this post is deleted and cannot be edited");
    }
    if post.locked {
        return deny("Sorry, this post is locked");
    }
    if post.author_id == user.id {
        return Ok(());
    }
    if user.is_suspended() {
        return deny("Sorry, since your account is suspended you can only edit your own posts");
    }
    if post.is_comment() {
        return deny("Sorry, comments can be edited only by their authors");
    }
    if post.wiki {
        assert_min_reputation(user, settings.min_rep_to_edit_wiki, "editing wiki posts")
    } else {
        assert_min_reputation(
            user,
            settings.min_rep_to_edit_others_posts,
            "editing other people's posts",
        )
    }
}

/// `has_upvoted_foreign_answers` only matters for questions: an upvoted answer by
/// another user keeps the asker from deleting.
pub fn assert_can_delete(
    user: &User,
    post: &Post,
    has_upvoted_foreign_answers: bool,
    settings: &ForumSettings,
) -> Check {
    assert_can_write(user)?;

    if user.is_administrator_or_moderator() {
        return Ok(());
    }
    if post.author_id == user.id {
        if post.is_question() && has_upvoted_foreign_answers {
            return deny(
                "Sorry, cannot delete your question since it has an upvoted answer posted by someone else",
            );
        }
        return Ok(());
    }
    if post.is_comment() {
        return assert_min_reputation(
            user,
            settings.min_rep_to_delete_others_comments,
            "deleting other people's comments",
        );
    }
    deny("Sorry, only moderators can delete other people's posts")
}

pub fn assert_can_flag(
    user: &User,
    post: &Post,
    flags_today: i64,
    already_flagged: bool,
    settings: &ForumSettings,
) -> Check {
    assert_can_write(user)?;

    if post.deleted {
        return deny("Sorry, this post is deleted and cannot be flagged");
    }
    if post.author_id == user.id {
        return deny("Sorry, you cannot flag your own posts");
    }
    if already_flagged {
        return deny("You have flagged this post before and cannot do it more than once");
    }
    assert_min_reputation(
        user,
        settings.min_rep_to_flag_offensive,
        "flagging posts as offensive",
    )?;
    if !user.is_administrator_or_moderator() && flags_today >= settings.max_flags_per_user_per_day
    {
        return deny(format!(
            "Sorry, you have exhausted the maximum number of {} offensive flags per day",
            settings.max_flags_per_user_per_day
        ));
    }
    Ok(())
}

pub fn assert_can_accept(
    user: &User,
    answer: &Post,
    question: &Post,
    settings: &ForumSettings,
) -> Check {
    assert_can_write(user)?;

    if !answer.is_answer() {
        return deny("Only answers can be accepted");
    }
    if user.is_administrator_or_moderator() {
        return Ok(());
    }
    if question.author_id != user.id {
        return deny(
            "Sorry, only moderators or original author of the question can accept or unaccept the best answer",
        );
    }
    if answer.author_id == user.id {
        return assert_min_reputation(
            user,
            settings.min_rep_to_accept_own_answer,
            "accepting your own answer",
        );
    }
    Ok(())
}

pub fn assert_can_close(user: &User, question: &Post, settings: &ForumSettings) -> Check {
    assert_can_write(user)?;
    if question.author_id == user.id {
        assert_min_reputation(
            user,
            settings.min_rep_to_close_own_questions,
            "closing own questions",
        )
    } else {
        assert_min_reputation(
            user,
            settings.min_rep_to_close_others_questions,
            "closing other people's questions",
        )
    }
}

pub fn assert_can_reopen(user: &User, question: &Post, settings: &ForumSettings) -> Check {
    assert_can_write(user)?;
    if question.author_id == user.id {
        assert_min_reputation(
            user,
            settings.min_rep_to_reopen_own_questions,
            "reopening own questions",
        )
    } else if user.is_administrator_or_moderator() {
        Ok(())
    } else {
        deny("Sorry, only administrators, moderators or owners with high reputation can reopen questions")
    }
}

pub fn assert_can_retag(user: &User, question: &Post, settings: &ForumSettings) -> Check {
    assert_can_write(user)?;
    if question.author_id == user.id {
        return Ok(());
    }
    assert_min_reputation(
        user,
        settings.min_rep_to_retag_others_questions,
        "retagging other people's questions",
    )
}

pub fn assert_can_moderate(user: &User) -> Check {
    if user.is_administrator_or_moderator() {
        Ok(())
    } else {
        deny("Sorry, only moderators and administrators can do this")
    }
}

pub fn can_moderate_user(moderator: &User, subject: &User) -> bool {
    if moderator.is_administrator() {
        true
    } else if moderator.is_moderator() {
        !(subject.is_moderator() || subject.is_administrator())
    } else {
        false
    }
}

pub fn assert_can_change_status(moderator: &User, subject: &User, new_status: UserStatus) -> Check {
    if moderator.id == subject.id {
        return deny("Sorry, you cannot change your own status");
    }
    if !can_moderate_user(moderator, subject) {
        return deny("Sorry, you cannot moderate this user");
    }
    if matches!(new_status, UserStatus::Moderator | UserStatus::Administrator)
        && !moderator.is_administrator()
    {
        return deny("Sorry, only administrators can grant moderator or administrator status");
    }
    Ok(())
}

/// Reply-by-email needs the feature on and a validated address.
pub fn can_post_by_email(user: &User, settings: &ForumSettings) -> bool {
    settings.reply_by_email && user.email_isvalid && !user.email.is_empty()
}

pub fn can_show_karma(viewer: Option<&User>, owner: &User, mode: KarmaMode) -> bool {
    can_show_karma_of(viewer, owner.id, mode)
}

/// Same as `can_show_karma` for rows that only carry the owner's id.
pub fn can_show_karma_of(viewer: Option<&User>, owner_id: i64, mode: KarmaMode) -> bool {
    match mode {
        KarmaMode::Public => true,
        KarmaMode::Hidden => false,
        KarmaMode::Private => match viewer {
            None => false,
            Some(v) => v.is_administrator_or_moderator() || v.id == owner_id,
        },
    }
}

/// Deleted and unmoderated posts are visible to their author and moderators only.
pub fn can_see_post(viewer: Option<&User>, post: &Post) -> bool {
    if !post.deleted && post.approved {
        return true;
    }
    match viewer {
        None => false,
        Some(v) => v.is_administrator_or_moderator() || v.id == post.author_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{post, user};

    fn settings() -> ForumSettings {
        ForumSettings::default()
    }

    #[test]
    fn cannot_vote_for_own_post() {
        let author = user(1, 500, "a");
        let p = post(10, "answer", 1);
        let err = assert_can_vote(&author, &p, VoteDirection::Up, 0, &settings()).unwrap_err();
        assert!(err.0.contains("own posts"));
    }

    #[test]
    fn downvote_needs_more_reputation_than_upvote() {
        let voter = user(2, 10, "a");
        let p = post(10, "answer", 1);
        assert!(assert_can_vote(&voter, &p, VoteDirection::Up, 0, &settings()).is_ok());
        assert!(assert_can_vote(&voter, &p, VoteDirection::Down, 0, &settings()).is_err());

        let moderator = user(3, 1, "m");
        assert!(assert_can_vote(&moderator, &p, VoteDirection::Down, 0, &settings()).is_ok());
    }

    #[test]
    fn daily_vote_limit_applies() {
        let voter = user(2, 100, "a");
        let p = post(10, "answer", 1);
        let s = settings();
        let err = assert_can_vote(&voter, &p, VoteDirection::Up, s.max_votes_per_user_per_day, &s)
            .unwrap_err();
        assert!(err.0.contains("maximum number of votes"));
    }

    #[test]
    fn blocked_and_suspended_users_cannot_post() {
        assert!(assert_can_post(&user(1, 100, "b")).is_err());
        assert!(assert_can_post(&user(1, 100, "s")).is_err());
        assert!(assert_can_post(&user(1, 1, "w")).is_ok());
    }

    #[test]
    fn suspended_user_can_still_edit_own_post() {
        let suspended = user(1, 1, "s");
        assert!(assert_can_edit(&suspended, &post(5, "answer", 1), &settings()).is_ok());
        assert!(assert_can_edit(&suspended, &post(6, "answer", 2), &settings()).is_err());
    }

    #[test]
    fn wiki_posts_have_a_lower_edit_threshold() {
        let editor = user(2, 80, "a");
        let mut p = post(5, "answer", 1);
        assert!(assert_can_edit(&editor, &p, &settings()).is_err());
        p.wiki = true;
        assert!(assert_can_edit(&editor, &p, &settings()).is_ok());
    }

    #[test]
    fn comments_by_others_are_not_editable() {
        let rich = user(2, 10_000, "a");
        assert!(assert_can_edit(&rich, &post(5, "comment", 1), &settings()).is_err());
    }

    #[test]
    fn locked_post_is_moderator_only() {
        let mut p = post(5, "question", 1);
        p.locked = true;
        assert!(assert_can_edit(&user(1, 1, "a"), &p, &settings()).is_err());
        assert!(assert_can_edit(&user(9, 1, "m"), &p, &settings()).is_ok());
    }

    #[test]
    fn question_with_upvoted_foreign_answer_is_not_deletable_by_author() {
        let author = user(1, 1, "a");
        let q = post(5, "question", 1);
        assert!(assert_can_delete(&author, &q, false, &settings()).is_ok());
        assert!(assert_can_delete(&author, &q, true, &settings()).is_err());
        assert!(assert_can_delete(&user(9, 1, "m"), &q, true, &settings()).is_ok());
    }

    #[test]
    fn others_posts_only_deletable_by_moderators() {
        let other = user(2, 100_000, "a");
        assert!(assert_can_delete(&other, &post(5, "answer", 1), false, &settings()).is_err());
        assert!(assert_can_delete(&other, &post(6, "comment", 1), false, &settings()).is_ok());
    }

    #[test]
    fn commenting_rules() {
        let s = settings();
        let newbie = user(2, 1, "a");
        let answer = post(5, "answer", 3);
        // question author may comment on answers regardless of reputation
        assert!(assert_can_comment(&newbie, &answer, 2, &s).is_ok());
        assert!(assert_can_comment(&newbie, &answer, 4, &s).is_err());
        assert!(assert_can_comment(&user(2, 10, "a"), &answer, 4, &s).is_ok());
    }

    #[test]
    fn flag_rules() {
        let s = settings();
        let flagger = user(2, 10, "a");
        let p = post(5, "answer", 1);
        assert!(assert_can_flag(&flagger, &p, 0, false, &s).is_ok());
        assert!(assert_can_flag(&flagger, &p, 0, true, &s).is_err());
        assert!(assert_can_flag(&flagger, &p, s.max_flags_per_user_per_day, false, &s).is_err());
        assert!(assert_can_flag(&user(1, 100, "a"), &p, 0, false, &s).is_err());
    }

    #[test]
    fn deleted_posts_cannot_be_flagged() {
        let s = settings();
        let mut p = post(5, "answer", 1);
        p.deleted = true;
        let err = assert_can_flag(&user(2, 10, "a"), &p, 0, false, &s).unwrap_err();
        assert!(err.0.contains("deleted"));
        assert!(assert_can_flag(&user(3, 1, "m"), &p, 0, false, &s).is_err());
    }

    #[test]
    fn only_question_author_accepts() {
        let s = settings();
        let question = post(1, "question", 1);
        let answer = post(2, "answer", 2);
        assert!(assert_can_accept(&user(1, 1, "a"), &answer, &question, &s).is_ok());
        assert!(assert_can_accept(&user(3, 1000, "a"), &answer, &question, &s).is_err());

        let own_answer = post(3, "answer", 1);
        assert!(assert_can_accept(&user(1, 1, "a"), &own_answer, &question, &s).is_err());
        assert!(assert_can_accept(&user(1, 50, "a"), &own_answer, &question, &s).is_ok());
    }

    #[test]
    fn moderation_hierarchy() {
        let admin = user(1, 1, "d");
        let moderator = user(2, 1, "m");
        let other_moderator = user(3, 1, "m");
        let regular = user(4, 1, "a");

        assert!(can_moderate_user(&admin, &moderator));
        assert!(can_moderate_user(&moderator, &regular));
        assert!(!can_moderate_user(&moderator, &other_moderator));
        assert!(!can_moderate_user(&moderator, &admin));
        assert!(!can_moderate_user(&regular, &regular));
    }

    #[test]
    fn status_changes() {
        let admin = user(1, 1, "d");
        let moderator = user(2, 1, "m");
        let regular = user(4, 1, "a");

        assert!(assert_can_change_status(&moderator, &regular, UserStatus::Suspended).is_ok());
        assert!(assert_can_change_status(&moderator, &regular, UserStatus::Moderator).is_err());
        assert!(assert_can_change_status(&admin, &regular, UserStatus::Moderator).is_ok());
        assert!(assert_can_change_status(&admin, &admin, UserStatus::Approved).is_err());
    }

    #[test]
    fn karma_visibility() {
        let owner = user(1, 1, "a");
        let stranger = user(2, 1, "a");
        let moderator = user(3, 1, "m");

        assert!(can_show_karma(None, &owner, KarmaMode::Public));
        assert!(!can_show_karma(Some(&owner), &owner, KarmaMode::Hidden));
        assert!(!can_show_karma(None, &owner, KarmaMode::Private));
        assert!(!can_show_karma(Some(&stranger), &owner, KarmaMode::Private));
        assert!(can_show_karma(Some(&owner), &owner, KarmaMode::Private));
        assert!(can_show_karma(Some(&moderator), &owner, KarmaMode::Private));
    }

    #[test]
    fn hidden_posts_visible_to_author_and_moderators() {
        let mut p = post(5, "answer", 1);
        p.approved = false;
        assert!(!can_see_post(None, &p));
        assert!(!can_see_post(Some(&user(2, 1, "a")), &p));
        assert!(can_see_post(Some(&user(1, 1, "a")), &p));
        assert!(can_see_post(Some(&user(3, 1, "m")), &p));
    }
}
