//! Badge catalog and award rules.
//!
//! Rules are pure functions over [`BadgeFacts`]; [`handle_event`] loads the facts for an
//! event, evaluates every badge listening to it and applies the resulting awards.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::config::ForumSettings;
use crate::models::{
    activity::{ActivityType, ContentType},
    badge::BadgeLevel,
    post::{Post, PostType},
    thread::Thread,
    user::User,
};
use crate::services::{activity, activity::NewActivity, messages};

/// Things users do that may earn a badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeEvent {
    AcceptBestAnswer,
    DeletePost,
    Downvote,
    Upvote,
    EditAnswer,
    EditQuestion,
    FlagPost,
    PostAnswer,
    PostComment,
    PostQuestion,
    SelectFavoriteQuestion,
    SiteVisit,
    UpdateTag,
    UpdateUserProfile,
    ViewQuestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Disciplined,
    PeerPressure,
    Teacher,
    NiceAnswer,
    GoodAnswer,
    GreatAnswer,
    NiceQuestion,
    GoodQuestion,
    GreatQuestion,
    PopularQuestion,
    NotableQuestion,
    FamousQuestion,
    Student,
    Scholar,
    Enlightened,
    Guru,
    SelfLearner,
    Necromancer,
    CitizenPatrol,
    Editor,
    AssociateEditor,
    Autobiographer,
    Supporter,
    Critic,
    Commentator,
    Enthusiast,
    Taxonomist,
    FavoriteQuestion,
    Stellar,
    CivicDuty,
}

impl Badge {
    pub const ALL: [Badge; 30] = [
        Badge::Disciplined,
        Badge::PeerPressure,
        Badge::Teacher,
        Badge::NiceAnswer,
        Badge::GoodAnswer,
        Badge::GreatAnswer,
        Badge::NiceQuestion,
        Badge::GoodQuestion,
        Badge::GreatQuestion,
        Badge::PopularQuestion,
        Badge::NotableQuestion,
        Badge::FamousQuestion,
        Badge::Student,
        Badge::Scholar,
        Badge::Enlightened,
        Badge::Guru,
        Badge::SelfLearner,
        Badge::Necromancer,
        Badge::CitizenPatrol,
        Badge::Editor,
        Badge::AssociateEditor,
        Badge::Autobiographer,
        Badge::Supporter,
        Badge::Critic,
        Badge::Commentator,
        Badge::Enthusiast,
        Badge::Taxonomist,
        Badge::FavoriteQuestion,
        Badge::Stellar,
        Badge::CivicDuty,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Badge::Disciplined => "disciplined",
            Badge::PeerPressure => "peer-pressure",
            Badge::Teacher => "teacher",
            Badge::NiceAnswer => "nice-answer",
            Badge::GoodAnswer => "good-answer",
            Badge::GreatAnswer => "great-answer",
            Badge::NiceQuestion => "nice-question",
            Badge::GoodQuestion => "good-question",
            Badge::GreatQuestion => "great-question",
            Badge::PopularQuestion => "popular-question",
            Badge::NotableQuestion => "notable-question",
            Badge::FamousQuestion => "famous-question",
            Badge::Student => "student",
            Badge::Scholar => "scholar",
            Badge::Enlightened => "enlightened",
            Badge::Guru => "guru",
            Badge::SelfLearner => "self-learner",
            Badge::Necromancer => "necromancer",
            Badge::CitizenPatrol => "citizen-patrol",
            Badge::Editor => "editor",
            Badge::AssociateEditor => "associate-editor",
            Badge::Autobiographer => "autobiographer",
            Badge::Supporter => "supporter",
            Badge::Critic => "critic",
            Badge::Commentator => "commentator",
            Badge::Enthusiast => "enthusiast",
            Badge::Taxonomist => "taxonomist",
            Badge::FavoriteQuestion => "favorite-question",
            Badge::Stellar => "stellar-question",
            Badge::CivicDuty => "civic-duty",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Badge> {
        Self::ALL.iter().copied().find(|b| b.slug() == slug)
    }

    pub fn name(self) -> &'static str {
        match self {
            Badge::Disciplined => "Disciplined",
            Badge::PeerPressure => "Peer Pressure",
            Badge::Teacher => "Teacher",
            Badge::NiceAnswer => "Nice Answer",
            Badge::GoodAnswer => "Good Answer",
            Badge::GreatAnswer => "Great Answer",
            Badge::NiceQuestion => "Nice Question",
            Badge::GoodQuestion => "Good Question",
            Badge::GreatQuestion => "Great Question",
            Badge::PopularQuestion => "Popular Question",
            Badge::NotableQuestion => "Notable Question",
            Badge::FamousQuestion => "Famous Question",
            Badge::Student => "Student",
            Badge::Scholar => "Scholar",
            Badge::Enlightened => "Enlightened",
            Badge::Guru => "Guru",
            Badge::SelfLearner => "Self-Learner",
            Badge::Necromancer => "Necromancer",
            Badge::CitizenPatrol => "Citizen Patrol",
            Badge::Editor => "Editor",
            Badge::AssociateEditor => "Associate Editor",
            Badge::Autobiographer => "Autobiographer",
            Badge::Supporter => "Supporter",
            Badge::Critic => "Critic",
            Badge::Commentator => "Commentator",
            Badge::Enthusiast => "Enthusiast",
            Badge::Taxonomist => "Taxonomist",
            Badge::FavoriteQuestion => "Favorite Question",
            Badge::Stellar => "Stellar Question",
            Badge::CivicDuty => "Civic Duty",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Badge::Disciplined => "Deleted own post with positive score",
            Badge::PeerPressure => "Deleted own post with negative score",
            Badge::Teacher => "Gave an answer voted up",
            Badge::NiceAnswer => "Answer voted up",
            Badge::GoodAnswer => "Answer voted up many times",
            Badge::GreatAnswer => "Answer voted up very many times",
            Badge::NiceQuestion => "Question voted up",
            Badge::GoodQuestion => "Question voted up many times",
            Badge::GreatQuestion => "Question voted up very many times",
            Badge::PopularQuestion => "Asked a question with many views",
            Badge::NotableQuestion => "Asked a question with very many views",
            Badge::FamousQuestion => "Asked a question with a huge number of views",
            Badge::Student => "Asked first question voted up",
            Badge::Scholar => "Asked a question and accepted an answer",
            Badge::Enlightened => "First answer was accepted and voted up",
            Badge::Guru => "Answer was accepted and voted up many times",
            Badge::SelfLearner => "Answered own question, answer voted up",
            Badge::Necromancer => "Answered a long-standing question, answer voted up",
            Badge::CitizenPatrol => "First flagged post",
            Badge::Editor => "First edit",
            Badge::AssociateEditor => "Made many edits",
            Badge::Autobiographer => "Completed all user profile fields",
            Badge::Supporter => "First upvote",
            Badge::Critic => "First downvote",
            Badge::Commentator => "Posted many comments",
            Badge::Enthusiast => "Visited site every day for several days in a row",
            Badge::Taxonomist => "Created a tag used by many questions",
            Badge::FavoriteQuestion => "Question favorited by many users",
            Badge::Stellar => "Question favorited by very many users",
            Badge::CivicDuty => "Voted many times",
        }
    }

    pub fn level(self) -> BadgeLevel {
        match self {
            Badge::GreatAnswer
            | Badge::GreatQuestion
            | Badge::FamousQuestion
            | Badge::Stellar => BadgeLevel::Gold,
            Badge::GoodAnswer
            | Badge::GoodQuestion
            | Badge::NotableQuestion
            | Badge::Enlightened
            | Badge::Guru
            | Badge::Necromancer
            | Badge::AssociateEditor
            | Badge::Enthusiast
            | Badge::Taxonomist
            | Badge::FavoriteQuestion
            | Badge::CivicDuty => BadgeLevel::Silver,
            _ => BadgeLevel::Bronze,
        }
    }

    /// Multiple badges may be awarded once per object instead of once per user.
    pub fn multiple(self) -> bool {
        matches!(
            self,
            Badge::Disciplined
                | Badge::PeerPressure
                | Badge::NiceAnswer
                | Badge::GoodAnswer
                | Badge::GreatAnswer
                | Badge::NiceQuestion
                | Badge::GoodQuestion
                | Badge::GreatQuestion
                | Badge::PopularQuestion
                | Badge::NotableQuestion
                | Badge::FamousQuestion
                | Badge::Guru
                | Badge::SelfLearner
                | Badge::Necromancer
                | Badge::FavoriteQuestion
                | Badge::Stellar
        )
    }

    pub fn events(self) -> &'static [BadgeEvent] {
        use BadgeEvent::*;
        match self {
            Badge::Disciplined | Badge::PeerPressure => &[DeletePost],
            Badge::Teacher
            | Badge::NiceAnswer
            | Badge::GoodAnswer
            | Badge::GreatAnswer
            | Badge::NiceQuestion
            | Badge::GoodQuestion
            | Badge::GreatQuestion
            | Badge::Student
            | Badge::SelfLearner
            | Badge::Necromancer
            | Badge::Supporter => &[Upvote],
            Badge::PopularQuestion | Badge::NotableQuestion | Badge::FamousQuestion => {
                &[ViewQuestion]
            }
            Badge::Scholar => &[AcceptBestAnswer],
            Badge::Enlightened | Badge::Guru => &[AcceptBestAnswer, Upvote],
            Badge::CitizenPatrol => &[FlagPost],
            Badge::Editor | Badge::AssociateEditor => &[EditAnswer, EditQuestion],
            Badge::Autobiographer => &[UpdateUserProfile],
            Badge::Critic => &[Downvote],
            Badge::Commentator => &[PostComment],
            Badge::Enthusiast => &[SiteVisit],
            Badge::Taxonomist => &[UpdateTag, PostQuestion],
            Badge::FavoriteQuestion | Badge::Stellar => &[SelectFavoriteQuestion],
            Badge::CivicDuty => &[Upvote, Downvote],
        }
    }
}

/// What the rules know about the acting user.
#[derive(Debug, Clone, Default)]
pub struct ActorFacts {
    pub id: i64,
    pub consecutive_days_visit_count: i64,
    pub profile_complete: bool,
    pub vote_count: i64,
    pub comment_count: i64,
    /// Revisions after the first one, on any post.
    pub edit_count: i64,
}

/// The post an event is about, with its thread context.
#[derive(Debug, Clone)]
pub struct PostFacts {
    pub id: i64,
    pub post_type: PostType,
    pub author_id: i64,
    pub score: i64,
    pub added_at: DateTime<Utc>,
    /// Accepted answer.
    pub endorsed: bool,
    pub question_id: i64,
    pub question_author_id: i64,
    pub question_added_at: DateTime<Utc>,
    pub view_count: i64,
    pub favourite_count: i64,
}

#[derive(Debug, Clone)]
pub struct TagFacts {
    pub id: i64,
    pub used_count: i64,
    pub created_by: i64,
}

#[derive(Debug, Clone, Default)]
pub struct BadgeFacts {
    pub actor: ActorFacts,
    pub post: Option<PostFacts>,
    pub tags: Vec<TagFacts>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardCandidate {
    pub badge: Badge,
    pub user_id: i64,
    pub content_type: ContentType,
    pub object_id: i64,
}

fn to_author(badge: Badge, post: &PostFacts) -> AwardCandidate {
    AwardCandidate {
        badge,
        user_id: post.author_id,
        content_type: ContentType::Post,
        object_id: post.id,
    }
}

fn to_actor(badge: Badge, facts: &BadgeFacts) -> AwardCandidate {
    match &facts.post {
        Some(post) => AwardCandidate {
            badge,
            user_id: facts.actor.id,
            content_type: ContentType::Post,
            object_id: post.id,
        },
        None => AwardCandidate {
            badge,
            user_id: facts.actor.id,
            content_type: ContentType::User,
            object_id: facts.actor.id,
        },
    }
}

/// Awards `badge` earns given `facts`. Empty when the rule does not fire.
pub fn evaluate(badge: Badge, facts: &BadgeFacts, s: &ForumSettings) -> Vec<AwardCandidate> {
    let post = facts.post.as_ref();
    let answer = post.filter(|p| p.post_type == PostType::Answer);
    let question = post.filter(|p| p.post_type == PostType::Question);
    let actor = &facts.actor;

    let fired = match badge {
        Badge::Disciplined => post
            .filter(|p| p.author_id == actor.id && p.score >= s.disciplined_badge_min_upvotes)
            .map(|_| to_actor(badge, facts)),
        Badge::PeerPressure => post
            .filter(|p| p.author_id == actor.id && p.score <= -s.peer_pressure_badge_min_downvotes)
            .map(|_| to_actor(badge, facts)),
        Badge::Teacher => answer
            .filter(|p| p.score >= s.teacher_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::NiceAnswer => answer
            .filter(|p| p.score >= s.nice_answer_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::GoodAnswer => answer
            .filter(|p| p.score >= s.good_answer_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::GreatAnswer => answer
            .filter(|p| p.score >= s.great_answer_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::NiceQuestion => question
            .filter(|p| p.score >= s.nice_question_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::GoodQuestion => question
            .filter(|p| p.score >= s.good_question_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::GreatQuestion => question
            .filter(|p| p.score >= s.great_question_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::PopularQuestion => question
            .filter(|p| p.view_count >= s.popular_question_badge_min_views)
            .map(|p| to_author(badge, p)),
        Badge::NotableQuestion => question
            .filter(|p| p.view_count >= s.notable_question_badge_min_views)
            .map(|p| to_author(badge, p)),
        Badge::FamousQuestion => question
            .filter(|p| p.view_count >= s.famous_question_badge_min_views)
            .map(|p| to_author(badge, p)),
        Badge::Student => question
            .filter(|p| p.score >= s.student_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::Scholar => answer
            .filter(|p| p.question_author_id == actor.id && p.author_id != actor.id)
            .map(|p| AwardCandidate {
                badge,
                user_id: actor.id,
                content_type: ContentType::Post,
                object_id: p.question_id,
            }),
        Badge::Enlightened => answer
            .filter(|p| p.endorsed && p.score >= s.enlightened_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::Guru => answer
            .filter(|p| p.endorsed && p.score >= s.guru_badge_min_upvotes)
            .map(|p| to_author(badge, p)),
        Badge::SelfLearner => answer
            .filter(|p| {
                p.author_id == p.question_author_id && p.score >= s.self_learner_badge_min_upvotes
            })
            .map(|p| to_author(badge, p)),
        Badge::Necromancer => answer
            .filter(|p| {
                p.score >= s.necromancer_badge_min_upvotes
                    && p.added_at - p.question_added_at
                        >= Duration::days(s.necromancer_badge_min_delay_days)
            })
            .map(|p| to_author(badge, p)),
        Badge::CitizenPatrol | Badge::Editor | Badge::Supporter | Badge::Critic => {
            Some(to_actor(badge, facts))
        }
        Badge::AssociateEditor => (actor.edit_count >= s.associate_editor_badge_min_edits)
            .then(|| to_actor(badge, facts)),
        Badge::Autobiographer => actor.profile_complete.then(|| AwardCandidate {
            badge,
            user_id: actor.id,
            content_type: ContentType::User,
            object_id: actor.id,
        }),
        Badge::Commentator => (actor.comment_count >= s.commentator_badge_min_comments)
            .then(|| to_actor(badge, facts)),
        Badge::Enthusiast => (actor.consecutive_days_visit_count >= s.enthusiast_badge_min_days)
            .then(|| AwardCandidate {
                badge,
                user_id: actor.id,
                content_type: ContentType::User,
                object_id: actor.id,
            }),
        Badge::Taxonomist => {
            return facts
                .tags
                .iter()
                .filter(|t| t.used_count >= s.taxonomist_badge_min_use_count)
                .map(|t| AwardCandidate {
                    badge,
                    user_id: t.created_by,
                    content_type: ContentType::Tag,
                    object_id: t.id,
                })
                .collect();
        }
        Badge::FavoriteQuestion => question
            .filter(|p| p.favourite_count >= s.favorite_question_badge_min_stars)
            .map(|p| to_author(badge, p)),
        Badge::Stellar => question
            .filter(|p| p.favourite_count >= s.stellar_question_badge_min_stars)
            .map(|p| to_author(badge, p)),
        Badge::CivicDuty => (actor.vote_count >= s.civic_duty_badge_min_votes)
            .then(|| to_actor(badge, facts)),
    };

    fired.into_iter().collect()
}

async fn load_facts(
    conn: &mut SqliteConnection,
    actor_id: i64,
    post_id: Option<i64>,
) -> Result<BadgeFacts, sqlx::Error> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(actor_id)
        .fetch_one(&mut *conn)
        .await?;

    let (vote_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM votes WHERE user_id = ?")
        .bind(actor_id)
        .fetch_one(&mut *conn)
        .await?;
    let (comment_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM posts WHERE author_id = ? AND post_type = 'comment' AND deleted = FALSE",
    )
    .bind(actor_id)
    .fetch_one(&mut *conn)
    .await?;
    let (edit_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM post_revisions WHERE author_id = ? AND revision > 1",
    )
    .bind(actor_id)
    .fetch_one(&mut *conn)
    .await?;

    let actor = ActorFacts {
        id: actor_id,
        consecutive_days_visit_count: user.consecutive_days_visit_count,
        profile_complete: user.profile_is_complete(),
        vote_count,
        comment_count,
        edit_count,
    };

    let Some(post_id) = post_id else {
        return Ok(BadgeFacts {
            actor,
            ..Default::default()
        });
    };

    let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_one(&mut *conn)
        .await?;
    let thread = sqlx::query_as::<_, Thread>("SELECT * FROM threads WHERE id = ?")
        .bind(post.thread_id)
        .fetch_one(&mut *conn)
        .await?;
    let question = sqlx::query_as::<_, Post>(
        "SELECT * FROM posts WHERE thread_id = ? AND post_type = 'question'",
    )
    .bind(post.thread_id)
    .fetch_one(&mut *conn)
    .await?;

    let tags: Vec<(i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT t.id, t.used_count, t.created_by
        FROM tags t JOIN thread_tags tt ON tt.tag_id = t.id
        WHERE tt.thread_id = ?
        "#,
    )
    .bind(post.thread_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(BadgeFacts {
        actor,
        post: Some(PostFacts {
            id: post.id,
            post_type: post.kind(),
            author_id: post.author_id,
            score: post.score,
            added_at: post.added_at,
            endorsed: post.endorsed,
            question_id: question.id,
            question_author_id: question.author_id,
            question_added_at: question.added_at,
            view_count: thread.view_count,
            favourite_count: thread.favourite_count,
        }),
        tags: tags
            .into_iter()
            .map(|(id, used_count, created_by)| TagFacts {
                id,
                used_count,
                created_by,
            })
            .collect(),
    })
}

/// Evaluates every badge listening to `event` and applies new awards.
/// Returns the badges that were actually awarded.
pub async fn handle_event(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    event: BadgeEvent,
    actor_id: i64,
    post_id: Option<i64>,
) -> Result<Vec<Badge>, sqlx::Error> {
    let listeners: Vec<Badge> = Badge::ALL
        .iter()
        .copied()
        .filter(|b| b.events().contains(&event))
        .collect();
    if listeners.is_empty() {
        return Ok(Vec::new());
    }

    let facts = load_facts(conn, actor_id, post_id).await?;
    let mut awarded = Vec::new();
    for badge in listeners {
        for candidate in evaluate(badge, &facts, settings) {
            if award(conn, settings, &candidate).await? {
                awarded.push(candidate.badge);
            }
        }
    }
    Ok(awarded)
}

async fn badge_id(conn: &mut SqliteConnection, badge: Badge) -> Result<i64, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO badges (slug, awarded_count) VALUES (?, 0)")
        .bind(badge.slug())
        .execute(&mut *conn)
        .await?;
    let (id,): (i64,) = sqlx::query_as("SELECT id FROM badges WHERE slug = ?")
        .bind(badge.slug())
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

/// Applies one award unless the recipient already holds it. Returns whether it was new.
pub async fn award(
    conn: &mut SqliteConnection,
    settings: &ForumSettings,
    candidate: &AwardCandidate,
) -> Result<bool, sqlx::Error> {
    let badge = candidate.badge;
    let badge_id = badge_id(conn, badge).await?;

    let (existing,): (i64,) = if badge.multiple() {
        sqlx::query_as(
            "SELECT COUNT(*) FROM awards WHERE user_id = ? AND badge_id = ? AND content_type = ? AND object_id = ?",
        )
        .bind(candidate.user_id)
        .bind(badge_id)
        .bind(candidate.content_type.as_str())
        .bind(candidate.object_id)
        .fetch_one(&mut *conn)
        .await?
    } else {
        sqlx::query_as("SELECT COUNT(*) FROM awards WHERE user_id = ? AND badge_id = ?")
            .bind(candidate.user_id)
            .bind(badge_id)
            .fetch_one(&mut *conn)
            .await?
    };
    if existing > 0 {
        return Ok(false);
    }

    let (award_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO awards (user_id, badge_id, content_type, object_id, awarded_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(candidate.user_id)
    .bind(badge_id)
    .bind(candidate.content_type.as_str())
    .bind(candidate.object_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE badges SET awarded_count = awarded_count + 1 WHERE id = ?")
        .bind(badge_id)
        .execute(&mut *conn)
        .await?;

    let counter = match badge.level() {
        BadgeLevel::Gold => "UPDATE users SET gold = gold + 1 WHERE id = ?",
        BadgeLevel::Silver => "UPDATE users SET silver = silver + 1 WHERE id = ?",
        BadgeLevel::Bronze => "UPDATE users SET bronze = bronze + 1 WHERE id = ?",
    };
    sqlx::query(counter)
        .bind(candidate.user_id)
        .execute(&mut *conn)
        .await?;

    activity::record_with_recipients(
        conn,
        &NewActivity::new(
            candidate.user_id,
            ActivityType::Prize,
            ContentType::Award,
            award_id,
        )
        .summary(badge.name()),
        &[candidate.user_id],
    )
    .await?;

    if settings.badges_public {
        messages::create_message(
            conn,
            candidate.user_id,
            &format!(
                "Congratulations, you have received a badge '{}'. Check out your profile.",
                badge.name()
            ),
        )
        .await?;
    }

    tracing::info!(user_id = candidate.user_id, badge = badge.slug(), "Badge awarded");
    Ok(true)
}

/// Badge held by a user, with how many times.
#[derive(Debug, Clone, Serialize)]
pub struct BadgeCount {
    pub slug: String,
    pub name: String,
    pub level: BadgeLevel,
    pub count: i64,
}

/// Badges of a user, most awarded first.
pub async fn user_badges(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<BadgeCount>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT b.slug, COUNT(*) AS cnt
        FROM awards a JOIN badges b ON b.id = a.badge_id
        WHERE a.user_id = ?
        GROUP BY b.slug
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut counts: Vec<BadgeCount> = rows
        .into_iter()
        .filter_map(|(slug, count)| {
            let badge = Badge::from_slug(&slug)?;
            Some(BadgeCount {
                slug,
                name: badge.name().to_string(),
                level: badge.level(),
                count,
            })
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then(a.level.cmp(&b.level)));
    Ok(counts)
}

/// Catalog entry with its global award count.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub slug: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub level: BadgeLevel,
    pub multiple: bool,
    pub awarded_count: i64,
}

pub async fn catalog(conn: &mut SqliteConnection) -> Result<Vec<CatalogEntry>, sqlx::Error> {
    let counts: Vec<(String, i64)> = sqlx::query_as("SELECT slug, awarded_count FROM badges")
        .fetch_all(&mut *conn)
        .await?;

    let mut entries: Vec<CatalogEntry> = Badge::ALL
        .iter()
        .map(|b| CatalogEntry {
            slug: b.slug(),
            name: b.name(),
            description: b.description(),
            level: b.level(),
            multiple: b.multiple(),
            awarded_count: counts
                .iter()
                .find(|(slug, _)| slug == b.slug())
                .map(|(_, c)| *c)
                .unwrap_or(0),
        })
        .collect();
    entries.sort_by(|a, b| a.level.cmp(&b.level).then(a.name.cmp(b.name)));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer_facts(actor: i64, author: i64, score: i64) -> BadgeFacts {
        BadgeFacts {
            actor: ActorFacts {
                id: actor,
                ..Default::default()
            },
            post: Some(PostFacts {
                id: 20,
                post_type: PostType::Answer,
                author_id: author,
                score,
                added_at: Utc::now(),
                endorsed: false,
                question_id: 10,
                question_author_id: 1,
                question_added_at: Utc::now(),
                view_count: 0,
                favourite_count: 0,
            }),
            tags: Vec::new(),
        }
    }

    #[test]
    fn slugs_are_unique_and_resolvable() {
        for badge in Badge::ALL {
            assert_eq!(Badge::from_slug(badge.slug()), Some(badge));
            assert!(!badge.events().is_empty());
        }
    }

    #[test]
    fn upvoted_answer_rewards_its_author() {
        let s = ForumSettings::default();
        let facts = answer_facts(3, 2, s.nice_answer_badge_min_upvotes);
        let awards = evaluate(Badge::NiceAnswer, &facts, &s);
        assert_eq!(
            awards,
            vec![AwardCandidate {
                badge: Badge::NiceAnswer,
                user_id: 2,
                content_type: ContentType::Post,
                object_id: 20,
            }]
        );
        assert!(evaluate(Badge::GreatAnswer, &facts, &s).is_empty());
        assert!(evaluate(Badge::NiceQuestion, &facts, &s).is_empty());
    }

    #[test]
    fn supporter_goes_to_the_voter() {
        let s = ForumSettings::default();
        let awards = evaluate(Badge::Supporter, &answer_facts(3, 2, 1), &s);
        assert_eq!(awards[0].user_id, 3);
    }

    #[test]
    fn self_learner_needs_own_question() {
        let s = ForumSettings::default();
        assert!(evaluate(Badge::SelfLearner, &answer_facts(3, 2, 1), &s).is_empty());
        assert_eq!(evaluate(Badge::SelfLearner, &answer_facts(3, 1, 1), &s).len(), 1);
    }

    #[test]
    fn necromancer_needs_a_late_answer() {
        let s = ForumSettings::default();
        let mut facts = answer_facts(3, 2, 1);
        assert!(evaluate(Badge::Necromancer, &facts, &s).is_empty());
        if let Some(post) = facts.post.as_mut() {
            post.question_added_at = post.added_at - Duration::days(40);
        }
        assert_eq!(evaluate(Badge::Necromancer, &facts, &s).len(), 1);
    }

    #[test]
    fn scholar_goes_to_the_accepting_asker() {
        let s = ForumSettings::default();
        let awards = evaluate(Badge::Scholar, &answer_facts(1, 2, 0), &s);
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].user_id, 1);
        assert_eq!(awards[0].object_id, 10);
        assert!(evaluate(Badge::Scholar, &answer_facts(3, 2, 0), &s).is_empty());
    }

    #[test]
    fn disciplined_and_peer_pressure_need_own_post() {
        let s = ForumSettings::default();
        assert_eq!(evaluate(Badge::Disciplined, &answer_facts(2, 2, 3), &s).len(), 1);
        assert!(evaluate(Badge::Disciplined, &answer_facts(1, 2, 3), &s).is_empty());
        assert_eq!(evaluate(Badge::PeerPressure, &answer_facts(2, 2, -3), &s).len(), 1);
    }

    #[test]
    fn taxonomist_rewards_tag_creators() {
        let s = ForumSettings::default();
        let facts = BadgeFacts {
            tags: vec![
                TagFacts {
                    id: 1,
                    used_count: 5,
                    created_by: 7,
                },
                TagFacts {
                    id: 2,
                    used_count: 1,
                    created_by: 8,
                },
            ],
            ..Default::default()
        };
        let awards = evaluate(Badge::Taxonomist, &facts, &s);
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].user_id, 7);
        assert_eq!(awards[0].content_type, ContentType::Tag);
    }

    #[test]
    fn enthusiast_counts_consecutive_days() {
        let s = ForumSettings::default();
        let mut facts = BadgeFacts::default();
        facts.actor.consecutive_days_visit_count = s.enthusiast_badge_min_days - 1;
        assert!(evaluate(Badge::Enthusiast, &facts, &s).is_empty());
        facts.actor.consecutive_days_visit_count = s.enthusiast_badge_min_days;
        assert_eq!(evaluate(Badge::Enthusiast, &facts, &s).len(), 1);
    }
}
