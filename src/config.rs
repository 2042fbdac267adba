// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Who may see a user's reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KarmaMode {
    Public,
    Private,
    Hidden,
}

impl FromStr for KarmaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(KarmaMode::Public),
            "private" => Ok(KarmaMode::Private),
            "hidden" => Ok(KarmaMode::Hidden),
            other => Err(format!("unknown karma mode '{}'", other)),
        }
    }
}

/// When a user's interesting/ignored tags are shown on their profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkedTagsVisibility {
    Always,
    WhenUserWants,
    Never,
}

impl FromStr for MarkedTagsVisibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(MarkedTagsVisibility::Always),
            "when-user-wants" => Ok(MarkedTagsVisibility::WhenUserWants),
            "never" => Ok(MarkedTagsVisibility::Never),
            other => Err(format!("unknown marked tags visibility '{}'", other)),
        }
    }
}

/// Optional SMTP relay. Mail is only logged when absent.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// "starttls" (default), "tls" or "none".
    pub encryption: String,
}

/// Forum rules: reputation thresholds and changes, limits and feature switches.
#[derive(Debug, Clone)]
pub struct ForumSettings {
    // Minimum reputation for actions
    pub min_rep_to_vote_up: i64,
    pub min_rep_to_vote_down: i64,
    pub min_rep_to_flag_offensive: i64,
    pub min_rep_to_leave_comments: i64,
    pub min_rep_to_delete_others_comments: i64,
    pub min_rep_to_close_own_questions: i64,
    pub min_rep_to_reopen_own_questions: i64,
    pub min_rep_to_close_others_questions: i64,
    pub min_rep_to_retag_others_questions: i64,
    pub min_rep_to_edit_wiki: i64,
    pub min_rep_to_edit_others_posts: i64,
    pub min_rep_to_accept_own_answer: i64,
    pub min_rep_to_post_by_email: i64,

    // Reputation changes
    pub rep_gain_for_receiving_upvote: i64,
    pub rep_gain_for_receiving_answer_acceptance: i64,
    pub rep_gain_for_accepting_answer: i64,
    pub rep_gain_for_receiving_downvote_cancelation: i64,
    pub rep_gain_for_canceling_downvote: i64,
    pub rep_loss_for_canceling_answer_acceptance: i64,
    pub rep_loss_for_receiving_cancelation_of_answer_acceptance: i64,
    pub rep_loss_for_downvoting: i64,
    pub rep_loss_for_receiving_downvote: i64,
    pub rep_loss_for_receiving_flag: i64,
    pub rep_loss_for_receiving_three_flags_per_revision: i64,
    pub rep_loss_for_receiving_five_flags_per_revision: i64,
    pub rep_loss_for_receiving_upvote_cancelation: i64,
    pub max_rep_gain_per_user_per_day: i64,
    pub min_reputation: i64,

    // Limits
    pub max_votes_per_user_per_day: i64,
    pub max_flags_per_user_per_day: i64,
    pub max_tags_per_question: usize,
    pub max_tag_length: usize,
    pub limit_one_answer_per_user: bool,

    // Feature switches
    pub karma_mode: KarmaMode,
    pub badges_public: bool,
    pub enable_content_moderation: bool,
    pub groups_enabled: bool,
    pub marked_tags_are_public_when: MarkedTagsVisibility,
    pub editable_screen_name: bool,
    pub reply_by_email: bool,
    pub reply_by_email_hostname: String,

    // Badge thresholds
    pub teacher_badge_min_upvotes: i64,
    pub nice_answer_badge_min_upvotes: i64,
    pub good_answer_badge_min_upvotes: i64,
    pub great_answer_badge_min_upvotes: i64,
    pub nice_question_badge_min_upvotes: i64,
    pub good_question_badge_min_upvotes: i64,
    pub great_question_badge_min_upvotes: i64,
    pub popular_question_badge_min_views: i64,
    pub notable_question_badge_min_views: i64,
    pub famous_question_badge_min_views: i64,
    pub student_badge_min_upvotes: i64,
    pub enlightened_badge_min_upvotes: i64,
    pub guru_badge_min_upvotes: i64,
    pub self_learner_badge_min_upvotes: i64,
    pub necromancer_badge_min_upvotes: i64,
    pub necromancer_badge_min_delay_days: i64,
    pub disciplined_badge_min_upvotes: i64,
    pub peer_pressure_badge_min_downvotes: i64,
    pub commentator_badge_min_comments: i64,
    pub associate_editor_badge_min_edits: i64,
    pub enthusiast_badge_min_days: i64,
    pub taxonomist_badge_min_use_count: i64,
    pub favorite_question_badge_min_stars: i64,
    pub stellar_question_badge_min_stars: i64,
    pub civic_duty_badge_min_votes: i64,

    // Page sizes
    pub users_page_size: i64,
    pub questions_page_size: i64,
    pub user_view_data_size: usize,
}

impl Default for ForumSettings {
    fn default() -> Self {
        Self {
            min_rep_to_vote_up: 5,
            min_rep_to_vote_down: 50,
            min_rep_to_flag_offensive: 5,
            min_rep_to_leave_comments: 10,
            min_rep_to_delete_others_comments: 2000,
            min_rep_to_close_own_questions: 25,
            min_rep_to_reopen_own_questions: 50,
            min_rep_to_close_others_questions: 200,
            min_rep_to_retag_others_questions: 50,
            min_rep_to_edit_wiki: 75,
            min_rep_to_edit_others_posts: 100,
            min_rep_to_accept_own_answer: 50,
            min_rep_to_post_by_email: 100,

            rep_gain_for_receiving_upvote: 10,
            rep_gain_for_receiving_answer_acceptance: 15,
            rep_gain_for_accepting_answer: 2,
            rep_gain_for_receiving_downvote_cancelation: 2,
            rep_gain_for_canceling_downvote: 1,
            rep_loss_for_canceling_answer_acceptance: -2,
            rep_loss_for_receiving_cancelation_of_answer_acceptance: -5,
            rep_loss_for_downvoting: -2,
            rep_loss_for_receiving_downvote: -1,
            rep_loss_for_receiving_flag: -2,
            rep_loss_for_receiving_three_flags_per_revision: -30,
            rep_loss_for_receiving_five_flags_per_revision: -100,
            rep_loss_for_receiving_upvote_cancelation: -10,
            max_rep_gain_per_user_per_day: 200,
            min_reputation: 1,

            max_votes_per_user_per_day: 30,
            max_flags_per_user_per_day: 5,
            max_tags_per_question: 5,
            max_tag_length: 20,
            limit_one_answer_per_user: true,

            karma_mode: KarmaMode::Public,
            badges_public: true,
            enable_content_moderation: false,
            groups_enabled: true,
            marked_tags_are_public_when: MarkedTagsVisibility::Always,
            editable_screen_name: false,
            reply_by_email: false,
            reply_by_email_hostname: "localhost".to_string(),

            teacher_badge_min_upvotes: 1,
            nice_answer_badge_min_upvotes: 2,
            good_answer_badge_min_upvotes: 3,
            great_answer_badge_min_upvotes: 5,
            nice_question_badge_min_upvotes: 2,
            good_question_badge_min_upvotes: 3,
            great_question_badge_min_upvotes: 5,
            popular_question_badge_min_views: 15,
            notable_question_badge_min_views: 25,
            famous_question_badge_min_views: 50,
            student_badge_min_upvotes: 1,
            enlightened_badge_min_upvotes: 2,
            guru_badge_min_upvotes: 5,
            self_learner_badge_min_upvotes: 1,
            necromancer_badge_min_upvotes: 1,
            necromancer_badge_min_delay_days: 30,
            disciplined_badge_min_upvotes: 3,
            peer_pressure_badge_min_downvotes: 3,
            commentator_badge_min_comments: 10,
            associate_editor_badge_min_edits: 20,
            enthusiast_badge_min_days: 5,
            taxonomist_badge_min_use_count: 5,
            favorite_question_badge_min_stars: 3,
            stellar_question_badge_min_stars: 5,
            civic_duty_badge_min_votes: 100,

            users_page_size: 28,
            questions_page_size: 30,
            user_view_data_size: 50,
        }
    }
}

/// Reads `ASKBOT_<NAME>` and falls back to `default` when unset or unparsable.
fn setting<T: FromStr>(name: &str, default: T) -> T {
    match env::var(format!("ASKBOT_{}", name)) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable setting ASKBOT_{}={}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

impl ForumSettings {
    /// Defaults overridden by the `ASKBOT_*` environment.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_rep_to_vote_up: setting("MIN_REP_TO_VOTE_UP", d.min_rep_to_vote_up),
            min_rep_to_vote_down: setting("MIN_REP_TO_VOTE_DOWN", d.min_rep_to_vote_down),
            min_rep_to_flag_offensive: setting("MIN_REP_TO_FLAG_OFFENSIVE", d.min_rep_to_flag_offensive),
            min_rep_to_leave_comments: setting("MIN_REP_TO_LEAVE_COMMENTS", d.min_rep_to_leave_comments),
            min_rep_to_delete_others_comments: setting(
                "MIN_REP_TO_DELETE_OTHERS_COMMENTS",
                d.min_rep_to_delete_others_comments,
            ),
            min_rep_to_close_own_questions: setting(
                "MIN_REP_TO_CLOSE_OWN_QUESTIONS",
                d.min_rep_to_close_own_questions,
            ),
            min_rep_to_reopen_own_questions: setting(
                "MIN_REP_TO_REOPEN_OWN_QUESTIONS",
                d.min_rep_to_reopen_own_questions,
            ),
            min_rep_to_close_others_questions: setting(
                "MIN_REP_TO_CLOSE_OTHERS_QUESTIONS",
                d.min_rep_to_close_others_questions,
            ),
            min_rep_to_retag_others_questions: setting(
                "MIN_REP_TO_RETAG_OTHERS_QUESTIONS",
                d.min_rep_to_retag_others_questions,
            ),
            min_rep_to_edit_wiki: setting("MIN_REP_TO_EDIT_WIKI", d.min_rep_to_edit_wiki),
            min_rep_to_edit_others_posts: setting(
                "MIN_REP_TO_EDIT_OTHERS_POSTS",
                d.min_rep_to_edit_others_posts,
            ),
            min_rep_to_accept_own_answer: setting(
                "MIN_REP_TO_ACCEPT_OWN_ANSWER",
                d.min_rep_to_accept_own_answer,
            ),
            min_rep_to_post_by_email: setting("MIN_REP_TO_POST_BY_EMAIL", d.min_rep_to_post_by_email),

            max_rep_gain_per_user_per_day: setting(
                "MAX_REP_GAIN_PER_USER_PER_DAY",
                d.max_rep_gain_per_user_per_day,
            ),
            max_votes_per_user_per_day: setting(
                "MAX_VOTES_PER_USER_PER_DAY",
                d.max_votes_per_user_per_day,
            ),
            max_flags_per_user_per_day: setting(
                "MAX_FLAGS_PER_USER_PER_DAY",
                d.max_flags_per_user_per_day,
            ),
            max_tags_per_question: setting("MAX_TAGS_PER_QUESTION", d.max_tags_per_question),
            max_tag_length: setting("MAX_TAG_LENGTH", d.max_tag_length),
            limit_one_answer_per_user: setting("LIMIT_ONE_ANSWER_PER_USER", d.limit_one_answer_per_user),

            karma_mode: setting("KARMA_MODE", d.karma_mode),
            badges_public: setting::<String>("BADGES_MODE", "public".to_string()) == "public",
            enable_content_moderation: setting(
                "ENABLE_CONTENT_MODERATION",
                d.enable_content_moderation,
            ),
            groups_enabled: setting("GROUPS_ENABLED", d.groups_enabled),
            marked_tags_are_public_when: setting(
                "MARKED_TAGS_ARE_PUBLIC_WHEN",
                d.marked_tags_are_public_when,
            ),
            editable_screen_name: setting("EDITABLE_SCREEN_NAME", d.editable_screen_name),
            reply_by_email: setting("REPLY_BY_EMAIL", d.reply_by_email),
            reply_by_email_hostname: setting("REPLY_BY_EMAIL_HOSTNAME", d.reply_by_email_hostname),

            users_page_size: setting("USERS_PAGE_SIZE", d.users_page_size),
            questions_page_size: setting("QUESTIONS_PAGE_SIZE", d.questions_page_size),
            ..d
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub bind_addr: String,
    /// Absolute base used for links in emails, e.g. "https://ask.example.org".
    pub site_url: String,
    pub app_short_name: String,
    pub default_from_email: String,
    pub smtp: Option<SmtpConfig>,
    pub forum: ForumSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://askbot.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60 * 60 * 24);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let smtp = env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            username: env::var("SMTP_USERNAME").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            encryption: env::var("SMTP_ENCRYPTION").unwrap_or_else(|_| "starttls".to_string()),
        });

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            site_url: env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            app_short_name: env::var("APP_SHORT_NAME").unwrap_or_else(|_| "Askbot".to_string()),
            default_from_email: env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@localhost".to_string()),
            smtp,
            forum: ForumSettings::from_env(),
        }
    }
}
