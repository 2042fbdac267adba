use chrono::Utc;

use crate::models::{post::Post, thread::Thread, user::User};

pub fn user(id: i64, reputation: i64, status: &str) -> User {
    User {
        id,
        username: format!("user{}", id),
        email: format!("user{}@example.com", id),
        password: String::new(),
        status: status.to_string(),
        is_superuser: false,
        reputation,
        gold: 0,
        silver: 0,
        bronze: 0,
        real_name: String::new(),
        website: String::new(),
        location: String::new(),
        about: String::new(),
        country: String::new(),
        show_country: false,
        date_of_birth: None,
        show_marked_tags: true,
        email_isvalid: true,
        email_tag_filter_strategy: 0,
        last_seen: None,
        consecutive_days_visit_count: 0,
        date_joined: Utc::now(),
    }
}

pub fn post(id: i64, post_type: &str, author_id: i64) -> Post {
    Post {
        id,
        post_type: post_type.to_string(),
        thread_id: 1,
        parent_id: None,
        author_id,
        text: "Some text".to_string(),
        html: "<p>Some text</p>".to_string(),
        summary: "Some text".to_string(),
        score: 0,
        vote_up_count: 0,
        vote_down_count: 0,
        comment_count: 0,
        offensive_flag_count: 0,
        deleted: false,
        deleted_at: None,
        deleted_by: None,
        locked: false,
        wiki: false,
        is_anonymous: false,
        approved: true,
        endorsed: false,
        added_at: Utc::now(),
        last_edited_at: None,
        last_edited_by: None,
    }
}

pub fn thread(id: i64, title: &str) -> Thread {
    Thread {
        id,
        title: title.to_string(),
        tagnames: "rust sqlite".to_string(),
        view_count: 0,
        favourite_count: 0,
        answer_count: 0,
        last_activity_at: Utc::now(),
        last_activity_by: 1,
        language_code: "en".to_string(),
        closed: false,
        closed_by: None,
        closed_at: None,
        close_reason: None,
        accepted_answer_id: None,
        approved: true,
        added_at: Utc::now(),
    }
}
