// tests/question_tests.rs

mod common;

use common::spawn_app;
use serde_json::{Value, json};

#[tokio::test]
async fn asking_and_viewing_a_question() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;

    let question = app.ask(&asker, "How do lifetimes work", &["Rust", "borrowck"]).await;
    let question_id = question["id"].as_i64().unwrap();
    assert_eq!(question["post_type"], "question");

    let response = app.get(&format!("/api/questions/{}", question_id), None).await;
    assert_eq!(response.status().as_u16(), 200);
    let view: Value = response.json().await.unwrap();
    assert_eq!(view["thread"]["title"], "How do lifetimes work");
    assert_eq!(view["thread"]["tagnames"], "rust borrowck");
    assert_eq!(view["thread"]["view_count"], 1);
    assert_eq!(view["answers"].as_array().unwrap().len(), 0);

    let again: Value = app
        .get(&format!("/api/questions/{}", question_id), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(again["thread"]["view_count"], 2);

    let (revisions,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM post_revisions WHERE post_id = ?")
            .bind(question_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(revisions, 1);
}

#[tokio::test]
async fn ask_validates_tags() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;

    let too_many = app
        .post(
            "/api/questions",
            Some(&asker.token),
            json!({
                "title": "A question with many tags",
                "text": "Body text that is long enough",
                "tags": ["a", "b", "c", "d", "e", "f"],
            }),
        )
        .await;
    assert_eq!(too_many.status().as_u16(), 400);

    let bad_chars = app
        .post(
            "/api/questions",
            Some(&asker.token),
            json!({
                "title": "A question with a bad tag",
                "text": "Body text that is long enough",
                "tags": ["no/slashes"],
            }),
        )
        .await;
    assert_eq!(bad_chars.status().as_u16(), 400);
}

#[tokio::test]
async fn answering_notifies_the_asker() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    let answerer = app.register("answerer").await;

    let question = app.ask(&asker, "Why is the sky blue", &["physics"]).await;
    let question_id = question["id"].as_i64().unwrap();
    app.answer(&answerer, question_id, "Because of Rayleigh scattering.").await;

    let asker_email = format!("{}@example.org", asker.username);
    let notifications: Vec<_> = app
        .mailer
        .sent()
        .into_iter()
        .filter(|m| m.to == asker_email && m.subject != "Welcome to Askbot")
        .collect();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].subject, "\"Why is the sky blue\"");
    assert!(notifications[0].body.contains("Rayleigh scattering"));
    assert_eq!(
        notifications[0].headers.in_reply_to.as_deref(),
        Some(format!("<question-{}@ask.example.org>", question_id).as_str())
    );

    let answerer_email = format!("{}@example.org", answerer.username);
    assert!(
        app.mailer
            .sent()
            .iter()
            .all(|m| m.to != answerer_email || m.subject == "Welcome to Askbot")
    );

    let (email_sent,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM activities WHERE activity_type = 18 AND user_id = ?",
    )
    .bind(asker.id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(email_sent, 1);
}

#[tokio::test]
async fn one_answer_per_user() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    let answerer = app.register("answerer").await;

    let question = app.ask(&asker, "Which editor should I use", &["tools"]).await;
    let question_id = question["id"].as_i64().unwrap();
    app.answer(&answerer, question_id, "Any editor with a language server.").await;

    let second = app
        .post(
            &format!("/api/questions/{}/answers", question_id),
            Some(&answerer.token),
            json!({ "text": "Another answer from the same user." }),
        )
        .await;
    assert_eq!(second.status().as_u16(), 403);
}

#[tokio::test]
async fn listing_filters_by_scope_and_tag() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    let answerer = app.register("answerer").await;

    let answered = app.ask(&asker, "First question about rust", &["rust"]).await;
    app.ask(&asker, "Second question about python", &["python"]).await;
    app.answer(&answerer, answered["id"].as_i64().unwrap(), "An answer that is long enough.")
        .await;

    let all: Value = app.get("/api/questions", None).await.json().await.unwrap();
    assert_eq!(all["paginator"]["total"], 2);

    let unanswered: Value = app
        .get("/api/questions?scope=unanswered", None)
        .await
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = unanswered["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Second question about python"]);

    let tagged: Value = app.get("/api/questions?tags=rust", None).await.json().await.unwrap();
    assert_eq!(tagged["questions"].as_array().unwrap().len(), 1);
    assert_eq!(tagged["questions"][0]["title"], "First question about rust");
}

#[tokio::test]
async fn comments_need_reputation_unless_on_own_posts() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    let answerer = app.register("answerer").await;
    let bystander = app.register("bystander").await;

    let question = app.ask(&asker, "How to write a comment", &["meta"]).await;
    let answer = app
        .answer(&answerer, question["id"].as_i64().unwrap(), "Write it below the post.")
        .await;
    let answer_id = answer["id"].as_i64().unwrap();

    let own = app
        .post(
            &format!("/api/posts/{}/comments", answer_id),
            Some(&answerer.token),
            json!({ "text": "Clarifying my own answer" }),
        )
        .await;
    assert_eq!(own.status().as_u16(), 201);

    let denied = app
        .post(
            &format!("/api/posts/{}/comments", answer_id),
            Some(&bystander.token),
            json!({ "text": "Drive-by comment" }),
        )
        .await;
    assert_eq!(denied.status().as_u16(), 403);

    app.set_reputation(bystander.id, 10).await;
    let allowed = app
        .post(
            &format!("/api/posts/{}/comments", answer_id),
            Some(&bystander.token),
            json!({ "text": "Now with enough karma" }),
        )
        .await;
    assert_eq!(allowed.status().as_u16(), 201);

    let (comment_count,): (i64,) = sqlx::query_as("SELECT comment_count FROM posts WHERE id = ?")
        .bind(answer_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(comment_count, 2);
}

#[tokio::test]
async fn editing_adds_revisions() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;

    let question = app.ask(&asker, "What is a revision", &["meta"]).await;
    let question_id = question["id"].as_i64().unwrap();

    let edited = app
        .put(
            &format!("/api/posts/{}", question_id),
            Some(&asker.token),
            json!({ "text": "Updated body with more detail", "summary": "clarified" }),
        )
        .await;
    assert_eq!(edited.status().as_u16(), 200);

    let revisions: Value = app
        .get(&format!("/api/posts/{}/revisions", question_id), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(revisions.as_array().unwrap().len(), 2);

    let stranger = app.register("stranger").await;
    let denied = app
        .put(
            &format!("/api/posts/{}", question_id),
            Some(&stranger.token),
            json!({ "text": "Vandalism attempt here", "summary": "" }),
        )
        .await;
    assert_eq!(denied.status().as_u16(), 403);
}

#[tokio::test]
async fn accepting_an_answer_moves_reputation() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    let answerer = app.register("answerer").await;

    let question = app.ask(&asker, "Which answer is best", &["meta"]).await;
    let answer = app
        .answer(&answerer, question["id"].as_i64().unwrap(), "This one, obviously.")
        .await;
    let answer_id = answer["id"].as_i64().unwrap();

    let stranger_try = app
        .post(&format!("/api/posts/{}/accept", answer_id), Some(&answerer.token), json!({}))
        .await;
    assert_eq!(stranger_try.status().as_u16(), 403);

    let response = app
        .post(&format!("/api/posts/{}/accept", answer_id), Some(&asker.token), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["accepted_answer_id"], answer_id);

    assert_eq!(app.reputation_of(answerer.id).await, 16);
    assert_eq!(app.reputation_of(asker.id).await, 3);

    let view: Value = app
        .get(&format!("/api/questions/{}", question["id"]), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["thread"]["accepted_answer_id"], answer_id);
}

#[tokio::test]
async fn deleted_answers_are_hidden_from_others() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    let answerer = app.register("answerer").await;

    let question = app.ask(&asker, "Will this answer stay", &["meta"]).await;
    let question_id = question["id"].as_i64().unwrap();
    let answer = app.answer(&answerer, question_id, "Not for long, it seems.").await;

    let deleted = app
        .delete(&format!("/api/posts/{}", answer["id"]), Some(&answerer.token))
        .await;
    assert_eq!(deleted.status().as_u16(), 200);

    let public: Value = app
        .get(&format!("/api/questions/{}", question_id), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(public["answers"].as_array().unwrap().len(), 0);
    assert_eq!(public["thread"]["answer_count"], 0);

    let author_view: Value = app
        .get(&format!("/api/questions/{}", question_id), Some(&answerer.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(author_view["answers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn favorites_toggle() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    let fan = app.register("fan").await;

    let question = app.ask(&asker, "A question worth saving", &["meta"]).await;
    let path = format!("/api/questions/{}/favorite", question["id"]);

    let on: Value = app.post(&path, Some(&fan.token), json!({})).await.json().await.unwrap();
    assert_eq!(on["is_favorite"], true);
    assert_eq!(on["favourite_count"], 1);

    let favorites: Value = app
        .get(&format!("/api/users/{}/favorites", fan.id), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(favorites.as_array().unwrap().len(), 1);

    let off: Value = app.post(&path, Some(&fan.token), json!({})).await.json().await.unwrap();
    assert_eq!(off["is_favorite"], false);
    assert_eq!(off["favourite_count"], 0);
}

#[tokio::test]
async fn closing_needs_reputation_and_blocks_answers() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    let moderator = app.register("mod").await;
    let answerer = app.register("answerer").await;
    app.set_status(moderator.id, "m").await;

    let question = app.ask(&asker, "Is this on topic here", &["meta"]).await;
    let question_id = question["id"].as_i64().unwrap();

    let own_close = app
        .post(
            &format!("/api/questions/{}/close", question_id),
            Some(&asker.token),
            json!({ "reason": "duplicate" }),
        )
        .await;
    assert_eq!(own_close.status().as_u16(), 403);

    let closed = app
        .post(
            &format!("/api/questions/{}/close", question_id),
            Some(&moderator.token),
            json!({ "reason": "off topic" }),
        )
        .await;
    assert_eq!(closed.status().as_u16(), 200);
    let thread: Value = closed.json().await.unwrap();
    assert_eq!(thread["closed"], true);

    let answer = app
        .post(
            &format!("/api/questions/{}/answers", question_id),
            Some(&answerer.token),
            json!({ "text": "Too late to answer this." }),
        )
        .await;
    assert_eq!(answer.status().as_u16(), 403);

    let reopened = app
        .post(
            &format!("/api/questions/{}/reopen", question_id),
            Some(&moderator.token),
            json!({}),
        )
        .await;
    assert_eq!(reopened.status().as_u16(), 200);
}

#[tokio::test]
async fn flags_reach_moderators() {
    let app = spawn_app().await;
    let author = app.register("author").await;
    let flagger = app.register("flagger").await;
    let moderator = app.register("mod").await;
    app.set_status(moderator.id, "m").await;
    app.set_reputation(flagger.id, 5).await;

    let question = app.ask(&author, "Something rude in here", &["meta"]).await;
    let question_id = question["id"].as_i64().unwrap();

    let flagged = app
        .post(&format!("/api/posts/{}/flag", question_id), Some(&flagger.token), json!({}))
        .await;
    assert_eq!(flagged.status().as_u16(), 200);
    let post: Value = flagged.json().await.unwrap();
    assert_eq!(post["offensive_flag_count"], 1);

    let twice = app
        .post(&format!("/api/posts/{}/flag", question_id), Some(&flagger.token), json!({}))
        .await;
    assert_eq!(twice.status().as_u16(), 403);

    let inbox: Value = app
        .get(
            &format!("/api/users/{}/inbox?section=flags", moderator.id),
            Some(&moderator.token),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(inbox["responses"].as_array().unwrap().len(), 1);

    let unflagged = app
        .delete(&format!("/api/posts/{}/flag", question_id), Some(&flagger.token))
        .await;
    assert_eq!(unflagged.status().as_u16(), 200);
    let post: Value = unflagged.json().await.unwrap();
    assert_eq!(post["offensive_flag_count"], 0);
}

#[tokio::test]
async fn moderated_posts_wait_for_approval() {
    let mut forum = askbot::config::ForumSettings::default();
    forum.enable_content_moderation = true;
    let app = common::spawn_app_with(forum).await;

    let watched = app.register("watched").await;
    let moderator = app.register("mod").await;
    app.set_status(moderator.id, "m").await;

    let question = app.ask(&watched, "Held for moderation", &["meta"]).await;
    let question_id = question["id"].as_i64().unwrap();
    assert_eq!(question["approved"], false);

    let listing: Value = app.get("/api/questions", None).await.json().await.unwrap();
    assert_eq!(listing["paginator"]["total"], 0);

    let approved = app
        .post(&format!("/api/posts/{}/approve", question_id), Some(&moderator.token), json!({}))
        .await;
    assert_eq!(approved.status().as_u16(), 200);

    let listing: Value = app.get("/api/questions", None).await.json().await.unwrap();
    assert_eq!(listing["paginator"]["total"], 1);

    let author_email = format!("{}@example.org", watched.username);
    assert!(
        app.mailer
            .sent()
            .iter()
            .any(|m| m.to == author_email && m.subject.contains("was published"))
    );
}
