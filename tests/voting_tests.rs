// tests/voting_tests.rs

mod common;

use common::spawn_app;
use serde_json::{Value, json};

#[tokio::test]
async fn upvotes_need_reputation_and_not_own_posts() {
    let app = spawn_app().await;
    let author = app.register("author").await;
    let voter = app.register("voter").await;

    let question = app.ask(&author, "Is this worth a vote", &["meta"]).await;
    let path = format!("/api/posts/{}/vote", question["id"]);

    let too_new = app
        .post(&path, Some(&voter.token), json!({ "direction": "up" }))
        .await;
    assert_eq!(too_new.status().as_u16(), 403);

    let own = app
        .post(&path, Some(&author.token), json!({ "direction": "up" }))
        .await;
    assert_eq!(own.status().as_u16(), 403);

    let anonymous = app.post(&path, None, json!({ "direction": "up" })).await;
    assert_eq!(anonymous.status().as_u16(), 401);
}

#[tokio::test]
async fn upvote_then_cancel() {
    let app = spawn_app().await;
    let author = app.register("author").await;
    let voter = app.register("voter").await;
    app.set_reputation(voter.id, 10).await;

    let question = app.ask(&author, "Is this worth a vote", &["meta"]).await;
    let path = format!("/api/posts/{}/vote", question["id"]);

    let response = app
        .post(&path, Some(&voter.token), json!({ "direction": "up" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["score"], 1);
    assert_eq!(body["vote"], "up");
    assert_eq!(body["votes_left_today"], 29);
    assert_eq!(app.reputation_of(author.id).await, 11);

    let cancelled: Value = app
        .post(&path, Some(&voter.token), json!({ "direction": "up" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(cancelled["score"], 0);
    assert_eq!(cancelled["vote"], Value::Null);
    assert_eq!(cancelled["votes_left_today"], 30);
    assert_eq!(app.reputation_of(author.id).await, 1);

    let (cancel_activities,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM activities WHERE activity_type = 11 AND user_id = ?",
    )
    .bind(voter.id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(cancel_activities, 1);
}

#[tokio::test]
async fn downvotes_cost_the_voter() {
    let app = spawn_app().await;
    let author = app.register("author").await;
    let voter = app.register("voter").await;
    app.set_reputation(voter.id, 10).await;
    app.set_reputation(author.id, 20).await;

    let question = app.ask(&author, "A rather poor question", &["meta"]).await;
    let path = format!("/api/posts/{}/vote", question["id"]);

    let not_enough = app
        .post(&path, Some(&voter.token), json!({ "direction": "down" }))
        .await;
    assert_eq!(not_enough.status().as_u16(), 403);

    app.set_reputation(voter.id, 50).await;
    let body: Value = app
        .post(&path, Some(&voter.token), json!({ "direction": "down" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["score"], -1);
    assert_eq!(body["vote"], "down");
    assert_eq!(app.reputation_of(author.id).await, 19);
    assert_eq!(app.reputation_of(voter.id).await, 48);

    // Switching direction replaces the downvote.
    let switched: Value = app
        .post(&path, Some(&voter.token), json!({ "direction": "up" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(switched["score"], 1);
    assert_eq!(switched["vote"], "up");
    assert_eq!(app.reputation_of(author.id).await, 31);
    assert_eq!(app.reputation_of(voter.id).await, 49);
}

#[tokio::test]
async fn reputation_never_drops_below_one() {
    let app = spawn_app().await;
    let author = app.register("author").await;
    let voter = app.register("voter").await;
    app.set_reputation(voter.id, 60).await;

    let question = app.ask(&author, "Another poor question", &["meta"]).await;
    app.post(
        &format!("/api/posts/{}/vote", question["id"]),
        Some(&voter.token),
        json!({ "direction": "down" }),
    )
    .await;
    assert_eq!(app.reputation_of(author.id).await, 1);
}

#[tokio::test]
async fn comments_are_voted_up_only_without_reputation() {
    let app = spawn_app().await;
    let author = app.register("author").await;
    let voter = app.register("voter").await;
    app.set_reputation(voter.id, 100).await;

    let question = app.ask(&author, "Comment voting question", &["meta"]).await;
    let comment: Value = app
        .post(
            &format!("/api/posts/{}/comments", question["id"]),
            Some(&author.token),
            json!({ "text": "A helpful remark" }),
        )
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/api/posts/{}/vote", comment["id"]);

    let down = app
        .post(&path, Some(&voter.token), json!({ "direction": "down" }))
        .await;
    assert_eq!(down.status().as_u16(), 400);

    let up: Value = app
        .post(&path, Some(&voter.token), json!({ "direction": "up" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(up["score"], 1);
    assert_eq!(app.reputation_of(author.id).await, 1);
}

#[tokio::test]
async fn votes_show_on_the_voters_profile() {
    let app = spawn_app().await;
    let author = app.register("author").await;
    let voter = app.register("voter").await;
    app.set_reputation(voter.id, 10).await;

    let question = app.ask(&author, "Which votes did I cast", &["meta"]).await;
    app.post(
        &format!("/api/posts/{}/vote", question["id"]),
        Some(&voter.token),
        json!({ "direction": "up" }),
    )
    .await;

    let mine = app
        .get(&format!("/api/users/{}/votes", voter.id), Some(&voter.token))
        .await;
    assert_eq!(mine.status().as_u16(), 200);
    let votes: Value = mine.json().await.unwrap();
    assert_eq!(votes.as_array().unwrap().len(), 1);

    let peeking = app
        .get(&format!("/api/users/{}/votes", voter.id), Some(&author.token))
        .await;
    assert_eq!(peeking.status().as_u16(), 403);
}
