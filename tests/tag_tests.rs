// tests/tag_tests.rs

mod common;

use common::spawn_app;
use serde_json::{Value, json};

#[tokio::test]
async fn tags_are_listed_by_usage_and_name() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    app.ask(&asker, "Question about async rust", &["rust", "async"]).await;
    app.ask(&asker, "Question about rust traits", &["rust"]).await;

    let by_usage: Value = app.get("/api/tags", None).await.json().await.unwrap();
    assert_eq!(by_usage[0]["name"], "rust");
    assert_eq!(by_usage[0]["used_count"], 2);

    let by_name: Value = app.get("/api/tags?sort=name", None).await.json().await.unwrap();
    assert_eq!(by_name[0]["name"], "async");

    let filtered: Value = app.get("/api/tags?query=asy", None).await.json().await.unwrap();
    assert_eq!(filtered.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn retagging_moves_usage_counts() {
    let app = spawn_app().await;
    let asker = app.register("asker").await;
    let question = app.ask(&asker, "Which tag fits best", &["python"]).await;

    let retagged = app
        .put(
            &format!("/api/questions/{}/tags", question["id"]),
            Some(&asker.token),
            json!({ "tags": ["rust", "ffi"] }),
        )
        .await;
    assert_eq!(retagged.status().as_u16(), 200);
    let thread: Value = retagged.json().await.unwrap();
    assert_eq!(thread["tagnames"], "rust ffi");

    let tags: Value = app.get("/api/tags?sort=name", None).await.json().await.unwrap();
    let python = tags
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "python")
        .unwrap();
    assert_eq!(python["used_count"], 0);
}

#[tokio::test]
async fn marking_tags_and_wildcards() {
    let app = spawn_app().await;
    let user = app.register("user").await;

    let marked: Value = app
        .post(
            "/api/tags/marked",
            Some(&user.token),
            json!({ "tags": ["rust", "py*"], "reason": "good", "action": "add" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(marked["good"], json!(["rust", "py*"]));

    let ignored: Value = app
        .post(
            "/api/tags/marked",
            Some(&user.token),
            json!({ "tags": ["rust"], "reason": "bad", "action": "add" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(ignored["good"], json!(["py*"]));
    assert_eq!(ignored["bad"], json!(["rust"]));

    let removed: Value = app
        .post(
            "/api/tags/marked",
            Some(&user.token),
            json!({ "tags": ["py*"], "reason": "good", "action": "remove" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(removed["good"], json!([]));

    let current: Value = app
        .get("/api/tags/marked", Some(&user.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(current["bad"], json!(["rust"]));

    let invalid = app
        .post(
            "/api/tags/marked",
            Some(&user.token),
            json!({ "tags": ["no spaces/slashes"], "reason": "good", "action": "add" }),
        )
        .await;
    assert_eq!(invalid.status().as_u16(), 400);
}

#[tokio::test]
async fn badge_awards_queue_a_message() {
    let app = spawn_app().await;
    let author = app.register("author").await;
    let voter = app.register("voter").await;
    app.set_reputation(voter.id, 10).await;

    let question = app.ask(&author, "Please upvote this one", &["meta"]).await;
    app.post(
        &format!("/api/posts/{}/vote", question["id"]),
        Some(&voter.token),
        json!({ "direction": "up" }),
    )
    .await;

    let messages: Value = app
        .get("/api/messages", Some(&voter.token))
        .await
        .json()
        .await
        .unwrap();
    let texts: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert!(texts.iter().any(|t| t.contains("Supporter")));

    let again: Value = app
        .get("/api/messages", Some(&voter.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(again.as_array().unwrap().len(), 0);

    let catalog: Value = app.get("/api/badges", None).await.json().await.unwrap();
    let supporter = catalog
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["slug"] == "supporter")
        .unwrap();
    assert_eq!(supporter["awarded_count"], 1);
}
