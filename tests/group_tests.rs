// tests/group_tests.rs

mod common;

use askbot::config::ForumSettings;
use common::{spawn_app, spawn_app_with};
use serde_json::{Value, json};

#[tokio::test]
async fn only_moderators_create_groups() {
    let app = spawn_app().await;
    let member = app.register("member").await;

    let response = app
        .post("/api/groups", Some(&member.token), json!({ "name": "Rustaceans" }))
        .await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn open_groups_accept_members_directly() {
    let app = spawn_app().await;
    let moderator = app.register("mod").await;
    let member = app.register("member").await;
    app.set_status(moderator.id, "m").await;

    let created = app
        .post(
            "/api/groups",
            Some(&moderator.token),
            json!({ "name": "Data Science", "description": "Numbers", "is_open": true }),
        )
        .await;
    assert_eq!(created.status().as_u16(), 201);
    let group: Value = created.json().await.unwrap();
    let group_id = group["id"].as_i64().unwrap();

    let joined: Value = app
        .post(&format!("/api/groups/{}/join", group_id), Some(&member.token), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(joined["is_member"], true);
    assert_eq!(joined["is_pending"], false);

    let page: Value = app
        .get(&format!("/api/groups/{}/data-science", group_id), Some(&member.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["members"].as_array().unwrap().len(), 1);
    assert_eq!(page["members"][0]["username"], member.username.as_str());
    assert_eq!(page["membership"]["is_member"], true);

    let mine: Value = app
        .get("/api/groups?sort=my-groups", Some(&member.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let left: Value = app
        .post(&format!("/api/groups/{}/leave", group_id), Some(&member.token), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(left["is_member"], false);
    assert_eq!(left["can_join"], true);
}

#[tokio::test]
async fn closed_groups_need_approval() {
    let app = spawn_app().await;
    let moderator = app.register("mod").await;
    let member = app.register("member").await;
    app.set_status(moderator.id, "m").await;

    let group: Value = app
        .post(
            "/api/groups",
            Some(&moderator.token),
            json!({ "name": "Core Team", "is_open": false }),
        )
        .await
        .json()
        .await
        .unwrap();
    let group_id = group["id"].as_i64().unwrap();

    let requested: Value = app
        .post(&format!("/api/groups/{}/join", group_id), Some(&member.token), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(requested["is_member"], false);
    assert_eq!(requested["is_pending"], true);

    let (requests,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM activity_audit_status s JOIN activities a ON a.id = s.activity_id
        WHERE a.activity_type = 30 AND s.user_id = ?
        "#,
    )
    .bind(moderator.id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(requests, 1);

    let by_member = app
        .post(
            &format!("/api/groups/{}/members/{}/approve", group_id, member.id),
            Some(&member.token),
            json!({}),
        )
        .await;
    assert_eq!(by_member.status().as_u16(), 403);

    let approved = app
        .post(
            &format!("/api/groups/{}/members/{}/approve", group_id, member.id),
            Some(&moderator.token),
            json!({}),
        )
        .await;
    assert_eq!(approved.status().as_u16(), 204);

    let page: Value = app
        .get(&format!("/api/groups/{}/core-team", group_id), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["members"].as_array().unwrap().len(), 1);
    assert_eq!(page["membership"], Value::Null);
}

#[tokio::test]
async fn preapproved_domains_skip_approval() {
    let app = spawn_app().await;
    let moderator = app.register("mod").await;
    let member = app.register("member").await;
    app.set_status(moderator.id, "m").await;

    let group: Value = app
        .post(
            "/api/groups",
            Some(&moderator.token),
            json!({ "name": "Staff", "preapproved_email_domains": "@example.org" }),
        )
        .await
        .json()
        .await
        .unwrap();

    let joined: Value = app
        .post(&format!("/api/groups/{}/join", group["id"]), Some(&member.token), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(joined["is_member"], true);
}

#[tokio::test]
async fn stale_group_slugs_redirect() {
    let app = spawn_app().await;
    let moderator = app.register("mod").await;
    app.set_status(moderator.id, "m").await;

    let group: Value = app
        .post("/api/groups", Some(&moderator.token), json!({ "name": "Web Developers" }))
        .await
        .json()
        .await
        .unwrap();
    let group_id = group["id"].as_i64().unwrap();

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client
        .get(app.url(&format!("/api/groups/{}/old-name", group_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 308);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        format!("/api/groups/{}/web-developers", group_id)
    );
}

#[tokio::test]
async fn groups_can_be_disabled() {
    let forum = ForumSettings {
        groups_enabled: false,
        ..ForumSettings::default()
    };
    let app = spawn_app_with(forum).await;

    let response = app.get("/api/groups", None).await;
    assert_eq!(response.status().as_u16(), 404);
}
