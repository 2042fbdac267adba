// tests/admin_tests.rs

mod common;

use common::{TestApp, TestUser, spawn_app};
use serde_json::{Value, json};

async fn admin(app: &TestApp) -> TestUser {
    let mut admin = app.register("admin").await;
    app.set_status(admin.id, "d").await;
    admin.token = app.login(&admin.username).await;
    admin
}

#[tokio::test]
async fn admin_area_needs_the_admin_role() {
    let app = spawn_app().await;
    let member = app.register("member").await;

    let anonymous = app.get("/api/admin/users", None).await;
    assert_eq!(anonymous.status().as_u16(), 401);

    let forbidden = app.get("/api/admin/users", Some(&member.token)).await;
    assert_eq!(forbidden.status().as_u16(), 403);

    let moderator = app.register("mod").await;
    app.set_status(moderator.id, "m").await;
    let token = app.login(&moderator.username).await;
    let still_forbidden = app.get("/api/admin/users", Some(&token)).await;
    assert_eq!(still_forbidden.status().as_u16(), 403);

    let admin = admin(&app).await;
    let allowed = app.get("/api/admin/users", Some(&admin.token)).await;
    assert_eq!(allowed.status().as_u16(), 200);
    let users: Value = allowed.json().await.unwrap();
    assert_eq!(users.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn feed_settings_filter_and_update() {
    let app = spawn_app().await;
    let admin = admin(&app).await;
    let member = app.register("member").await;

    let all: Value = app
        .get("/api/admin/feed-settings", Some(&admin.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 10);

    let weekly: Value = app
        .get(
            &format!("/api/admin/feed-settings?frequency=w&search={}", member.username),
            Some(&admin.token),
        )
        .await
        .json()
        .await
        .unwrap();
    let weekly = weekly.as_array().unwrap();
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly[0]["feed_type"], "q_all");
    assert_eq!(weekly[0]["subscriber"], member.username.as_str());
    let setting_id = weekly[0]["id"].as_i64().unwrap();

    let bad_filter = app
        .get("/api/admin/feed-settings?feed_type=bogus", Some(&admin.token))
        .await;
    assert_eq!(bad_filter.status().as_u16(), 400);

    let updated = app
        .put(
            &format!("/api/admin/feed-settings/{}", setting_id),
            Some(&admin.token),
            json!({ "frequency": "n" }),
        )
        .await;
    assert_eq!(updated.status().as_u16(), 200);

    let never: Value = app
        .get(
            &format!("/api/admin/feed-settings?frequency=n&search={}", member.username),
            Some(&admin.token),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(never.as_array().unwrap().len(), 1);

    let missing = app
        .put(
            "/api/admin/feed-settings/99999",
            Some(&admin.token),
            json!({ "frequency": "d" }),
        )
        .await;
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn threads_can_be_searched_and_filtered() {
    let app = spawn_app().await;
    let admin = admin(&app).await;
    let asker = app.register("asker").await;

    app.ask(&asker, "Borrow checker puzzles", &["rust"]).await;
    let closed = app.ask(&asker, "Garbage collection tuning", &["jvm"]).await;
    app.post(
        &format!("/api/questions/{}/close", closed["id"]),
        Some(&admin.token),
        json!({ "reason": "off topic" }),
    )
    .await;

    let found: Value = app
        .get("/api/admin/threads?search=borrow", Some(&admin.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["title"], "Borrow checker puzzles");

    let closed_only: Value = app
        .get("/api/admin/threads?closed=true", Some(&admin.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(closed_only.as_array().unwrap().len(), 1);
    assert_eq!(closed_only[0]["title"], "Garbage collection tuning");

    let tags: Value = app
        .get("/api/admin/tags", Some(&admin.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(tags.as_array().unwrap().len(), 2);

    let revisions: Value = app
        .get("/api/admin/revisions", Some(&admin.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(revisions.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn reject_reasons_are_recorded() {
    let app = spawn_app().await;
    let admin = admin(&app).await;

    let created = app
        .post(
            "/api/admin/reject-reasons",
            Some(&admin.token),
            json!({ "title": "Spam", "details": "Advertising is not allowed." }),
        )
        .await;
    assert_eq!(created.status().as_u16(), 201);
    let reason: Value = created.json().await.unwrap();
    assert_eq!(reason["author_id"], admin.id);

    let reasons: Value = app
        .get("/api/admin/reject-reasons", Some(&admin.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(reasons.as_array().unwrap().len(), 1);

    let (recorded,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM activities WHERE activity_type = 26 AND user_id = ? AND object_id = ?",
    )
    .bind(admin.id)
    .bind(reason["id"].as_i64().unwrap())
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(recorded, 1);
}

#[tokio::test]
async fn admins_manage_accounts() {
    let app = spawn_app().await;
    let admin = admin(&app).await;

    let created = app
        .post(
            "/api/admin/users",
            Some(&admin.token),
            json!({
                "username": "staff_writer",
                "email": "staff@example.org",
                "password": "password123",
                "status": "m",
            }),
        )
        .await;
    assert_eq!(created.status().as_u16(), 201);
    let id = created.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    let duplicate = app
        .post(
            "/api/admin/users",
            Some(&admin.token),
            json!({
                "username": "staff_writer",
                "email": "other@example.org",
                "password": "password123",
            }),
        )
        .await;
    assert_eq!(duplicate.status().as_u16(), 409);

    let token = app.login("staff_writer").await;
    assert!(!token.is_empty());

    let updated = app
        .put(
            &format!("/api/admin/users/{}", id),
            Some(&admin.token),
            json!({ "status": "a", "email": "staff2@example.org" }),
        )
        .await;
    assert_eq!(updated.status().as_u16(), 200);
    let (status, email): (String, String) =
        sqlx::query_as("SELECT status, email FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(status, "a");
    assert_eq!(email, "staff2@example.org");

    for invalid in [
        json!({ "username": "ab" }),
        json!({ "password": "abc" }),
        json!({ "email": "not-an-email" }),
    ] {
        let rejected = app
            .put(&format!("/api/admin/users/{}", id), Some(&admin.token), invalid)
            .await;
        assert_eq!(rejected.status().as_u16(), 400);
    }
    let (username,): (String,) = sqlx::query_as("SELECT username FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(username, "staff_writer");

    let delete_self = app
        .delete(&format!("/api/admin/users/{}", admin.id), Some(&admin.token))
        .await;
    assert_eq!(delete_self.status().as_u16(), 400);

    let fresh = app
        .post(
            "/api/admin/users",
            Some(&admin.token),
            json!({
                "username": "short_lived",
                "email": "gone@example.org",
                "password": "password123",
            }),
        )
        .await;
    let fresh_id = fresh.json::<Value>().await.unwrap()["id"].as_i64().unwrap();
    let deleted = app
        .delete(&format!("/api/admin/users/{}", fresh_id), Some(&admin.token))
        .await;
    assert_eq!(deleted.status().as_u16(), 204);

    let missing = app
        .delete(&format!("/api/admin/users/{}", fresh_id), Some(&admin.token))
        .await;
    assert_eq!(missing.status().as_u16(), 404);
}
