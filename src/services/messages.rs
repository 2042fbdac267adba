//! One-shot notices for a user, popped when read.

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::models::message::UserMessage;

pub async fn create_message(
    conn: &mut SqliteConnection,
    user_id: i64,
    message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO user_messages (user_id, message, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(message)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns the queued messages oldest first and removes them.
pub async fn get_and_delete_messages(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<UserMessage>, sqlx::Error> {
    let messages = sqlx::query_as::<_, UserMessage>(
        "SELECT * FROM user_messages WHERE user_id = ? ORDER BY created_at, id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    if let Some(last) = messages.last() {
        sqlx::query("DELETE FROM user_messages WHERE user_id = ? AND id <= ?")
            .bind(user_id)
            .bind(last.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(messages)
}
