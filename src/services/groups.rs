//! User groups and memberships.

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::error::{AppError, is_unique_violation};
use crate::models::{
    activity::{ActivityType, ContentType},
    group::{
        CreateGroupRequest, Group, GroupMembership, MEMBERSHIP_FULL, MEMBERSHIP_PENDING,
        MembershipInfo,
    },
    user::{User, UserCard},
};
use crate::services::{
    activity::{self, NewActivity},
    permissions,
};

/// Whether `email` may join `group` without a moderator's approval.
pub fn can_join_without_approval(group: &Group, email: &str) -> bool {
    if group.is_open {
        return true;
    }
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return false;
    }
    if group
        .preapproved_emails
        .split_whitespace()
        .any(|e| e.to_lowercase() == email)
    {
        return true;
    }
    match email.rsplit_once('@') {
        Some((_, domain)) => group
            .preapproved_email_domains
            .split_whitespace()
            .any(|d| d.trim_start_matches('@').to_lowercase() == domain),
        None => false,
    }
}

pub fn membership_info(
    group: &Group,
    membership: Option<&GroupMembership>,
    user: &User,
) -> MembershipInfo {
    match membership {
        Some(m) => MembershipInfo {
            is_member: m.level == MEMBERSHIP_FULL,
            is_pending: m.level == MEMBERSHIP_PENDING,
            can_join: false,
        },
        None => MembershipInfo {
            is_member: false,
            is_pending: false,
            can_join: can_join_without_approval(group, &user.email),
        },
    }
}

#[derive(Debug, Serialize)]
pub struct GroupEntry {
    #[serde(flatten)]
    pub group: Group,
    /// Only for authenticated viewers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership: Option<MembershipInfo>,
}

pub async fn load_group(conn: &mut SqliteConnection, group_id: i64) -> Result<Group, AppError> {
    sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = ?")
        .bind(group_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))
}

pub async fn membership(
    conn: &mut SqliteConnection,
    user_id: i64,
    group_id: i64,
) -> Result<Option<GroupMembership>, sqlx::Error> {
    sqlx::query_as::<_, GroupMembership>(
        "SELECT * FROM group_memberships WHERE user_id = ? AND group_id = ?",
    )
    .bind(user_id)
    .bind(group_id)
    .fetch_optional(&mut *conn)
    .await
}

/// `all-groups` (default) or `my-groups`; the latter needs a viewer.
pub async fn list_groups(
    conn: &mut SqliteConnection,
    viewer: Option<&User>,
    scope: Option<&str>,
) -> Result<Vec<GroupEntry>, AppError> {
    let groups = match (scope, viewer) {
        (Some("my-groups"), Some(user)) => {
            sqlx::query_as::<_, Group>(
                r#"
                SELECT g.* FROM groups g JOIN group_memberships m ON m.group_id = g.id
                WHERE m.user_id = ? ORDER BY g.name
                "#,
            )
            .bind(user.id)
            .fetch_all(&mut *conn)
            .await?
        }
        (Some("my-groups"), None) => {
            return Err(AppError::AuthError("Please log in to see your groups".to_string()));
        }
        _ => {
            sqlx::query_as::<_, Group>("SELECT * FROM groups ORDER BY name")
                .fetch_all(&mut *conn)
                .await?
        }
    };

    let memberships: Vec<GroupMembership> = match viewer {
        Some(user) => {
            sqlx::query_as::<_, GroupMembership>(
                "SELECT * FROM group_memberships WHERE user_id = ?",
            )
            .bind(user.id)
            .fetch_all(&mut *conn)
            .await?
        }
        None => Vec::new(),
    };

    Ok(groups
        .into_iter()
        .map(|group| {
            let membership = viewer.map(|user| {
                let m = memberships.iter().find(|m| m.group_id == group.id);
                membership_info(&group, m, user)
            });
            GroupEntry { group, membership }
        })
        .collect())
}

/// Full members, by reputation.
pub async fn group_members(
    conn: &mut SqliteConnection,
    group_id: i64,
) -> Result<Vec<UserCard>, sqlx::Error> {
    sqlx::query_as::<_, UserCard>(
        r#"
        SELECT u.id, u.username, u.status, u.reputation, u.gold, u.silver, u.bronze,
               u.location, u.date_joined
        FROM users u JOIN group_memberships m ON m.user_id = u.id
        WHERE m.group_id = ? AND m.level = ?
        ORDER BY u.reputation DESC, u.id ASC
        "#,
    )
    .bind(group_id)
    .bind(MEMBERSHIP_FULL)
    .fetch_all(&mut *conn)
    .await
}

/// Groups the user belongs to, pending requests included.
pub async fn user_groups(
    conn: &mut SqliteConnection,
    user: &User,
) -> Result<Vec<GroupEntry>, sqlx::Error> {
    let rows: Vec<Group> = sqlx::query_as::<_, Group>(
        r#"
        SELECT g.* FROM groups g JOIN group_memberships m ON m.group_id = g.id
        WHERE m.user_id = ? ORDER BY g.name
        "#,
    )
    .bind(user.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for group in rows {
        let m = membership(conn, user.id, group.id).await?;
        let info = membership_info(&group, m.as_ref(), user);
        entries.push(GroupEntry {
            group,
            membership: Some(info),
        });
    }
    Ok(entries)
}

pub async fn join(
    conn: &mut SqliteConnection,
    user: &User,
    group_id: i64,
) -> Result<MembershipInfo, AppError> {
    permissions::assert_can_post(user)?;
    let group = load_group(conn, group_id).await?;
    if let Some(existing) = membership(conn, user.id, group.id).await? {
        return Ok(membership_info(&group, Some(&existing), user));
    }

    let level = if can_join_without_approval(&group, &user.email) {
        MEMBERSHIP_FULL
    } else {
        MEMBERSHIP_PENDING
    };
    let created = sqlx::query_as::<_, GroupMembership>(
        "INSERT INTO group_memberships (user_id, group_id, level) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(user.id)
    .bind(group.id)
    .bind(level)
    .fetch_one(&mut *conn)
    .await?;

    if level == MEMBERSHIP_PENDING {
        let moderators: Vec<i64> = activity::get_admins_and_moderators(conn)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        activity::record_with_recipients(
            conn,
            &NewActivity::new(user.id, ActivityType::AskToJoinGroup, ContentType::Group, group.id)
                .summary(group.name.clone()),
            &moderators,
        )
        .await?;
    }
    tracing::info!(user_id = user.id, group_id, level, "Group membership created");
    Ok(membership_info(&group, Some(&created), user))
}

pub async fn leave(
    conn: &mut SqliteConnection,
    user: &User,
    group_id: i64,
) -> Result<MembershipInfo, AppError> {
    let group = load_group(conn, group_id).await?;
    sqlx::query("DELETE FROM group_memberships WHERE user_id = ? AND group_id = ?")
        .bind(user.id)
        .bind(group.id)
        .execute(&mut *conn)
        .await?;
    Ok(membership_info(&group, None, user))
}

/// Turns a pending membership into a full one.
pub async fn approve_member(
    conn: &mut SqliteConnection,
    moderator: &User,
    group_id: i64,
    user_id: i64,
) -> Result<(), AppError> {
    permissions::assert_can_moderate(moderator)?;
    let updated = sqlx::query(
        "UPDATE group_memberships SET level = ? WHERE group_id = ? AND user_id = ? AND level = ?",
    )
    .bind(MEMBERSHIP_FULL)
    .bind(group_id)
    .bind(user_id)
    .bind(MEMBERSHIP_PENDING)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(AppError::NotFound("No pending membership found".to_string()));
    }
    activity::delete_activities(
        conn,
        ActivityType::AskToJoinGroup,
        ContentType::Group,
        group_id,
        Some(user_id),
    )
    .await?;
    Ok(())
}

pub async fn create_group(
    conn: &mut SqliteConnection,
    user: &User,
    req: &CreateGroupRequest,
) -> Result<Group, AppError> {
    permissions::assert_can_moderate(user)?;
    sqlx::query_as::<_, Group>(
        r#"
        INSERT INTO groups (name, description, is_open, preapproved_emails, preapproved_email_domains)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(req.name.trim())
    .bind(req.description.trim())
    .bind(req.is_open)
    .bind(req.preapproved_emails.trim())
    .bind(req.preapproved_email_domains.trim())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("A group with this name already exists".to_string())
        } else {
            AppError::from(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::user;

    fn group(is_open: bool) -> Group {
        Group {
            id: 1,
            name: "Editors".to_string(),
            description: String::new(),
            is_open,
            moderate_email: true,
            preapproved_emails: "boss@corp.example".to_string(),
            preapproved_email_domains: "@staff.example other.example".to_string(),
        }
    }

    #[test]
    fn preapproved_addresses_and_domains_join_directly() {
        let closed = group(false);
        assert!(can_join_without_approval(&closed, "Boss@corp.example"));
        assert!(can_join_without_approval(&closed, "anyone@staff.example"));
        assert!(can_join_without_approval(&closed, "x@other.example"));
        assert!(!can_join_without_approval(&closed, "x@elsewhere.example"));
        assert!(!can_join_without_approval(&closed, ""));
        assert!(can_join_without_approval(&group(true), "x@elsewhere.example"));
    }

    #[test]
    fn membership_info_reflects_level() {
        let g = group(false);
        let u = user(5, 1, "a");
        let pending = GroupMembership {
            id: 1,
            user_id: 5,
            group_id: 1,
            level: MEMBERSHIP_PENDING,
        };
        let info = membership_info(&g, Some(&pending), &u);
        assert!(info.is_pending && !info.is_member && !info.can_join);

        let none = membership_info(&g, None, &u);
        assert!(!none.is_member && !none.can_join);
    }
}
