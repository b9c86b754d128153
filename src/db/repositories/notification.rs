//! Notification repository
//!
//! Database operations for user notifications. The `read` column is
//! backtick-quoted because it is reserved in MySQL; SQLite accepts the
//! same quoting.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Notification, NotificationKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Notification repository trait
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Create a notification row
    async fn create(&self, notification: &Notification) -> Result<Notification>;

    /// List a user's notifications, newest first
    async fn list_for_user(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)>;

    /// Count unread notifications for a user
    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    /// Mark one notification read; returns false if not found or not owned
    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool>;

    /// Mark all of a user's notifications read, returning how many changed
    async fn mark_all_read(&self, user_id: i64) -> Result<i64>;

    /// Insert an announcement notification for every active user
    async fn broadcast_announcement(&self, author_id: i64) -> Result<i64>;
}

/// SQLx-based notification repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    /// Create a new SQLx notification repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<Notification> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_sqlite(self.pool.as_sqlite().unwrap(), notification).await
            }
            DatabaseDriver::Mysql => {
                create_mysql(self.pool.as_mysql().unwrap(), notification).await
            }
        }
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_user_sqlite(self.pool.as_sqlite().unwrap(), user_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_for_user_mysql(self.pool.as_mysql().unwrap(), user_id, params).await
            }
        }
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM notifications WHERE user_id = ? AND `read` = 0";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count unread notifications")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count unread notifications")?
                .get("count"),
        };
        Ok(count)
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool> {
        let sql = "UPDATE notifications SET `read` = 1 WHERE id = ? AND user_id = ? AND `read` = 0";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to mark notification read")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to mark notification read")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<i64> {
        let sql = "UPDATE notifications SET `read` = 1 WHERE user_id = ? AND `read` = 0";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
        };
        Ok(affected as i64)
    }

    async fn broadcast_announcement(&self, author_id: i64) -> Result<i64> {
        let sql = r#"
            INSERT INTO notifications (user_id, actor_id, kind, `read`, created_at)
            SELECT id, ?, 'announcement', 0, ?
            FROM users
            WHERE status = 'active'
        "#;
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(author_id)
                .bind(Utc::now())
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to broadcast announcement")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(author_id)
                .bind(Utc::now())
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to broadcast announcement")?
                .rows_affected(),
        };
        Ok(affected as i64)
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, actor_id, kind, diary_id, comment_id, `read`, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, notification: &Notification) -> Result<Notification> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, actor_id, kind, diary_id, comment_id, `read`, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.actor_id)
    .bind(notification.kind.to_string())
    .bind(notification.diary_id)
    .bind(notification.comment_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create notification")?;

    Ok(Notification {
        id: result.last_insert_rowid(),
        read: false,
        created_at: now,
        ..notification.clone()
    })
}

async fn list_for_user_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    params: &ListParams,
) -> Result<(Vec<Notification>, i64)> {
    let sql = format!(
        "SELECT {} FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        NOTIFICATION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list notifications")?;

    let mut notifications = Vec::new();
    for row in rows {
        notifications.push(row_to_notification(
            row.get("id"),
            row.get("user_id"),
            row.get("actor_id"),
            row.get("kind"),
            row.get("diary_id"),
            row.get("comment_id"),
            row.get::<i64, _>("read") != 0,
            row.get("created_at"),
        )?);
    }

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM notifications WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count notifications")?
        .get("count");

    Ok((notifications, total))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, notification: &Notification) -> Result<Notification> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, actor_id, kind, diary_id, comment_id, `read`, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.actor_id)
    .bind(notification.kind.to_string())
    .bind(notification.diary_id)
    .bind(notification.comment_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create notification")?;

    Ok(Notification {
        id: result.last_insert_id() as i64,
        read: false,
        created_at: now,
        ..notification.clone()
    })
}

async fn list_for_user_mysql(
    pool: &MySqlPool,
    user_id: i64,
    params: &ListParams,
) -> Result<(Vec<Notification>, i64)> {
    let sql = format!(
        "SELECT {} FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        NOTIFICATION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list notifications")?;

    let mut notifications = Vec::new();
    for row in rows {
        notifications.push(row_to_notification(
            row.get("id"),
            row.get("user_id"),
            row.get("actor_id"),
            row.get("kind"),
            row.get("diary_id"),
            row.get("comment_id"),
            row.get::<i64, _>("read") != 0,
            row.get("created_at"),
        )?);
    }

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM notifications WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count notifications")?
        .get("count");

    Ok((notifications, total))
}

#[allow(clippy::too_many_arguments)]
fn row_to_notification(
    id: i64,
    user_id: i64,
    actor_id: Option<i64>,
    kind: String,
    diary_id: Option<i64>,
    comment_id: Option<i64>,
    read: bool,
    created_at: chrono::DateTime<Utc>,
) -> Result<Notification> {
    Ok(Notification {
        id,
        user_id,
        actor_id,
        kind: NotificationKind::from_str(&kind)
            .with_context(|| format!("Invalid notification kind: {}", kind))?,
        diary_id,
        comment_id,
        read,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole, UserStatus};

    async fn setup() -> (DynDatabasePool, SqlxNotificationRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let recipient = user_repo
            .create(&User::new(
                "recipient".to_string(),
                "recipient@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();
        let actor = user_repo
            .create(&User::new(
                "actor".to_string(),
                "actor@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        (pool.clone(), SqlxNotificationRepository::new(pool), recipient.id, actor.id)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (_pool, repo, recipient, actor) = setup().await;

        repo.create(&Notification::new(recipient, Some(actor), NotificationKind::Follow))
            .await
            .unwrap();
        repo.create(
            &Notification::new(recipient, Some(actor), NotificationKind::Like).with_diary(7),
        )
        .await
        .unwrap();

        let (items, total) = repo
            .list_for_user(recipient, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);
        // Newest first
        assert_eq!(items[0].kind, NotificationKind::Like);
        assert_eq!(items[0].diary_id, Some(7));
    }

    #[tokio::test]
    async fn test_unread_count_decreases_on_mark_read() {
        let (_pool, repo, recipient, actor) = setup().await;

        let first = repo
            .create(&Notification::new(recipient, Some(actor), NotificationKind::Follow))
            .await
            .unwrap();
        repo.create(&Notification::new(recipient, Some(actor), NotificationKind::Comment))
            .await
            .unwrap();

        assert_eq!(repo.unread_count(recipient).await.unwrap(), 2);

        assert!(repo.mark_read(first.id, recipient).await.unwrap());
        assert_eq!(repo.unread_count(recipient).await.unwrap(), 1);

        // Marking again changes nothing
        assert!(!repo.mark_read(first.id, recipient).await.unwrap());
        assert_eq!(repo.unread_count(recipient).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_requires_ownership() {
        let (_pool, repo, recipient, actor) = setup().await;

        let n = repo
            .create(&Notification::new(recipient, Some(actor), NotificationKind::Follow))
            .await
            .unwrap();

        // The actor doesn't own the recipient's notification
        assert!(!repo.mark_read(n.id, actor).await.unwrap());
        assert_eq!(repo.unread_count(recipient).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let (_pool, repo, recipient, actor) = setup().await;

        for _ in 0..3 {
            repo.create(&Notification::new(recipient, Some(actor), NotificationKind::Like))
                .await
                .unwrap();
        }

        let changed = repo.mark_all_read(recipient).await.unwrap();
        assert_eq!(changed, 3);
        assert_eq!(repo.unread_count(recipient).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_active_users_only() {
        let (pool, repo, recipient, actor) = setup().await;

        // Ban the actor
        let user_repo = SqlxUserRepository::new(pool.clone());
        let mut banned = user_repo.get_by_id(actor).await.unwrap().unwrap();
        banned.status = UserStatus::Banned;
        user_repo.update(&banned).await.unwrap();

        let inserted = repo.broadcast_announcement(recipient).await.unwrap();

        // Only the recipient remains active
        assert_eq!(inserted, 1);
        assert_eq!(repo.unread_count(recipient).await.unwrap(), 1);
        assert_eq!(repo.unread_count(actor).await.unwrap(), 0);
    }
}
