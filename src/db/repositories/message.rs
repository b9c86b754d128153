//! Message repository
//!
//! Database operations for server-stored chat messages. A conversation is
//! the set of messages between two users in either direction. The `read`
//! column is backtick-quoted because it is reserved in MySQL; SQLite
//! accepts the same quoting.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Message};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a new message
    async fn create(&self, sender_id: i64, recipient_id: i64, content: &str) -> Result<Message>;

    /// Messages between two users in either direction, oldest first within
    /// the requested page (pages walk backwards from the newest)
    async fn conversation(
        &self,
        user_a: i64,
        user_b: i64,
        params: &ListParams,
    ) -> Result<(Vec<Message>, i64)>;

    /// Mark all messages from `sender_id` to `recipient_id` read, returning
    /// how many changed
    async fn mark_read_from(&self, recipient_id: i64, sender_id: i64) -> Result<i64>;

    /// Count unread messages for a user across all conversations
    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    /// All messages involving a user, newest first. Used to fold
    /// conversation summaries in the service layer.
    async fn list_involving(&self, user_id: i64) -> Result<Vec<Message>>;
}

/// SQLx-based message repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxMessageRepository {
    /// Create a new SQLx message repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn create(&self, sender_id: i64, recipient_id: i64, content: &str) -> Result<Message> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_sqlite(self.pool.as_sqlite().unwrap(), sender_id, recipient_id, content)
                    .await
            }
            DatabaseDriver::Mysql => {
                create_mysql(self.pool.as_mysql().unwrap(), sender_id, recipient_id, content).await
            }
        }
    }

    async fn conversation(
        &self,
        user_a: i64,
        user_b: i64,
        params: &ListParams,
    ) -> Result<(Vec<Message>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                conversation_sqlite(self.pool.as_sqlite().unwrap(), user_a, user_b, params).await
            }
            DatabaseDriver::Mysql => {
                conversation_mysql(self.pool.as_mysql().unwrap(), user_a, user_b, params).await
            }
        }
    }

    async fn mark_read_from(&self, recipient_id: i64, sender_id: i64) -> Result<i64> {
        let sql = "UPDATE messages SET `read` = 1 WHERE recipient_id = ? AND sender_id = ? AND `read` = 0";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(recipient_id)
                .bind(sender_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to mark messages read")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(recipient_id)
                .bind(sender_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to mark messages read")?
                .rows_affected(),
        };
        Ok(affected as i64)
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM messages WHERE recipient_id = ? AND `read` = 0";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count unread messages")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count unread messages")?
                .get("count"),
        };
        Ok(count)
    }

    async fn list_involving(&self, user_id: i64) -> Result<Vec<Message>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_involving_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                list_involving_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }
}

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, content, `read`, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(
    pool: &SqlitePool,
    sender_id: i64,
    recipient_id: i64,
    content: &str,
) -> Result<Message> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO messages (sender_id, recipient_id, content, `read`, created_at) VALUES (?, ?, ?, 0, ?)",
    )
    .bind(sender_id)
    .bind(recipient_id)
    .bind(content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create message")?;

    Ok(Message {
        id: result.last_insert_rowid(),
        sender_id,
        recipient_id,
        content: content.to_string(),
        read: false,
        created_at: now,
    })
}

async fn conversation_sqlite(
    pool: &SqlitePool,
    user_a: i64,
    user_b: i64,
    params: &ListParams,
) -> Result<(Vec<Message>, i64)> {
    let sql = format!(
        r#"
        SELECT {} FROM messages
        WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        MESSAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to fetch conversation")?;

    let mut messages: Vec<Message> = rows.iter().map(row_to_message_sqlite).collect();
    // Chronological order inside the page
    messages.reverse();

    let total: i64 = sqlx::query(
        r#"
        SELECT COUNT(*) as count FROM messages
        WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)
        "#,
    )
    .bind(user_a)
    .bind(user_b)
    .bind(user_b)
    .bind(user_a)
    .fetch_one(pool)
    .await
    .context("Failed to count conversation")?
    .get("count");

    Ok((messages, total))
}

async fn list_involving_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Message>> {
    let sql = format!(
        r#"
        SELECT {} FROM messages
        WHERE sender_id = ? OR recipient_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
        MESSAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list messages")?;

    Ok(rows.iter().map(row_to_message_sqlite).collect())
}

fn row_to_message_sqlite(row: &sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        content: row.get("content"),
        read: row.get::<i64, _>("read") != 0,
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(
    pool: &MySqlPool,
    sender_id: i64,
    recipient_id: i64,
    content: &str,
) -> Result<Message> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO messages (sender_id, recipient_id, content, `read`, created_at) VALUES (?, ?, ?, 0, ?)",
    )
    .bind(sender_id)
    .bind(recipient_id)
    .bind(content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create message")?;

    Ok(Message {
        id: result.last_insert_id() as i64,
        sender_id,
        recipient_id,
        content: content.to_string(),
        read: false,
        created_at: now,
    })
}

async fn conversation_mysql(
    pool: &MySqlPool,
    user_a: i64,
    user_b: i64,
    params: &ListParams,
) -> Result<(Vec<Message>, i64)> {
    let sql = format!(
        r#"
        SELECT {} FROM messages
        WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        MESSAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to fetch conversation")?;

    let mut messages: Vec<Message> = rows.iter().map(row_to_message_mysql).collect();
    messages.reverse();

    let total: i64 = sqlx::query(
        r#"
        SELECT COUNT(*) as count FROM messages
        WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)
        "#,
    )
    .bind(user_a)
    .bind(user_b)
    .bind(user_b)
    .bind(user_a)
    .fetch_one(pool)
    .await
    .context("Failed to count conversation")?
    .get("count");

    Ok((messages, total))
}

async fn list_involving_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Message>> {
    let sql = format!(
        r#"
        SELECT {} FROM messages
        WHERE sender_id = ? OR recipient_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
        MESSAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list messages")?;

    Ok(rows.iter().map(row_to_message_mysql).collect())
}

fn row_to_message_mysql(row: &sqlx::mysql::MySqlRow) -> Message {
    Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        content: row.get("content"),
        read: row.get::<i64, _>("read") != 0,
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (DynDatabasePool, SqlxMessageRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let alice = user_repo
            .create(&User::new(
                "alice".to_string(),
                "alice@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();
        let bob = user_repo
            .create(&User::new(
                "bob".to_string(),
                "bob@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        (pool.clone(), SqlxMessageRepository::new(pool), alice.id, bob.id)
    }

    #[tokio::test]
    async fn test_conversation_is_bidirectional_and_chronological() {
        let (_pool, repo, alice, bob) = setup().await;

        repo.create(alice, bob, "hi").await.unwrap();
        repo.create(bob, alice, "hey").await.unwrap();
        repo.create(alice, bob, "how are you?").await.unwrap();

        let (messages, total) = repo
            .conversation(alice, bob, &ListParams::default())
            .await
            .unwrap();

        assert_eq!(total, 3);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[2].content, "how are you?");
    }

    #[tokio::test]
    async fn test_unread_count_and_mark_read() {
        let (_pool, repo, alice, bob) = setup().await;

        repo.create(alice, bob, "one").await.unwrap();
        repo.create(alice, bob, "two").await.unwrap();

        assert_eq!(repo.unread_count(bob).await.unwrap(), 2);
        assert_eq!(repo.unread_count(alice).await.unwrap(), 0);

        let changed = repo.mark_read_from(bob, alice).await.unwrap();
        assert_eq!(changed, 2);
        assert_eq!(repo.unread_count(bob).await.unwrap(), 0);

        // Marking again changes nothing
        assert_eq!(repo.mark_read_from(bob, alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_conversation_excludes_third_parties() {
        let (pool, repo, alice, bob) = setup().await;

        let user_repo = SqlxUserRepository::new(pool.clone());
        let carol = user_repo
            .create(&User::new(
                "carol".to_string(),
                "carol@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        repo.create(alice, bob, "private").await.unwrap();
        repo.create(alice, carol.id, "other thread").await.unwrap();

        let (messages, total) = repo
            .conversation(alice, bob, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(messages[0].content, "private");
    }

    #[tokio::test]
    async fn test_list_involving_returns_both_directions() {
        let (_pool, repo, alice, bob) = setup().await;

        repo.create(alice, bob, "out").await.unwrap();
        repo.create(bob, alice, "in").await.unwrap();

        let involving = repo.list_involving(alice).await.unwrap();
        assert_eq!(involving.len(), 2);
        // Newest first
        assert_eq!(involving[0].content, "in");
    }
}
