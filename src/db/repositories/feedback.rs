//! Feedback repository
//!
//! Database operations for user feedback tickets.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Feedback, FeedbackStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Feedback repository trait
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Create a new ticket
    async fn create(&self, feedback: &Feedback) -> Result<Feedback>;

    /// Get ticket by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Feedback>>;

    /// List a user's own tickets, newest first
    async fn list_by_user(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Feedback>, i64)>;

    /// List all tickets, optionally filtered by status, newest first
    async fn list_all(
        &self,
        status: Option<FeedbackStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Feedback>, i64)>;

    /// Set status and reply; returns false if the ticket doesn't exist
    async fn resolve(
        &self,
        id: i64,
        status: FeedbackStatus,
        reply: Option<&str>,
    ) -> Result<bool>;
}

/// SQLx-based feedback repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxFeedbackRepository {
    pool: DynDatabasePool,
}

impl SqlxFeedbackRepository {
    /// Create a new SQLx feedback repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FeedbackRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FeedbackRepository for SqlxFeedbackRepository {
    async fn create(&self, feedback: &Feedback) -> Result<Feedback> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), feedback).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), feedback).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Feedback>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Feedback>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_user_sqlite(self.pool.as_sqlite().unwrap(), user_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_by_user_mysql(self.pool.as_mysql().unwrap(), user_id, params).await
            }
        }
    }

    async fn list_all(
        &self,
        status: Option<FeedbackStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Feedback>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_all_sqlite(self.pool.as_sqlite().unwrap(), status, params).await
            }
            DatabaseDriver::Mysql => {
                list_all_mysql(self.pool.as_mysql().unwrap(), status, params).await
            }
        }
    }

    async fn resolve(
        &self,
        id: i64,
        status: FeedbackStatus,
        reply: Option<&str>,
    ) -> Result<bool> {
        let sql = "UPDATE feedback SET status = ?, reply = ?, updated_at = ? WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(status.to_string())
                .bind(reply)
                .bind(Utc::now())
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to resolve feedback")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(status.to_string())
                .bind(reply)
                .bind(Utc::now())
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to resolve feedback")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

const FEEDBACK_COLUMNS: &str =
    "id, user_id, subject, content, status, reply, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, feedback: &Feedback) -> Result<Feedback> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO feedback (user_id, subject, content, status, reply, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(feedback.user_id)
    .bind(&feedback.subject)
    .bind(&feedback.content)
    .bind(feedback.status.to_string())
    .bind(&feedback.reply)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create feedback")?;

    Ok(Feedback {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..feedback.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Feedback>> {
    let row = sqlx::query(&format!("SELECT {} FROM feedback WHERE id = ?", FEEDBACK_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get feedback")?;

    match row {
        Some(row) => Ok(Some(row_to_feedback_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_by_user_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    params: &ListParams,
) -> Result<(Vec<Feedback>, i64)> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM feedback WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        FEEDBACK_COLUMNS
    ))
    .bind(user_id)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list feedback")?;

    let mut tickets = Vec::new();
    for row in rows {
        tickets.push(row_to_feedback_sqlite(&row)?);
    }

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM feedback WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count feedback")?
        .get("count");

    Ok((tickets, total))
}

async fn list_all_sqlite(
    pool: &SqlitePool,
    status: Option<FeedbackStatus>,
    params: &ListParams,
) -> Result<(Vec<Feedback>, i64)> {
    let filter = if status.is_some() { "WHERE status = ?" } else { "" };

    let sql = format!(
        "SELECT {} FROM feedback {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        FEEDBACK_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status.to_string());
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list feedback")?;

    let mut tickets = Vec::new();
    for row in rows {
        tickets.push(row_to_feedback_sqlite(&row)?);
    }

    let count_sql = format!("SELECT COUNT(*) as count FROM feedback {}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(status) = status {
        count_query = count_query.bind(status.to_string());
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count feedback")?
        .get("count");

    Ok((tickets, total))
}

fn row_to_feedback_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Feedback> {
    let status_str: String = row.get("status");
    Ok(Feedback {
        id: row.get("id"),
        user_id: row.get("user_id"),
        subject: row.get("subject"),
        content: row.get("content"),
        status: FeedbackStatus::from_str(&status_str)
            .with_context(|| format!("Invalid feedback status: {}", status_str))?,
        reply: row.get("reply"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, feedback: &Feedback) -> Result<Feedback> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO feedback (user_id, subject, content, status, reply, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(feedback.user_id)
    .bind(&feedback.subject)
    .bind(&feedback.content)
    .bind(feedback.status.to_string())
    .bind(&feedback.reply)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create feedback")?;

    Ok(Feedback {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..feedback.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Feedback>> {
    let row = sqlx::query(&format!("SELECT {} FROM feedback WHERE id = ?", FEEDBACK_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get feedback")?;

    match row {
        Some(row) => Ok(Some(row_to_feedback_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_by_user_mysql(
    pool: &MySqlPool,
    user_id: i64,
    params: &ListParams,
) -> Result<(Vec<Feedback>, i64)> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM feedback WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        FEEDBACK_COLUMNS
    ))
    .bind(user_id)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list feedback")?;

    let mut tickets = Vec::new();
    for row in rows {
        tickets.push(row_to_feedback_mysql(&row)?);
    }

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM feedback WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count feedback")?
        .get("count");

    Ok((tickets, total))
}

async fn list_all_mysql(
    pool: &MySqlPool,
    status: Option<FeedbackStatus>,
    params: &ListParams,
) -> Result<(Vec<Feedback>, i64)> {
    let filter = if status.is_some() { "WHERE status = ?" } else { "" };

    let sql = format!(
        "SELECT {} FROM feedback {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        FEEDBACK_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status.to_string());
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list feedback")?;

    let mut tickets = Vec::new();
    for row in rows {
        tickets.push(row_to_feedback_mysql(&row)?);
    }

    let count_sql = format!("SELECT COUNT(*) as count FROM feedback {}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(status) = status {
        count_query = count_query.bind(status.to_string());
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count feedback")?
        .get("count");

    Ok((tickets, total))
}

fn row_to_feedback_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Feedback> {
    let status_str: String = row.get("status");
    Ok(Feedback {
        id: row.get("id"),
        user_id: row.get("user_id"),
        subject: row.get("subject"),
        content: row.get("content"),
        status: FeedbackStatus::from_str(&status_str)
            .with_context(|| format!("Invalid feedback status: {}", status_str))?,
        reply: row.get("reply"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (DynDatabasePool, SqlxFeedbackRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let user = user_repo
            .create(&User::new(
                "reporter".to_string(),
                "reporter@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        (pool.clone(), SqlxFeedbackRepository::new(pool), user.id)
    }

    fn make(user_id: i64, subject: &str) -> Feedback {
        Feedback {
            id: 0,
            user_id,
            subject: subject.to_string(),
            content: "something is off".to_string(),
            status: FeedbackStatus::Open,
            reply: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_resolve() {
        let (_pool, repo, user) = setup().await;

        let ticket = repo.create(&make(user, "broken page")).await.unwrap();
        assert_eq!(ticket.status, FeedbackStatus::Open);

        assert!(repo
            .resolve(ticket.id, FeedbackStatus::Resolved, Some("fixed, thanks"))
            .await
            .unwrap());

        let found = repo.get_by_id(ticket.id).await.unwrap().unwrap();
        assert_eq!(found.status, FeedbackStatus::Resolved);
        assert_eq!(found.reply.as_deref(), Some("fixed, thanks"));

        assert!(!repo
            .resolve(9999, FeedbackStatus::Closed, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let (_pool, repo, user) = setup().await;

        let a = repo.create(&make(user, "a")).await.unwrap();
        repo.create(&make(user, "b")).await.unwrap();
        repo.resolve(a.id, FeedbackStatus::Closed, None).await.unwrap();

        let (open, total) = repo
            .list_all(Some(FeedbackStatus::Open), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(open[0].subject, "b");

        let (mine, total_mine) = repo
            .list_by_user(user, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total_mine, 2);
        assert_eq!(mine.len(), 2);
    }
}
