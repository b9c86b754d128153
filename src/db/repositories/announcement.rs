//! Announcement repository
//!
//! Database operations for admin broadcast announcements.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Announcement, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Announcement repository trait
#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    /// Create an announcement
    async fn create(&self, announcement: &Announcement) -> Result<Announcement>;

    /// Get announcement by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Announcement>>;

    /// Update an announcement
    async fn update(&self, announcement: &Announcement) -> Result<Announcement>;

    /// Delete an announcement, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List announcements, newest first. When `published_only` is set,
    /// drafts are excluded.
    async fn list(
        &self,
        published_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Announcement>, i64)>;
}

/// SQLx-based announcement repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxAnnouncementRepository {
    pool: DynDatabasePool,
}

impl SqlxAnnouncementRepository {
    /// Create a new SQLx announcement repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AnnouncementRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AnnouncementRepository for SqlxAnnouncementRepository {
    async fn create(&self, announcement: &Announcement) -> Result<Announcement> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_sqlite(self.pool.as_sqlite().unwrap(), announcement).await
            }
            DatabaseDriver::Mysql => {
                create_mysql(self.pool.as_mysql().unwrap(), announcement).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Announcement>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn update(&self, announcement: &Announcement) -> Result<Announcement> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_sqlite(self.pool.as_sqlite().unwrap(), announcement).await
            }
            DatabaseDriver::Mysql => {
                update_mysql(self.pool.as_mysql().unwrap(), announcement).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM announcements WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to delete announcement")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to delete announcement")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(
        &self,
        published_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Announcement>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_sqlite(self.pool.as_sqlite().unwrap(), published_only, params).await
            }
            DatabaseDriver::Mysql => {
                list_mysql(self.pool.as_mysql().unwrap(), published_only, params).await
            }
        }
    }
}

const ANNOUNCEMENT_COLUMNS: &str =
    "id, author_id, title, content, published, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, announcement: &Announcement) -> Result<Announcement> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO announcements (author_id, title, content, published, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(announcement.author_id)
    .bind(&announcement.title)
    .bind(&announcement.content)
    .bind(announcement.published)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create announcement")?;

    Ok(Announcement {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..announcement.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Announcement>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM announcements WHERE id = ?",
        ANNOUNCEMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get announcement")?;

    Ok(row.map(|row| row_to_announcement_sqlite(&row)))
}

async fn update_sqlite(pool: &SqlitePool, announcement: &Announcement) -> Result<Announcement> {
    let now = Utc::now();

    sqlx::query(
        "UPDATE announcements SET title = ?, content = ?, published = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&announcement.title)
    .bind(&announcement.content)
    .bind(announcement.published)
    .bind(now)
    .bind(announcement.id)
    .execute(pool)
    .await
    .context("Failed to update announcement")?;

    get_by_id_sqlite(pool, announcement.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Announcement not found after update"))
}

async fn list_sqlite(
    pool: &SqlitePool,
    published_only: bool,
    params: &ListParams,
) -> Result<(Vec<Announcement>, i64)> {
    let filter = if published_only { "WHERE published = 1" } else { "" };

    let sql = format!(
        "SELECT {} FROM announcements {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        ANNOUNCEMENT_COLUMNS, filter
    );
    let rows = sqlx::query(&sql)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list announcements")?;

    let announcements = rows.iter().map(row_to_announcement_sqlite).collect();

    let count_sql = format!("SELECT COUNT(*) as count FROM announcements {}", filter);
    let total: i64 = sqlx::query(&count_sql)
        .fetch_one(pool)
        .await
        .context("Failed to count announcements")?
        .get("count");

    Ok((announcements, total))
}

fn row_to_announcement_sqlite(row: &sqlx::sqlite::SqliteRow) -> Announcement {
    Announcement {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        content: row.get("content"),
        published: row.get::<i64, _>("published") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, announcement: &Announcement) -> Result<Announcement> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO announcements (author_id, title, content, published, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(announcement.author_id)
    .bind(&announcement.title)
    .bind(&announcement.content)
    .bind(announcement.published)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create announcement")?;

    Ok(Announcement {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..announcement.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Announcement>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM announcements WHERE id = ?",
        ANNOUNCEMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get announcement")?;

    Ok(row.map(|row| row_to_announcement_mysql(&row)))
}

async fn update_mysql(pool: &MySqlPool, announcement: &Announcement) -> Result<Announcement> {
    let now = Utc::now();

    sqlx::query(
        "UPDATE announcements SET title = ?, content = ?, published = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&announcement.title)
    .bind(&announcement.content)
    .bind(announcement.published)
    .bind(now)
    .bind(announcement.id)
    .execute(pool)
    .await
    .context("Failed to update announcement")?;

    get_by_id_mysql(pool, announcement.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Announcement not found after update"))
}

async fn list_mysql(
    pool: &MySqlPool,
    published_only: bool,
    params: &ListParams,
) -> Result<(Vec<Announcement>, i64)> {
    let filter = if published_only { "WHERE published = 1" } else { "" };

    let sql = format!(
        "SELECT {} FROM announcements {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        ANNOUNCEMENT_COLUMNS, filter
    );
    let rows = sqlx::query(&sql)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list announcements")?;

    let announcements = rows.iter().map(row_to_announcement_mysql).collect();

    let count_sql = format!("SELECT COUNT(*) as count FROM announcements {}", filter);
    let total: i64 = sqlx::query(&count_sql)
        .fetch_one(pool)
        .await
        .context("Failed to count announcements")?
        .get("count");

    Ok((announcements, total))
}

fn row_to_announcement_mysql(row: &sqlx::mysql::MySqlRow) -> Announcement {
    Announcement {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        content: row.get("content"),
        published: row.get::<i8, _>("published") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
