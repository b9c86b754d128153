//! Diary repository
//!
//! Database operations for diary entries.
//!
//! This module provides:
//! - `DiaryRepository` trait defining the interface for diary data access
//! - `SqlxDiaryRepository` implementing the trait for SQLite and MySQL
//!
//! Listing queries come in several shapes: the author's own entries
//! (any status/visibility), the public explore listing, the follow feed,
//! and the per-tag listing. Everything except the author listing only ever
//! returns public published entries.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Diary, DiaryStatus, DiaryVisibility, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Diary repository trait
#[async_trait]
pub trait DiaryRepository: Send + Sync {
    /// Create a new diary
    async fn create(&self, diary: &Diary) -> Result<Diary>;

    /// Get diary by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Diary>>;

    /// Update a diary
    async fn update(&self, diary: &Diary) -> Result<Diary>;

    /// Delete a diary, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List an author's own diaries with optional status/visibility filters
    async fn list_by_author(
        &self,
        author_id: i64,
        status: Option<DiaryStatus>,
        visibility: Option<DiaryVisibility>,
        params: &ListParams,
    ) -> Result<(Vec<Diary>, i64)>;

    /// List public published diaries, optionally filtered by emotion
    async fn list_public(
        &self,
        emotion: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Diary>, i64)>;

    /// List public published diaries from users the given user follows
    async fn list_feed(&self, follower_id: i64, params: &ListParams) -> Result<(Vec<Diary>, i64)>;

    /// List public published diaries carrying the given tag
    async fn list_public_by_tag(
        &self,
        tag_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Diary>, i64)>;

    /// Increment the view counter
    async fn increment_view(&self, id: i64) -> Result<()>;

    /// Adjust the denormalized like counter by the given delta
    async fn adjust_like_count(&self, id: i64, delta: i64) -> Result<()>;

    /// Recompute the denormalized comment counter from the comments table
    async fn recount_comments(&self, id: i64) -> Result<()>;

    /// Public published diaries with the highest like counts
    async fn top_by_likes(&self, limit: i64) -> Result<Vec<Diary>>;

    /// Count all diaries
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based diary repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxDiaryRepository {
    pool: DynDatabasePool,
}

impl SqlxDiaryRepository {
    /// Create a new SQLx diary repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DiaryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DiaryRepository for SqlxDiaryRepository {
    async fn create(&self, diary: &Diary) -> Result<Diary> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), diary).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), diary).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Diary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn update(&self, diary: &Diary) -> Result<Diary> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), diary).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), diary).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        status: Option<DiaryStatus>,
        visibility: Option<DiaryVisibility>,
        params: &ListParams,
    ) -> Result<(Vec<Diary>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_author_sqlite(self.pool.as_sqlite().unwrap(), author_id, status, visibility, params)
                    .await
            }
            DatabaseDriver::Mysql => {
                list_by_author_mysql(self.pool.as_mysql().unwrap(), author_id, status, visibility, params)
                    .await
            }
        }
    }

    async fn list_public(
        &self,
        emotion: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Diary>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_public_sqlite(self.pool.as_sqlite().unwrap(), emotion, params).await
            }
            DatabaseDriver::Mysql => {
                list_public_mysql(self.pool.as_mysql().unwrap(), emotion, params).await
            }
        }
    }

    async fn list_feed(&self, follower_id: i64, params: &ListParams) -> Result<(Vec<Diary>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_feed_sqlite(self.pool.as_sqlite().unwrap(), follower_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_feed_mysql(self.pool.as_mysql().unwrap(), follower_id, params).await
            }
        }
    }

    async fn list_public_by_tag(
        &self,
        tag_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Diary>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_public_by_tag_sqlite(self.pool.as_sqlite().unwrap(), tag_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_public_by_tag_mysql(self.pool.as_mysql().unwrap(), tag_id, params).await
            }
        }
    }

    async fn increment_view(&self, id: i64) -> Result<()> {
        let sql = "UPDATE diaries SET view_count = view_count + 1 WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to increment view count")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to increment view count")?;
            }
        }
        Ok(())
    }

    async fn adjust_like_count(&self, id: i64, delta: i64) -> Result<()> {
        // MAX guards against drift below zero
        let sql = "UPDATE diaries SET like_count = MAX(like_count + ?, 0) WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(delta)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to adjust like count")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("UPDATE diaries SET like_count = GREATEST(like_count + ?, 0) WHERE id = ?")
                    .bind(delta)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to adjust like count")?;
            }
        }
        Ok(())
    }

    async fn recount_comments(&self, id: i64) -> Result<()> {
        let sql = r#"
            UPDATE diaries
            SET comment_count = (SELECT COUNT(*) FROM comments WHERE diary_id = diaries.id)
            WHERE id = ?
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to recount comments")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to recount comments")?;
            }
        }
        Ok(())
    }

    async fn top_by_likes(&self, limit: i64) -> Result<Vec<Diary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                top_by_likes_sqlite(self.pool.as_sqlite().unwrap(), limit).await
            }
            DatabaseDriver::Mysql => top_by_likes_mysql(self.pool.as_mysql().unwrap(), limit).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query("SELECT COUNT(*) as count FROM diaries")
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to count diaries")?;
                Ok(row.get("count"))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query("SELECT COUNT(*) as count FROM diaries")
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to count diaries")?;
                Ok(row.get("count"))
            }
        }
    }
}

const DIARY_COLUMNS: &str = "id, author_id, title, content, emotion, weather, visibility, status, \
     view_count, like_count, comment_count, published_at, created_at, updated_at";

const PUBLIC_FILTER: &str = "visibility = 'public' AND status = 'published'";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, diary: &Diary) -> Result<Diary> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO diaries (author_id, title, content, emotion, weather, visibility, status, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(diary.author_id)
    .bind(&diary.title)
    .bind(&diary.content)
    .bind(&diary.emotion)
    .bind(&diary.weather)
    .bind(diary.visibility.as_str())
    .bind(diary.status.as_str())
    .bind(diary.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create diary")?;

    Ok(Diary {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..diary.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Diary>> {
    let row = sqlx::query(&format!("SELECT {} FROM diaries WHERE id = ?", DIARY_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get diary by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_diary_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn update_sqlite(pool: &SqlitePool, diary: &Diary) -> Result<Diary> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE diaries
        SET title = ?, content = ?, emotion = ?, weather = ?, visibility = ?,
            status = ?, published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&diary.title)
    .bind(&diary.content)
    .bind(&diary.emotion)
    .bind(&diary.weather)
    .bind(diary.visibility.as_str())
    .bind(diary.status.as_str())
    .bind(diary.published_at)
    .bind(now)
    .bind(diary.id)
    .execute(pool)
    .await
    .context("Failed to update diary")?;

    get_by_id_sqlite(pool, diary.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Diary not found after update"))
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM diaries WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete diary")?;

    Ok(result.rows_affected() > 0)
}

async fn list_by_author_sqlite(
    pool: &SqlitePool,
    author_id: i64,
    status: Option<DiaryStatus>,
    visibility: Option<DiaryVisibility>,
    params: &ListParams,
) -> Result<(Vec<Diary>, i64)> {
    let mut filter = String::from("author_id = ?");
    if status.is_some() {
        filter.push_str(" AND status = ?");
    }
    if visibility.is_some() {
        filter.push_str(" AND visibility = ?");
    }

    let sql = format!(
        "SELECT {} FROM diaries WHERE {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        DIARY_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql).bind(author_id);
    if let Some(status) = status {
        query = query.bind(status.as_str());
    }
    if let Some(visibility) = visibility {
        query = query.bind(visibility.as_str());
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list diaries by author")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_sqlite(&row)?);
    }

    let count_sql = format!("SELECT COUNT(*) as count FROM diaries WHERE {}", filter);
    let mut count_query = sqlx::query(&count_sql).bind(author_id);
    if let Some(status) = status {
        count_query = count_query.bind(status.as_str());
    }
    if let Some(visibility) = visibility {
        count_query = count_query.bind(visibility.as_str());
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count diaries by author")?
        .get("count");

    Ok((diaries, total))
}

async fn list_public_sqlite(
    pool: &SqlitePool,
    emotion: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<Diary>, i64)> {
    let mut filter = String::from(PUBLIC_FILTER);
    if emotion.is_some() {
        filter.push_str(" AND emotion = ?");
    }

    let sql = format!(
        "SELECT {} FROM diaries WHERE {} ORDER BY published_at DESC LIMIT ? OFFSET ?",
        DIARY_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql);
    if let Some(emotion) = emotion {
        query = query.bind(emotion);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list public diaries")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_sqlite(&row)?);
    }

    let count_sql = format!("SELECT COUNT(*) as count FROM diaries WHERE {}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(emotion) = emotion {
        count_query = count_query.bind(emotion);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count public diaries")?
        .get("count");

    Ok((diaries, total))
}

async fn list_feed_sqlite(
    pool: &SqlitePool,
    follower_id: i64,
    params: &ListParams,
) -> Result<(Vec<Diary>, i64)> {
    let sql = format!(
        r#"
        SELECT {} FROM diaries
        WHERE author_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)
          AND {}
        ORDER BY published_at DESC
        LIMIT ? OFFSET ?
        "#,
        DIARY_COLUMNS, PUBLIC_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(follower_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list feed diaries")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_sqlite(&row)?);
    }

    let count_sql = format!(
        r#"
        SELECT COUNT(*) as count FROM diaries
        WHERE author_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)
          AND {}
        "#,
        PUBLIC_FILTER
    );
    let total: i64 = sqlx::query(&count_sql)
        .bind(follower_id)
        .fetch_one(pool)
        .await
        .context("Failed to count feed diaries")?
        .get("count");

    Ok((diaries, total))
}

async fn list_public_by_tag_sqlite(
    pool: &SqlitePool,
    tag_id: i64,
    params: &ListParams,
) -> Result<(Vec<Diary>, i64)> {
    let sql = format!(
        r#"
        SELECT {} FROM diaries
        WHERE id IN (SELECT diary_id FROM diary_tags WHERE tag_id = ?)
          AND {}
        ORDER BY published_at DESC
        LIMIT ? OFFSET ?
        "#,
        DIARY_COLUMNS, PUBLIC_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(tag_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list diaries by tag")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_sqlite(&row)?);
    }

    let count_sql = format!(
        r#"
        SELECT COUNT(*) as count FROM diaries
        WHERE id IN (SELECT diary_id FROM diary_tags WHERE tag_id = ?)
          AND {}
        "#,
        PUBLIC_FILTER
    );
    let total: i64 = sqlx::query(&count_sql)
        .bind(tag_id)
        .fetch_one(pool)
        .await
        .context("Failed to count diaries by tag")?
        .get("count");

    Ok((diaries, total))
}

async fn top_by_likes_sqlite(pool: &SqlitePool, limit: i64) -> Result<Vec<Diary>> {
    let sql = format!(
        "SELECT {} FROM diaries WHERE {} ORDER BY like_count DESC, id ASC LIMIT ?",
        DIARY_COLUMNS, PUBLIC_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to fetch top diaries")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_sqlite(&row)?);
    }
    Ok(diaries)
}

fn row_to_diary_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Diary> {
    let visibility_str: String = row.get("visibility");
    let visibility = DiaryVisibility::from_str(&visibility_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid visibility in database: {}", visibility_str))?;

    let status_str: String = row.get("status");
    let status = DiaryStatus::from_str(&status_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid status in database: {}", status_str))?;

    Ok(Diary {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        content: row.get("content"),
        emotion: row.get("emotion"),
        weather: row.get("weather"),
        visibility,
        status,
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, diary: &Diary) -> Result<Diary> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO diaries (author_id, title, content, emotion, weather, visibility, status, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(diary.author_id)
    .bind(&diary.title)
    .bind(&diary.content)
    .bind(&diary.emotion)
    .bind(&diary.weather)
    .bind(diary.visibility.as_str())
    .bind(diary.status.as_str())
    .bind(diary.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create diary")?;

    Ok(Diary {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..diary.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Diary>> {
    let row = sqlx::query(&format!("SELECT {} FROM diaries WHERE id = ?", DIARY_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get diary by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_diary_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn update_mysql(pool: &MySqlPool, diary: &Diary) -> Result<Diary> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE diaries
        SET title = ?, content = ?, emotion = ?, weather = ?, visibility = ?,
            status = ?, published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&diary.title)
    .bind(&diary.content)
    .bind(&diary.emotion)
    .bind(&diary.weather)
    .bind(diary.visibility.as_str())
    .bind(diary.status.as_str())
    .bind(diary.published_at)
    .bind(now)
    .bind(diary.id)
    .execute(pool)
    .await
    .context("Failed to update diary")?;

    get_by_id_mysql(pool, diary.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Diary not found after update"))
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM diaries WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete diary")?;

    Ok(result.rows_affected() > 0)
}

async fn list_by_author_mysql(
    pool: &MySqlPool,
    author_id: i64,
    status: Option<DiaryStatus>,
    visibility: Option<DiaryVisibility>,
    params: &ListParams,
) -> Result<(Vec<Diary>, i64)> {
    let mut filter = String::from("author_id = ?");
    if status.is_some() {
        filter.push_str(" AND status = ?");
    }
    if visibility.is_some() {
        filter.push_str(" AND visibility = ?");
    }

    let sql = format!(
        "SELECT {} FROM diaries WHERE {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        DIARY_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql).bind(author_id);
    if let Some(status) = status {
        query = query.bind(status.as_str());
    }
    if let Some(visibility) = visibility {
        query = query.bind(visibility.as_str());
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list diaries by author")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_mysql(&row)?);
    }

    let count_sql = format!("SELECT COUNT(*) as count FROM diaries WHERE {}", filter);
    let mut count_query = sqlx::query(&count_sql).bind(author_id);
    if let Some(status) = status {
        count_query = count_query.bind(status.as_str());
    }
    if let Some(visibility) = visibility {
        count_query = count_query.bind(visibility.as_str());
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count diaries by author")?
        .get("count");

    Ok((diaries, total))
}

async fn list_public_mysql(
    pool: &MySqlPool,
    emotion: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<Diary>, i64)> {
    let mut filter = String::from(PUBLIC_FILTER);
    if emotion.is_some() {
        filter.push_str(" AND emotion = ?");
    }

    let sql = format!(
        "SELECT {} FROM diaries WHERE {} ORDER BY published_at DESC LIMIT ? OFFSET ?",
        DIARY_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql);
    if let Some(emotion) = emotion {
        query = query.bind(emotion);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list public diaries")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_mysql(&row)?);
    }

    let count_sql = format!("SELECT COUNT(*) as count FROM diaries WHERE {}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(emotion) = emotion {
        count_query = count_query.bind(emotion);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count public diaries")?
        .get("count");

    Ok((diaries, total))
}

async fn list_feed_mysql(
    pool: &MySqlPool,
    follower_id: i64,
    params: &ListParams,
) -> Result<(Vec<Diary>, i64)> {
    let sql = format!(
        r#"
        SELECT {} FROM diaries
        WHERE author_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)
          AND {}
        ORDER BY published_at DESC
        LIMIT ? OFFSET ?
        "#,
        DIARY_COLUMNS, PUBLIC_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(follower_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list feed diaries")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_mysql(&row)?);
    }

    let count_sql = format!(
        r#"
        SELECT COUNT(*) as count FROM diaries
        WHERE author_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)
          AND {}
        "#,
        PUBLIC_FILTER
    );
    let total: i64 = sqlx::query(&count_sql)
        .bind(follower_id)
        .fetch_one(pool)
        .await
        .context("Failed to count feed diaries")?
        .get("count");

    Ok((diaries, total))
}

async fn list_public_by_tag_mysql(
    pool: &MySqlPool,
    tag_id: i64,
    params: &ListParams,
) -> Result<(Vec<Diary>, i64)> {
    let sql = format!(
        r#"
        SELECT {} FROM diaries
        WHERE id IN (SELECT diary_id FROM diary_tags WHERE tag_id = ?)
          AND {}
        ORDER BY published_at DESC
        LIMIT ? OFFSET ?
        "#,
        DIARY_COLUMNS, PUBLIC_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(tag_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list diaries by tag")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_mysql(&row)?);
    }

    let count_sql = format!(
        r#"
        SELECT COUNT(*) as count FROM diaries
        WHERE id IN (SELECT diary_id FROM diary_tags WHERE tag_id = ?)
          AND {}
        "#,
        PUBLIC_FILTER
    );
    let total: i64 = sqlx::query(&count_sql)
        .bind(tag_id)
        .fetch_one(pool)
        .await
        .context("Failed to count diaries by tag")?
        .get("count");

    Ok((diaries, total))
}

async fn top_by_likes_mysql(pool: &MySqlPool, limit: i64) -> Result<Vec<Diary>> {
    let sql = format!(
        "SELECT {} FROM diaries WHERE {} ORDER BY like_count DESC, id ASC LIMIT ?",
        DIARY_COLUMNS, PUBLIC_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to fetch top diaries")?;

    let mut diaries = Vec::new();
    for row in rows {
        diaries.push(row_to_diary_mysql(&row)?);
    }
    Ok(diaries)
}

fn row_to_diary_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Diary> {
    let visibility_str: String = row.get("visibility");
    let visibility = DiaryVisibility::from_str(&visibility_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid visibility in database: {}", visibility_str))?;

    let status_str: String = row.get("status");
    let status = DiaryStatus::from_str(&status_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid status in database: {}", status_str))?;

    Ok(Diary {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        content: row.get("content"),
        emotion: row.get("emotion"),
        weather: row.get("weather"),
        visibility,
        status,
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{FollowRepository, SqlxFollowRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (DynDatabasePool, SqlxDiaryRepository, i64, i64) {
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

        let repo = SqlxDiaryRepository::new(pool.clone());
        (pool, repo, alice.id, bob.id)
    }

    fn make_diary(
        author_id: i64,
        title: &str,
        visibility: DiaryVisibility,
        status: DiaryStatus,
    ) -> Diary {
        Diary::new(
            author_id,
            title.to_string(),
            "content".to_string(),
            visibility,
            status,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_diary() {
        let (_pool, repo, alice, _bob) = setup().await;
        let diary = make_diary(alice, "First", DiaryVisibility::Public, DiaryStatus::Published);

        let created = repo.create(&diary).await.expect("Failed to create diary");
        assert!(created.id > 0);

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get diary")
            .expect("Diary not found");
        assert_eq!(found.title, "First");
        assert_eq!(found.visibility, DiaryVisibility::Public);
        assert_eq!(found.status, DiaryStatus::Published);
    }

    #[tokio::test]
    async fn test_private_diary_excluded_from_public_listing() {
        let (_pool, repo, alice, _bob) = setup().await;
        repo.create(&make_diary(alice, "public one", DiaryVisibility::Public, DiaryStatus::Published))
            .await
            .unwrap();
        repo.create(&make_diary(alice, "private one", DiaryVisibility::Private, DiaryStatus::Published))
            .await
            .unwrap();
        repo.create(&make_diary(alice, "draft one", DiaryVisibility::Public, DiaryStatus::Draft))
            .await
            .unwrap();

        let (items, total) = repo
            .list_public(None, &ListParams::default())
            .await
            .expect("Failed to list public");

        assert_eq!(total, 1);
        assert_eq!(items[0].title, "public one");
    }

    #[tokio::test]
    async fn test_list_public_filters_by_emotion() {
        let (_pool, repo, alice, _bob) = setup().await;
        let mut happy = make_diary(alice, "happy", DiaryVisibility::Public, DiaryStatus::Published);
        happy.emotion = Some("joy".to_string());
        repo.create(&happy).await.unwrap();

        let mut sad = make_diary(alice, "sad", DiaryVisibility::Public, DiaryStatus::Published);
        sad.emotion = Some("melancholy".to_string());
        repo.create(&sad).await.unwrap();

        let (items, total) = repo
            .list_public(Some("joy"), &ListParams::default())
            .await
            .unwrap();

        assert_eq!(total, 1);
        assert_eq!(items[0].title, "happy");
    }

    #[tokio::test]
    async fn test_list_by_author_includes_drafts_and_private() {
        let (_pool, repo, alice, _bob) = setup().await;
        repo.create(&make_diary(alice, "a", DiaryVisibility::Public, DiaryStatus::Published))
            .await
            .unwrap();
        repo.create(&make_diary(alice, "b", DiaryVisibility::Private, DiaryStatus::Draft))
            .await
            .unwrap();

        let (_, total) = repo
            .list_by_author(alice, None, None, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);

        let (_, drafts) = repo
            .list_by_author(alice, Some(DiaryStatus::Draft), None, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(drafts, 1);
    }

    #[tokio::test]
    async fn test_feed_only_contains_followed_authors() {
        let (pool, repo, alice, bob) = setup().await;
        repo.create(&make_diary(bob, "bobs day", DiaryVisibility::Public, DiaryStatus::Published))
            .await
            .unwrap();
        repo.create(&make_diary(alice, "alices day", DiaryVisibility::Public, DiaryStatus::Published))
            .await
            .unwrap();

        let follow_repo = SqlxFollowRepository::new(pool.clone());

        // Alice follows nobody yet
        let (_, total) = repo.list_feed(alice, &ListParams::default()).await.unwrap();
        assert_eq!(total, 0);

        follow_repo.create(alice, bob).await.unwrap();

        let (items, total) = repo.list_feed(alice, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].title, "bobs day");
    }

    #[tokio::test]
    async fn test_feed_excludes_private_entries_from_followed_author() {
        let (pool, repo, alice, bob) = setup().await;
        repo.create(&make_diary(bob, "secret", DiaryVisibility::Private, DiaryStatus::Published))
            .await
            .unwrap();

        let follow_repo = SqlxFollowRepository::new(pool.clone());
        follow_repo.create(alice, bob).await.unwrap();

        let (_, total) = repo.list_feed(alice, &ListParams::default()).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_increment_view() {
        let (_pool, repo, alice, _bob) = setup().await;
        let created = repo
            .create(&make_diary(alice, "viewed", DiaryVisibility::Public, DiaryStatus::Published))
            .await
            .unwrap();

        repo.increment_view(created.id).await.unwrap();
        repo.increment_view(created.id).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.view_count, 2);
    }

    #[tokio::test]
    async fn test_adjust_like_count_never_negative() {
        let (_pool, repo, alice, _bob) = setup().await;
        let created = repo
            .create(&make_diary(alice, "liked", DiaryVisibility::Public, DiaryStatus::Published))
            .await
            .unwrap();

        repo.adjust_like_count(created.id, 1).await.unwrap();
        repo.adjust_like_count(created.id, -1).await.unwrap();
        repo.adjust_like_count(created.id, -1).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.like_count, 0);
    }

    #[tokio::test]
    async fn test_delete_diary() {
        let (_pool, repo, alice, _bob) = setup().await;
        let created = repo
            .create(&make_diary(alice, "gone", DiaryVisibility::Public, DiaryStatus::Published))
            .await
            .unwrap();

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
        assert!(!repo.delete(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_top_by_likes_orders_descending() {
        let (_pool, repo, alice, _bob) = setup().await;
        let a = repo
            .create(&make_diary(alice, "a", DiaryVisibility::Public, DiaryStatus::Published))
            .await
            .unwrap();
        let b = repo
            .create(&make_diary(alice, "b", DiaryVisibility::Public, DiaryStatus::Published))
            .await
            .unwrap();

        repo.adjust_like_count(b.id, 5).await.unwrap();
        repo.adjust_like_count(a.id, 2).await.unwrap();

        let top = repo.top_by_likes(5).await.unwrap();
        assert_eq!(top[0].title, "b");
        assert_eq!(top[1].title, "a");
    }
}
