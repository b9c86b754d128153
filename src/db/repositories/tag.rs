//! Tag repository
//!
//! Database operations for keyword tags and the diary/tag join table.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    /// Get tag by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    /// Get tag by name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// List all tags
    async fn list(&self) -> Result<Vec<Tag>>;

    /// List tags with public diary usage counts, most used first
    async fn list_with_counts(&self, limit: i64) -> Result<Vec<TagWithCount>>;

    /// Link a tag to a diary
    async fn add_to_diary(&self, tag_id: i64, diary_id: i64) -> Result<()>;

    /// Remove all tag links for a diary
    async fn clear_for_diary(&self, diary_id: i64) -> Result<()>;

    /// Get all tags linked to a diary
    async fn get_by_diary_id(&self, diary_id: i64) -> Result<Vec<Tag>>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_tag_sqlite(self.pool.as_sqlite().unwrap(), tag).await,
            DatabaseDriver::Mysql => create_tag_mysql(self.pool.as_mysql().unwrap(), tag).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tag_by_slug_sqlite(self.pool.as_sqlite().unwrap(), slug).await
            }
            DatabaseDriver::Mysql => {
                get_tag_by_slug_mysql(self.pool.as_mysql().unwrap(), slug).await
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tag_by_name_sqlite(self.pool.as_sqlite().unwrap(), name).await
            }
            DatabaseDriver::Mysql => {
                get_tag_by_name_mysql(self.pool.as_mysql().unwrap(), name).await
            }
        }
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_tags_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn list_with_counts(&self, limit: i64) -> Result<Vec<TagWithCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_with_counts_sqlite(self.pool.as_sqlite().unwrap(), limit).await
            }
            DatabaseDriver::Mysql => {
                list_with_counts_mysql(self.pool.as_mysql().unwrap(), limit).await
            }
        }
    }

    async fn add_to_diary(&self, tag_id: i64, diary_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("INSERT OR IGNORE INTO diary_tags (diary_id, tag_id) VALUES (?, ?)")
                    .bind(diary_id)
                    .bind(tag_id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to link tag to diary")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("INSERT IGNORE INTO diary_tags (diary_id, tag_id) VALUES (?, ?)")
                    .bind(diary_id)
                    .bind(tag_id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to link tag to diary")?;
            }
        }
        Ok(())
    }

    async fn clear_for_diary(&self, diary_id: i64) -> Result<()> {
        let sql = "DELETE FROM diary_tags WHERE diary_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(diary_id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to clear diary tags")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(diary_id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to clear diary tags")?;
            }
        }
        Ok(())
    }

    async fn get_by_diary_id(&self, diary_id: i64) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_diary_id_sqlite(self.pool.as_sqlite().unwrap(), diary_id).await
            }
            DatabaseDriver::Mysql => {
                get_by_diary_id_mysql(self.pool.as_mysql().unwrap(), diary_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query("INSERT INTO tags (slug, name, created_at) VALUES (?, ?, ?)")
        .bind(&tag.slug)
        .bind(&tag.name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        slug: tag.slug.clone(),
        name: tag.name.clone(),
        created_at: now,
    })
}

async fn get_tag_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, slug, name, created_at FROM tags WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by slug")?;

    Ok(row.map(|row| row_to_tag_sqlite(&row)))
}

async fn get_tag_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, slug, name, created_at FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    Ok(row.map(|row| row_to_tag_sqlite(&row)))
}

async fn list_tags_sqlite(pool: &SqlitePool) -> Result<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, slug, name, created_at FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn list_with_counts_sqlite(pool: &SqlitePool, limit: i64) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.slug, t.name, COUNT(d.id) as diary_count
        FROM tags t
        LEFT JOIN diary_tags dt ON dt.tag_id = t.id
        LEFT JOIN diaries d ON d.id = dt.diary_id
            AND d.visibility = 'public' AND d.status = 'published'
        GROUP BY t.id, t.slug, t.name
        ORDER BY diary_count DESC, t.name ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list tags with counts")?;

    Ok(rows
        .iter()
        .map(|row| TagWithCount {
            id: row.get("id"),
            slug: row.get("slug"),
            name: row.get("name"),
            diary_count: row.get("diary_count"),
        })
        .collect())
}

async fn get_by_diary_id_sqlite(pool: &SqlitePool, diary_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.slug, t.name, t.created_at
        FROM tags t
        JOIN diary_tags dt ON dt.tag_id = t.id
        WHERE dt.diary_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(diary_id)
    .fetch_all(pool)
    .await
    .context("Failed to get tags for diary")?;

    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query("INSERT INTO tags (slug, name, created_at) VALUES (?, ?, ?)")
        .bind(&tag.slug)
        .bind(&tag.name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        slug: tag.slug.clone(),
        name: tag.name.clone(),
        created_at: now,
    })
}

async fn get_tag_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, slug, name, created_at FROM tags WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by slug")?;

    Ok(row.map(|row| row_to_tag_mysql(&row)))
}

async fn get_tag_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, slug, name, created_at FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    Ok(row.map(|row| row_to_tag_mysql(&row)))
}

async fn list_tags_mysql(pool: &MySqlPool) -> Result<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, slug, name, created_at FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

async fn list_with_counts_mysql(pool: &MySqlPool, limit: i64) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.slug, t.name, COUNT(d.id) as diary_count
        FROM tags t
        LEFT JOIN diary_tags dt ON dt.tag_id = t.id
        LEFT JOIN diaries d ON d.id = dt.diary_id
            AND d.visibility = 'public' AND d.status = 'published'
        GROUP BY t.id, t.slug, t.name
        ORDER BY diary_count DESC, t.name ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list tags with counts")?;

    Ok(rows
        .iter()
        .map(|row| TagWithCount {
            id: row.get("id"),
            slug: row.get("slug"),
            name: row.get("name"),
            diary_count: row.get("diary_count"),
        })
        .collect())
}

async fn get_by_diary_id_mysql(pool: &MySqlPool, diary_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.slug, t.name, t.created_at
        FROM tags t
        JOIN diary_tags dt ON dt.tag_id = t.id
        WHERE dt.diary_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(diary_id)
    .fetch_all(pool)
    .await
    .context("Failed to get tags for diary")?;

    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}
