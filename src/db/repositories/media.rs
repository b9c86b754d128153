//! Media repository
//!
//! Database operations for uploaded media files.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Media;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Media repository trait
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Record an uploaded file
    async fn create(&self, media: &Media) -> Result<Media>;

    /// Get media by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Media>>;

    /// Attach an uploaded file to a diary; returns false when the media
    /// doesn't exist or belongs to another uploader
    async fn attach_to_diary(&self, id: i64, diary_id: i64, uploader_id: i64) -> Result<bool>;

    /// List media attached to a diary
    async fn list_by_diary(&self, diary_id: i64) -> Result<Vec<Media>>;

    /// Delete a media record, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based media repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxMediaRepository {
    pool: DynDatabasePool,
}

impl SqlxMediaRepository {
    /// Create a new SQLx media repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MediaRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MediaRepository for SqlxMediaRepository {
    async fn create(&self, media: &Media) -> Result<Media> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), media).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), media).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Media>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn attach_to_diary(&self, id: i64, diary_id: i64, uploader_id: i64) -> Result<bool> {
        let sql = "UPDATE media SET diary_id = ? WHERE id = ? AND uploader_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(diary_id)
                .bind(id)
                .bind(uploader_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to attach media")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(diary_id)
                .bind(id)
                .bind(uploader_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to attach media")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_by_diary(&self, diary_id: i64) -> Result<Vec<Media>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_diary_sqlite(self.pool.as_sqlite().unwrap(), diary_id).await
            }
            DatabaseDriver::Mysql => {
                list_by_diary_mysql(self.pool.as_mysql().unwrap(), diary_id).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM media WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to delete media")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to delete media")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

const MEDIA_COLUMNS: &str =
    "id, uploader_id, diary_id, url, filename, content_type, size, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, media: &Media) -> Result<Media> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO media (uploader_id, diary_id, url, filename, content_type, size, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(media.uploader_id)
    .bind(media.diary_id)
    .bind(&media.url)
    .bind(&media.filename)
    .bind(&media.content_type)
    .bind(media.size)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create media record")?;

    Ok(Media {
        id: result.last_insert_rowid(),
        created_at: now,
        ..media.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Media>> {
    let row = sqlx::query(&format!("SELECT {} FROM media WHERE id = ?", MEDIA_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get media")?;

    Ok(row.map(|row| row_to_media_sqlite(&row)))
}

async fn list_by_diary_sqlite(pool: &SqlitePool, diary_id: i64) -> Result<Vec<Media>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM media WHERE diary_id = ? ORDER BY created_at ASC",
        MEDIA_COLUMNS
    ))
    .bind(diary_id)
    .fetch_all(pool)
    .await
    .context("Failed to list media for diary")?;

    Ok(rows.iter().map(row_to_media_sqlite).collect())
}

fn row_to_media_sqlite(row: &sqlx::sqlite::SqliteRow) -> Media {
    Media {
        id: row.get("id"),
        uploader_id: row.get("uploader_id"),
        diary_id: row.get("diary_id"),
        url: row.get("url"),
        filename: row.get("filename"),
        content_type: row.get("content_type"),
        size: row.get("size"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, media: &Media) -> Result<Media> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO media (uploader_id, diary_id, url, filename, content_type, size, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(media.uploader_id)
    .bind(media.diary_id)
    .bind(&media.url)
    .bind(&media.filename)
    .bind(&media.content_type)
    .bind(media.size)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create media record")?;

    Ok(Media {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..media.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Media>> {
    let row = sqlx::query(&format!("SELECT {} FROM media WHERE id = ?", MEDIA_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get media")?;

    Ok(row.map(|row| row_to_media_mysql(&row)))
}

async fn list_by_diary_mysql(pool: &MySqlPool, diary_id: i64) -> Result<Vec<Media>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM media WHERE diary_id = ? ORDER BY created_at ASC",
        MEDIA_COLUMNS
    ))
    .bind(diary_id)
    .fetch_all(pool)
    .await
    .context("Failed to list media for diary")?;

    Ok(rows.iter().map(row_to_media_mysql).collect())
}

fn row_to_media_mysql(row: &sqlx::mysql::MySqlRow) -> Media {
    Media {
        id: row.get("id"),
        uploader_id: row.get("uploader_id"),
        diary_id: row.get("diary_id"),
        url: row.get("url"),
        filename: row.get("filename"),
        content_type: row.get("content_type"),
        size: row.get("size"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{DiaryRepository, SqlxDiaryRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Diary, DiaryStatus, DiaryVisibility, User, UserRole};

    async fn setup() -> (DynDatabasePool, SqlxMediaRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let user = user_repo
            .create(&User::new(
                "uploader".to_string(),
                "uploader@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        let diary_repo = SqlxDiaryRepository::new(pool.clone());
        let diary = diary_repo
            .create(&Diary::new(
                user.id,
                "with photos".to_string(),
                "text".to_string(),
                DiaryVisibility::Public,
                DiaryStatus::Published,
            ))
            .await
            .unwrap();

        (pool.clone(), SqlxMediaRepository::new(pool), user.id, diary.id)
    }

    fn make_media(uploader_id: i64) -> Media {
        Media {
            id: 0,
            uploader_id,
            diary_id: None,
            url: "/uploads/abc.jpg".to_string(),
            filename: "abc.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            size: 1024,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_attach() {
        let (_pool, repo, user, diary) = setup().await;

        let media = repo.create(&make_media(user)).await.unwrap();
        assert!(media.id > 0);
        assert!(media.diary_id.is_none());

        assert!(repo.attach_to_diary(media.id, diary, user).await.unwrap());

        let listed = repo.list_by_diary(diary).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].url, "/uploads/abc.jpg");
    }

    #[tokio::test]
    async fn test_attach_rejects_foreign_uploader() {
        let (_pool, repo, user, diary) = setup().await;

        let media = repo.create(&make_media(user)).await.unwrap();

        // Some other user cannot claim the upload
        assert!(!repo.attach_to_diary(media.id, diary, user + 99).await.unwrap());
        assert!(repo.list_by_diary(diary).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_media() {
        let (_pool, repo, user, _diary) = setup().await;

        let media = repo.create(&make_media(user)).await.unwrap();
        assert!(repo.delete(media.id).await.unwrap());
        assert!(repo.get_by_id(media.id).await.unwrap().is_none());
    }
}
