//! Comment repository
//!
//! Database operations for comments and likes. Likes live here because they
//! target both diaries and comments and are listed alongside comment
//! metadata.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentWithMeta, CreateCommentInput, LikeTargetType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, input: &CreateCommentInput, user_id: i64) -> Result<Comment>;

    /// Get comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Get all comments for a diary, threaded one level, with author and
    /// like metadata. `viewer_id` drives the `is_liked` flag.
    async fn get_by_diary(&self, diary_id: i64, viewer_id: Option<i64>)
        -> Result<Vec<CommentWithMeta>>;

    /// Delete a comment (replies cascade), returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count all comments
    async fn count(&self) -> Result<i64>;

    /// Record a like; returns false if the user already liked the target
    async fn add_like(&self, target_type: LikeTargetType, target_id: i64, user_id: i64)
        -> Result<bool>;

    /// Remove a like; returns false if there was nothing to remove
    async fn remove_like(
        &self,
        target_type: LikeTargetType,
        target_id: i64,
        user_id: i64,
    ) -> Result<bool>;

    /// Check whether the user has liked the target
    async fn is_liked(&self, target_type: LikeTargetType, target_id: i64, user_id: i64)
        -> Result<bool>;

    /// Count likes on a target
    async fn like_count(&self, target_type: LikeTargetType, target_id: i64) -> Result<i64>;

    /// Count all likes
    async fn count_likes(&self) -> Result<i64>;

    /// Remove likes that reference a diary or its comments.
    ///
    /// Likes have no FK to their target (the target is polymorphic), so this
    /// must run before the diary row is deleted.
    async fn delete_likes_for_diary(&self, diary_id: i64) -> Result<()>;
}

/// SQLx-based comment repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    /// Create a new SQLx comment repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput, user_id: i64) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_sqlite(self.pool.as_sqlite().unwrap(), input, user_id).await
            }
            DatabaseDriver::Mysql => {
                create_mysql(self.pool.as_mysql().unwrap(), input, user_id).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_by_diary(
        &self,
        diary_id: i64,
        viewer_id: Option<i64>,
    ) -> Result<Vec<CommentWithMeta>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_diary_sqlite(self.pool.as_sqlite().unwrap(), diary_id, viewer_id).await
            }
            DatabaseDriver::Mysql => {
                get_by_diary_mysql(self.pool.as_mysql().unwrap(), diary_id, viewer_id).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM comments WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM comments";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count comments")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count comments")?
                .get("count"),
        };
        Ok(count)
    }

    async fn add_like(
        &self,
        target_type: LikeTargetType,
        target_id: i64,
        user_id: i64,
    ) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT OR IGNORE INTO likes (target_type, target_id, user_id, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(target_type.to_string())
            .bind(target_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(self.pool.as_sqlite().unwrap())
            .await
            .context("Failed to add like")?
            .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(
                "INSERT IGNORE INTO likes (target_type, target_id, user_id, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(target_type.to_string())
            .bind(target_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(self.pool.as_mysql().unwrap())
            .await
            .context("Failed to add like")?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn remove_like(
        &self,
        target_type: LikeTargetType,
        target_id: i64,
        user_id: i64,
    ) -> Result<bool> {
        let sql = "DELETE FROM likes WHERE target_type = ? AND target_id = ? AND user_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(target_type.to_string())
                .bind(target_id)
                .bind(user_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to remove like")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(target_type.to_string())
                .bind(target_id)
                .bind(user_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to remove like")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn is_liked(
        &self,
        target_type: LikeTargetType,
        target_id: i64,
        user_id: i64,
    ) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM likes WHERE target_type = ? AND target_id = ? AND user_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(target_type.to_string())
                .bind(target_id)
                .bind(user_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to check like")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(target_type.to_string())
                .bind(target_id)
                .bind(user_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to check like")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn like_count(&self, target_type: LikeTargetType, target_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM likes WHERE target_type = ? AND target_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(target_type.to_string())
                .bind(target_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count likes")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(target_type.to_string())
                .bind(target_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count likes")?
                .get("count"),
        };
        Ok(count)
    }

    async fn count_likes(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM likes";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count likes")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count likes")?
                .get("count"),
        };
        Ok(count)
    }

    async fn delete_likes_for_diary(&self, diary_id: i64) -> Result<()> {
        let comment_likes = "DELETE FROM likes WHERE target_type = 'comment' AND target_id IN (SELECT id FROM comments WHERE diary_id = ?)";
        let diary_likes = "DELETE FROM likes WHERE target_type = 'diary' AND target_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.as_sqlite().unwrap();
                sqlx::query(comment_likes)
                    .bind(diary_id)
                    .execute(pool)
                    .await
                    .context("Failed to delete comment likes for diary")?;
                sqlx::query(diary_likes)
                    .bind(diary_id)
                    .execute(pool)
                    .await
                    .context("Failed to delete diary likes")?;
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.as_mysql().unwrap();
                sqlx::query(comment_likes)
                    .bind(diary_id)
                    .execute(pool)
                    .await
                    .context("Failed to delete comment likes for diary")?;
                sqlx::query(diary_likes)
                    .bind(diary_id)
                    .execute(pool)
                    .await
                    .context("Failed to delete diary likes")?;
            }
        }
        Ok(())
    }
}

/// Assemble a flat comment list into a one-level thread.
///
/// Replies to replies are attached to the top-level ancestor's reply list in
/// listing order.
fn build_thread(flat: Vec<CommentWithMeta>) -> Vec<CommentWithMeta> {
    // Map reply IDs to their top-level ancestor
    let mut top_level_of: HashMap<i64, i64> = HashMap::new();
    for comment in &flat {
        match comment.parent_id {
            None => {
                top_level_of.insert(comment.id, comment.id);
            }
            Some(parent_id) => {
                let root = top_level_of.get(&parent_id).copied().unwrap_or(parent_id);
                top_level_of.insert(comment.id, root);
            }
        }
    }

    let mut roots: Vec<CommentWithMeta> = Vec::new();
    let mut index_of: HashMap<i64, usize> = HashMap::new();

    for comment in flat {
        match comment.parent_id {
            None => {
                index_of.insert(comment.id, roots.len());
                roots.push(comment);
            }
            Some(_) => {
                let root_id = top_level_of.get(&comment.id).copied().unwrap_or(0);
                if let Some(&idx) = index_of.get(&root_id) {
                    roots[idx].replies.push(comment);
                }
                // Orphaned replies (root missing) are dropped
            }
        }
    }

    roots
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(
    pool: &SqlitePool,
    input: &CreateCommentInput,
    user_id: i64,
) -> Result<Comment> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO comments (diary_id, user_id, parent_id, content, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.diary_id)
    .bind(user_id)
    .bind(input.parent_id)
    .bind(&input.content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        diary_id: input.diary_id,
        user_id,
        parent_id: input.parent_id,
        content: input.content.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(
        "SELECT id, diary_id, user_id, parent_id, content, created_at, updated_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment by ID")?;

    Ok(row.map(|row| Comment {
        id: row.get("id"),
        diary_id: row.get("diary_id"),
        user_id: row.get("user_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

async fn get_by_diary_sqlite(
    pool: &SqlitePool,
    diary_id: i64,
    viewer_id: Option<i64>,
) -> Result<Vec<CommentWithMeta>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.diary_id, c.user_id, c.parent_id, c.content, c.created_at,
               u.username, u.display_name, u.avatar, u.email,
               (SELECT COUNT(*) FROM likes l
                WHERE l.target_type = 'comment' AND l.target_id = c.id) as like_count,
               EXISTS(SELECT 1 FROM likes l
                WHERE l.target_type = 'comment' AND l.target_id = c.id AND l.user_id = ?) as is_liked
        FROM comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.diary_id = ?
        ORDER BY c.created_at ASC, c.id ASC
        "#,
    )
    .bind(viewer_id.unwrap_or(-1))
    .bind(diary_id)
    .fetch_all(pool)
    .await
    .context("Failed to get comments for diary")?;

    let mut flat = Vec::new();
    for row in rows {
        flat.push(comment_meta_from_row(
            row.get("id"),
            row.get("diary_id"),
            row.get("user_id"),
            row.get("parent_id"),
            row.get("content"),
            row.get("created_at"),
            row.get("username"),
            row.get("display_name"),
            row.get("avatar"),
            row.get("email"),
            row.get("like_count"),
            row.get::<i64, _>("is_liked") != 0,
        ));
    }

    Ok(build_thread(flat))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(
    pool: &MySqlPool,
    input: &CreateCommentInput,
    user_id: i64,
) -> Result<Comment> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO comments (diary_id, user_id, parent_id, content, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.diary_id)
    .bind(user_id)
    .bind(input.parent_id)
    .bind(&input.content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        diary_id: input.diary_id,
        user_id,
        parent_id: input.parent_id,
        content: input.content.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(
        "SELECT id, diary_id, user_id, parent_id, content, created_at, updated_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment by ID")?;

    Ok(row.map(|row| Comment {
        id: row.get("id"),
        diary_id: row.get("diary_id"),
        user_id: row.get("user_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

async fn get_by_diary_mysql(
    pool: &MySqlPool,
    diary_id: i64,
    viewer_id: Option<i64>,
) -> Result<Vec<CommentWithMeta>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.diary_id, c.user_id, c.parent_id, c.content, c.created_at,
               u.username, u.display_name, u.avatar, u.email,
               (SELECT COUNT(*) FROM likes l
                WHERE l.target_type = 'comment' AND l.target_id = c.id) as like_count,
               EXISTS(SELECT 1 FROM likes l
                WHERE l.target_type = 'comment' AND l.target_id = c.id AND l.user_id = ?) as is_liked
        FROM comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.diary_id = ?
        ORDER BY c.created_at ASC, c.id ASC
        "#,
    )
    .bind(viewer_id.unwrap_or(-1))
    .bind(diary_id)
    .fetch_all(pool)
    .await
    .context("Failed to get comments for diary")?;

    let mut flat = Vec::new();
    for row in rows {
        flat.push(comment_meta_from_row(
            row.get("id"),
            row.get("diary_id"),
            row.get("user_id"),
            row.get("parent_id"),
            row.get("content"),
            row.get("created_at"),
            row.get("username"),
            row.get("display_name"),
            row.get("avatar"),
            row.get("email"),
            row.get("like_count"),
            row.get::<i64, _>("is_liked") != 0,
        ));
    }

    Ok(build_thread(flat))
}

#[allow(clippy::too_many_arguments)]
fn comment_meta_from_row(
    id: i64,
    diary_id: i64,
    user_id: i64,
    parent_id: Option<i64>,
    content: String,
    created_at: chrono::DateTime<Utc>,
    username: String,
    display_name: Option<String>,
    avatar: Option<String>,
    email: String,
    like_count: i64,
    is_liked: bool,
) -> CommentWithMeta {
    let author_name = display_name.unwrap_or_else(|| username.clone());
    let avatar_url = avatar.unwrap_or_else(|| CommentWithMeta::gravatar_url(&email));

    CommentWithMeta {
        id,
        diary_id,
        user_id,
        parent_id,
        content,
        created_at,
        author_name,
        avatar_url,
        like_count,
        is_liked,
        replies: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{DiaryRepository, SqlxDiaryRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Diary, DiaryStatus, DiaryVisibility, User, UserRole};

    async fn setup() -> (DynDatabasePool, SqlxCommentRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let user = user_repo
            .create(&User::new(
                "commenter".to_string(),
                "commenter@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        let diary_repo = SqlxDiaryRepository::new(pool.clone());
        let diary = diary_repo
            .create(&Diary::new(
                user.id,
                "day".to_string(),
                "text".to_string(),
                DiaryVisibility::Public,
                DiaryStatus::Published,
            ))
            .await
            .unwrap();

        (pool.clone(), SqlxCommentRepository::new(pool), user.id, diary.id)
    }

    fn input(diary_id: i64, parent_id: Option<i64>, content: &str) -> CreateCommentInput {
        CreateCommentInput {
            diary_id,
            parent_id,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_comments() {
        let (_pool, repo, user, diary) = setup().await;

        let first = repo.create(&input(diary, None, "first"), user).await.unwrap();
        repo.create(&input(diary, Some(first.id), "reply"), user)
            .await
            .unwrap();

        let thread = repo.get_by_diary(diary, None).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].content, "first");
        assert_eq!(thread[0].replies.len(), 1);
        assert_eq!(thread[0].replies[0].content, "reply");
    }

    #[tokio::test]
    async fn test_nested_reply_attaches_to_top_level() {
        let (_pool, repo, user, diary) = setup().await;

        let root = repo.create(&input(diary, None, "root"), user).await.unwrap();
        let reply = repo
            .create(&input(diary, Some(root.id), "reply"), user)
            .await
            .unwrap();
        repo.create(&input(diary, Some(reply.id), "reply to reply"), user)
            .await
            .unwrap();

        let thread = repo.get_by_diary(diary, None).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].replies.len(), 2);
    }

    #[tokio::test]
    async fn test_like_toggle_cycle() {
        let (_pool, repo, user, diary) = setup().await;

        assert!(repo.add_like(LikeTargetType::Diary, diary, user).await.unwrap());
        // Second like is a no-op
        assert!(!repo.add_like(LikeTargetType::Diary, diary, user).await.unwrap());
        assert!(repo.is_liked(LikeTargetType::Diary, diary, user).await.unwrap());
        assert_eq!(repo.like_count(LikeTargetType::Diary, diary).await.unwrap(), 1);

        assert!(repo.remove_like(LikeTargetType::Diary, diary, user).await.unwrap());
        assert!(!repo.remove_like(LikeTargetType::Diary, diary, user).await.unwrap());
        assert_eq!(repo.like_count(LikeTargetType::Diary, diary).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_comment_like_metadata_in_listing() {
        let (_pool, repo, user, diary) = setup().await;

        let comment = repo.create(&input(diary, None, "likable"), user).await.unwrap();
        repo.add_like(LikeTargetType::Comment, comment.id, user)
            .await
            .unwrap();

        let thread = repo.get_by_diary(diary, Some(user)).await.unwrap();
        assert_eq!(thread[0].like_count, 1);
        assert!(thread[0].is_liked);

        let anonymous = repo.get_by_diary(diary, None).await.unwrap();
        assert!(!anonymous[0].is_liked);
    }

    #[tokio::test]
    async fn test_delete_comment_cascades_replies() {
        let (_pool, repo, user, diary) = setup().await;

        let root = repo.create(&input(diary, None, "root"), user).await.unwrap();
        repo.create(&input(diary, Some(root.id), "reply"), user)
            .await
            .unwrap();

        assert!(repo.delete(root.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_likes_for_diary() {
        let (_pool, repo, user, diary) = setup().await;

        let comment = repo.create(&input(diary, None, "c"), user).await.unwrap();
        repo.add_like(LikeTargetType::Diary, diary, user).await.unwrap();
        repo.add_like(LikeTargetType::Comment, comment.id, user).await.unwrap();
        assert_eq!(repo.count_likes().await.unwrap(), 2);

        repo.delete_likes_for_diary(diary).await.unwrap();

        assert_eq!(repo.count_likes().await.unwrap(), 0);
    }
}
