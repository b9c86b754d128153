//! Follow repository
//!
//! Database operations for the directed follow graph.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{FollowStats, ListParams, User, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Follow repository trait
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Create a follow edge; returns false if it already exists
    async fn create(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Remove a follow edge; returns false if it didn't exist
    async fn delete(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Check whether the edge exists
    async fn exists(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Follower/following counts for a user
    async fn stats(&self, user_id: i64) -> Result<FollowStats>;

    /// Users following the given user, newest edges first
    async fn list_followers(&self, user_id: i64, params: &ListParams)
        -> Result<(Vec<User>, i64)>;

    /// Users the given user follows, newest edges first
    async fn list_following(&self, user_id: i64, params: &ListParams)
        -> Result<(Vec<User>, i64)>;

    /// Count all follow edges
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based follow repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    /// Create a new SQLx follow repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn create(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT OR IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(follower_id)
            .bind(followed_id)
            .bind(Utc::now())
            .execute(self.pool.as_sqlite().unwrap())
            .await
            .context("Failed to create follow")?
            .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(
                "INSERT IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(follower_id)
            .bind(followed_id)
            .bind(Utc::now())
            .execute(self.pool.as_mysql().unwrap())
            .await
            .context("Failed to create follow")?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let sql = "DELETE FROM follows WHERE follower_id = ? AND followed_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(follower_id)
                .bind(followed_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to delete follow")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(follower_id)
                .bind(followed_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to delete follow")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let sql =
            "SELECT COUNT(*) as count FROM follows WHERE follower_id = ? AND followed_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(follower_id)
                .bind(followed_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to check follow")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(follower_id)
                .bind(followed_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to check follow")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn stats(&self, user_id: i64) -> Result<FollowStats> {
        let sql = r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE followed_id = ?) as followers,
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?) as following
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(user_id)
                    .bind(user_id)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get follow stats")?;
                Ok(FollowStats {
                    followers: row.get("followers"),
                    following: row.get("following"),
                })
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(user_id)
                    .bind(user_id)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get follow stats")?;
                Ok(FollowStats {
                    followers: row.get("followers"),
                    following: row.get("following"),
                })
            }
        }
    }

    async fn list_followers(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<User>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_edge_users_sqlite(self.pool.as_sqlite().unwrap(), user_id, params, true).await
            }
            DatabaseDriver::Mysql => {
                list_edge_users_mysql(self.pool.as_mysql().unwrap(), user_id, params, true).await
            }
        }
    }

    async fn list_following(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<User>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_edge_users_sqlite(self.pool.as_sqlite().unwrap(), user_id, params, false).await
            }
            DatabaseDriver::Mysql => {
                list_edge_users_mysql(self.pool.as_mysql().unwrap(), user_id, params, false).await
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM follows";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count follows")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count follows")?
                .get("count"),
        };
        Ok(count)
    }
}

/// Build the SQL for follower/following listings.
///
/// `followers` selects users who follow `user_id`; otherwise users whom
/// `user_id` follows.
fn edge_sql(followers: bool) -> (String, String) {
    let (join_on, filter_on) = if followers {
        ("f.follower_id", "f.followed_id")
    } else {
        ("f.followed_id", "f.follower_id")
    };
    let list = format!(
        r#"
        SELECT u.id, u.username, u.email, u.password_hash, u.role, u.status,
               u.display_name, u.avatar, u.bio, u.created_at, u.updated_at
        FROM users u
        JOIN follows f ON u.id = {}
        WHERE {} = ?
        ORDER BY f.created_at DESC
        LIMIT ? OFFSET ?
        "#,
        join_on, filter_on
    );
    let count = format!(
        "SELECT COUNT(*) as count FROM follows f WHERE {} = ?",
        filter_on
    );
    (list, count)
}

async fn list_edge_users_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    params: &ListParams,
    followers: bool,
) -> Result<(Vec<User>, i64)> {
    let (list_sql, count_sql) = edge_sql(followers);

    let rows = sqlx::query(&list_sql)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list follow edge users")?;

    let mut users = Vec::new();
    for row in rows {
        users.push(edge_row_to_user(
            row.get("id"),
            row.get("username"),
            row.get("email"),
            row.get("password_hash"),
            row.get("role"),
            row.get("status"),
            row.get("display_name"),
            row.get("avatar"),
            row.get("bio"),
            row.get("created_at"),
            row.get("updated_at"),
        )?);
    }

    let total: i64 = sqlx::query(&count_sql)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count follow edges")?
        .get("count");

    Ok((users, total))
}

async fn list_edge_users_mysql(
    pool: &MySqlPool,
    user_id: i64,
    params: &ListParams,
    followers: bool,
) -> Result<(Vec<User>, i64)> {
    let (list_sql, count_sql) = edge_sql(followers);

    let rows = sqlx::query(&list_sql)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list follow edge users")?;

    let mut users = Vec::new();
    for row in rows {
        users.push(edge_row_to_user(
            row.get("id"),
            row.get("username"),
            row.get("email"),
            row.get("password_hash"),
            row.get("role"),
            row.get("status"),
            row.get("display_name"),
            row.get("avatar"),
            row.get("bio"),
            row.get("created_at"),
            row.get("updated_at"),
        )?);
    }

    let total: i64 = sqlx::query(&count_sql)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count follow edges")?
        .get("count");

    Ok((users, total))
}

#[allow(clippy::too_many_arguments)]
fn edge_row_to_user(
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    status: String,
    display_name: Option<String>,
    avatar: Option<String>,
    bio: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
) -> Result<User> {
    Ok(User {
        id,
        username,
        email,
        password_hash,
        role: UserRole::from_str(&role).with_context(|| format!("Invalid role: {}", role))?,
        status: UserStatus::from_str(&status).unwrap_or(UserStatus::Active),
        display_name,
        avatar,
        bio,
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserRole;

    async fn setup() -> (DynDatabasePool, SqlxFollowRepository, i64, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["ada", "ben", "cal"] {
            let user = user_repo
                .create(&User::new(
                    name.to_string(),
                    format!("{}@example.com", name),
                    "hash".to_string(),
                    UserRole::Member,
                ))
                .await
                .unwrap();
            ids.push(user.id);
        }

        (pool.clone(), SqlxFollowRepository::new(pool), ids[0], ids[1], ids[2])
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let (_pool, repo, ada, ben, _cal) = setup().await;

        assert!(repo.create(ada, ben).await.unwrap());
        // Duplicate follow is a no-op
        assert!(!repo.create(ada, ben).await.unwrap());
        assert!(repo.exists(ada, ben).await.unwrap());
        assert!(!repo.exists(ben, ada).await.unwrap());

        assert!(repo.delete(ada, ben).await.unwrap());
        assert!(!repo.delete(ada, ben).await.unwrap());
        assert!(!repo.exists(ada, ben).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_track_both_directions() {
        let (_pool, repo, ada, ben, cal) = setup().await;

        repo.create(ada, ben).await.unwrap();
        repo.create(cal, ben).await.unwrap();
        repo.create(ben, ada).await.unwrap();

        let ben_stats = repo.stats(ben).await.unwrap();
        assert_eq!(ben_stats.followers, 2);
        assert_eq!(ben_stats.following, 1);

        let ada_stats = repo.stats(ada).await.unwrap();
        assert_eq!(ada_stats.followers, 1);
        assert_eq!(ada_stats.following, 1);
    }

    #[tokio::test]
    async fn test_mutual_follow_is_two_edges() {
        let (_pool, repo, ada, ben, _cal) = setup().await;

        repo.create(ada, ben).await.unwrap();
        assert!(repo.exists(ada, ben).await.unwrap() && !repo.exists(ben, ada).await.unwrap());

        repo.create(ben, ada).await.unwrap();
        assert!(repo.exists(ada, ben).await.unwrap() && repo.exists(ben, ada).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_followers_and_following() {
        let (_pool, repo, ada, ben, cal) = setup().await;

        repo.create(ada, ben).await.unwrap();
        repo.create(cal, ben).await.unwrap();

        let (followers, total) = repo
            .list_followers(ben, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        let names: Vec<_> = followers.iter().map(|u| u.username.as_str()).collect();
        assert!(names.contains(&"ada") && names.contains(&"cal"));

        let (following, total) = repo
            .list_following(ada, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(following[0].username, "ben");
    }

    #[tokio::test]
    async fn test_unfollow_restores_counts() {
        let (_pool, repo, ada, ben, _cal) = setup().await;

        repo.create(ada, ben).await.unwrap();
        assert_eq!(repo.stats(ben).await.unwrap().followers, 1);

        repo.delete(ada, ben).await.unwrap();
        assert_eq!(repo.stats(ben).await.unwrap().followers, 0);
    }
}
