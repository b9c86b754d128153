//! Lucky card repository
//!
//! Database operations for the card catalog and draw history. The catalog
//! is seeded by a migration; this repository only reads it.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CardDraw, CardDrawWithCard, CardRarity, ListParams, LuckyCard};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Card repository trait
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// List the full card catalog
    async fn list_cards(&self) -> Result<Vec<LuckyCard>>;

    /// Get a catalog entry by ID
    async fn get_card_by_id(&self, id: i64) -> Result<Option<LuckyCard>>;

    /// Record a draw for a user
    async fn record_draw(&self, user_id: i64, card_id: i64) -> Result<CardDraw>;

    /// Whether the user has drawn at or after the given instant
    async fn has_drawn_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<bool>;

    /// The user's draw history joined with catalog entries, newest first
    async fn list_draws(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<CardDrawWithCard>, i64)>;
}

/// SQLx-based card repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCardRepository {
    pool: DynDatabasePool,
}

impl SqlxCardRepository {
    /// Create a new SQLx card repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CardRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CardRepository for SqlxCardRepository {
    async fn list_cards(&self) -> Result<Vec<LuckyCard>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_cards_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_cards_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn get_card_by_id(&self, id: i64) -> Result<Option<LuckyCard>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_card_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => get_card_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn record_draw(&self, user_id: i64, card_id: i64) -> Result<CardDraw> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                record_draw_sqlite(self.pool.as_sqlite().unwrap(), user_id, card_id).await
            }
            DatabaseDriver::Mysql => {
                record_draw_mysql(self.pool.as_mysql().unwrap(), user_id, card_id).await
            }
        }
    }

    async fn has_drawn_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM card_draws WHERE user_id = ? AND drawn_at >= ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(since)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to check draws")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(since)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to check draws")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn list_draws(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<CardDrawWithCard>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_draws_sqlite(self.pool.as_sqlite().unwrap(), user_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_draws_mysql(self.pool.as_mysql().unwrap(), user_id, params).await
            }
        }
    }
}

const CARD_COLUMNS: &str = "id, slug, name, rarity, blessing, weight";

const DRAW_JOIN_SQL: &str = r#"
    SELECT d.id as draw_id, d.drawn_at,
           c.id, c.slug, c.name, c.rarity, c.blessing, c.weight
    FROM card_draws d
    JOIN lucky_cards c ON c.id = d.card_id
    WHERE d.user_id = ?
    ORDER BY d.drawn_at DESC, d.id DESC
    LIMIT ? OFFSET ?
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_cards_sqlite(pool: &SqlitePool) -> Result<Vec<LuckyCard>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM lucky_cards ORDER BY weight DESC, id ASC",
        CARD_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list cards")?;

    let mut cards = Vec::new();
    for row in rows {
        cards.push(card_from_parts(
            row.get("id"),
            row.get("slug"),
            row.get("name"),
            row.get("rarity"),
            row.get("blessing"),
            row.get("weight"),
        )?);
    }
    Ok(cards)
}

async fn get_card_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<LuckyCard>> {
    let row = sqlx::query(&format!("SELECT {} FROM lucky_cards WHERE id = ?", CARD_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get card")?;

    match row {
        Some(row) => Ok(Some(card_from_parts(
            row.get("id"),
            row.get("slug"),
            row.get("name"),
            row.get("rarity"),
            row.get("blessing"),
            row.get("weight"),
        )?)),
        None => Ok(None),
    }
}

async fn record_draw_sqlite(pool: &SqlitePool, user_id: i64, card_id: i64) -> Result<CardDraw> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO card_draws (user_id, card_id, drawn_at) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(card_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to record draw")?;

    Ok(CardDraw {
        id: result.last_insert_rowid(),
        user_id,
        card_id,
        drawn_at: now,
    })
}

async fn list_draws_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    params: &ListParams,
) -> Result<(Vec<CardDrawWithCard>, i64)> {
    let rows = sqlx::query(DRAW_JOIN_SQL)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list draws")?;

    let mut draws = Vec::new();
    for row in rows {
        draws.push(CardDrawWithCard {
            id: row.get("draw_id"),
            card: card_from_parts(
                row.get("id"),
                row.get("slug"),
                row.get("name"),
                row.get("rarity"),
                row.get("blessing"),
                row.get("weight"),
            )?,
            drawn_at: row.get("drawn_at"),
        });
    }

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM card_draws WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count draws")?
        .get("count");

    Ok((draws, total))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_cards_mysql(pool: &MySqlPool) -> Result<Vec<LuckyCard>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM lucky_cards ORDER BY weight DESC, id ASC",
        CARD_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list cards")?;

    let mut cards = Vec::new();
    for row in rows {
        cards.push(card_from_parts(
            row.get("id"),
            row.get("slug"),
            row.get("name"),
            row.get("rarity"),
            row.get("blessing"),
            row.get("weight"),
        )?);
    }
    Ok(cards)
}

async fn get_card_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<LuckyCard>> {
    let row = sqlx::query(&format!("SELECT {} FROM lucky_cards WHERE id = ?", CARD_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get card")?;

    match row {
        Some(row) => Ok(Some(card_from_parts(
            row.get("id"),
            row.get("slug"),
            row.get("name"),
            row.get("rarity"),
            row.get("blessing"),
            row.get("weight"),
        )?)),
        None => Ok(None),
    }
}

async fn record_draw_mysql(pool: &MySqlPool, user_id: i64, card_id: i64) -> Result<CardDraw> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO card_draws (user_id, card_id, drawn_at) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(card_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to record draw")?;

    Ok(CardDraw {
        id: result.last_insert_id() as i64,
        user_id,
        card_id,
        drawn_at: now,
    })
}

async fn list_draws_mysql(
    pool: &MySqlPool,
    user_id: i64,
    params: &ListParams,
) -> Result<(Vec<CardDrawWithCard>, i64)> {
    let rows = sqlx::query(DRAW_JOIN_SQL)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list draws")?;

    let mut draws = Vec::new();
    for row in rows {
        draws.push(CardDrawWithCard {
            id: row.get("draw_id"),
            card: card_from_parts(
                row.get("id"),
                row.get("slug"),
                row.get("name"),
                row.get("rarity"),
                row.get("blessing"),
                row.get("weight"),
            )?,
            drawn_at: row.get("drawn_at"),
        });
    }

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM card_draws WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count draws")?
        .get("count");

    Ok((draws, total))
}

fn card_from_parts(
    id: i64,
    slug: String,
    name: String,
    rarity: String,
    blessing: String,
    weight: i64,
) -> Result<LuckyCard> {
    Ok(LuckyCard {
        id,
        slug,
        name,
        rarity: CardRarity::from_str(&rarity)
            .with_context(|| format!("Invalid card rarity: {}", rarity))?,
        blessing,
        weight,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Duration;

    async fn setup() -> (DynDatabasePool, SqlxCardRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let user = user_repo
            .create(&User::new(
                "drawer".to_string(),
                "drawer@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        (pool.clone(), SqlxCardRepository::new(pool), user.id)
    }

    #[tokio::test]
    async fn test_catalog_is_seeded_with_positive_weights() {
        let (_pool, repo, _user) = setup().await;

        let cards = repo.list_cards().await.unwrap();
        assert_eq!(cards.len(), 7);
        assert!(cards.iter().all(|c| c.weight > 0));
        // Highest weight first
        assert!(cards[0].weight >= cards[cards.len() - 1].weight);
    }

    #[tokio::test]
    async fn test_record_and_list_draws() {
        let (_pool, repo, user) = setup().await;
        let cards = repo.list_cards().await.unwrap();

        repo.record_draw(user, cards[0].id).await.unwrap();
        repo.record_draw(user, cards[1].id).await.unwrap();

        let (draws, total) = repo.list_draws(user, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].card.id, cards[1].id);
    }

    #[tokio::test]
    async fn test_has_drawn_since() {
        let (_pool, repo, user) = setup().await;
        let cards = repo.list_cards().await.unwrap();

        assert!(!repo
            .has_drawn_since(user, Utc::now() - Duration::hours(1))
            .await
            .unwrap());

        repo.record_draw(user, cards[0].id).await.unwrap();

        assert!(repo
            .has_drawn_since(user, Utc::now() - Duration::hours(1))
            .await
            .unwrap());
        assert!(!repo
            .has_drawn_since(user, Utc::now() + Duration::hours(1))
            .await
            .unwrap());
    }
}
