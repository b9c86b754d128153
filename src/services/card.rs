//! Lucky card service
//!
//! The daily draw: a weighted random pick over the seeded card catalog,
//! limited to one draw per user per UTC day.

use crate::db::repositories::CardRepository;
use crate::models::{CardDrawWithCard, ListParams, LuckyCard, PagedResult};
use anyhow::Context;
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;

/// Error types for card service operations
#[derive(Debug, thiserror::Error)]
pub enum CardServiceError {
    #[error("Already drawn today")]
    AlreadyDrawnToday,

    #[error("Card catalog is empty")]
    EmptyCatalog,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Card service
pub struct CardService {
    card_repo: Arc<dyn CardRepository>,
}

impl CardService {
    /// Create a new card service
    pub fn new(card_repo: Arc<dyn CardRepository>) -> Self {
        Self { card_repo }
    }

    /// The full card catalog
    pub async fn catalog(&self) -> Result<Vec<LuckyCard>, CardServiceError> {
        Ok(self
            .card_repo
            .list_cards()
            .await
            .context("Failed to list cards")?)
    }

    /// Draw a card for the user.
    ///
    /// At most one draw per UTC day; the pick is weighted by the catalog's
    /// per-card weights.
    pub async fn draw(&self, user_id: i64) -> Result<CardDrawWithCard, CardServiceError> {
        if self
            .card_repo
            .has_drawn_since(user_id, start_of_utc_day())
            .await
            .context("Failed to check draw history")?
        {
            return Err(CardServiceError::AlreadyDrawnToday);
        }

        let cards = self
            .card_repo
            .list_cards()
            .await
            .context("Failed to list cards")?;

        let card = pick_weighted(&cards, random_roll()?)
            .ok_or(CardServiceError::EmptyCatalog)?
            .clone();

        let draw = self
            .card_repo
            .record_draw(user_id, card.id)
            .await
            .context("Failed to record draw")?;

        Ok(CardDrawWithCard {
            id: draw.id,
            card,
            drawn_at: draw.drawn_at,
        })
    }

    /// The user's draw history, newest first
    pub async fn history(
        &self,
        user_id: i64,
        params: ListParams,
    ) -> Result<PagedResult<CardDrawWithCard>, CardServiceError> {
        let (items, total) = self
            .card_repo
            .list_draws(user_id, &params)
            .await
            .context("Failed to list draws")?;
        Ok(PagedResult::new(items, total, &params))
    }
}

/// Midnight of the current UTC day
fn start_of_utc_day() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// A uniformly random u64 from the OS entropy source
fn random_roll() -> Result<u64, CardServiceError> {
    let mut bytes = [0u8; 8];
    getrandom::fill(&mut bytes)
        .map_err(|e| anyhow::anyhow!("Failed to gather entropy: {}", e))?;
    Ok(u64::from_le_bytes(bytes))
}

/// Pick a card proportionally to its weight.
///
/// `roll` is reduced modulo the total weight; cards with nonpositive
/// weights are skipped.
fn pick_weighted(cards: &[LuckyCard], roll: u64) -> Option<&LuckyCard> {
    let total: u64 = cards
        .iter()
        .filter(|c| c.weight > 0)
        .map(|c| c.weight as u64)
        .sum();
    if total == 0 {
        return None;
    }

    let mut remaining = roll % total;
    for card in cards.iter().filter(|c| c.weight > 0) {
        let weight = card.weight as u64;
        if remaining < weight {
            return Some(card);
        }
        remaining -= weight;
    }

    None
}
