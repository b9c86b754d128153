//! Lucky card API endpoints
//!
//! - GET /api/v1/cards - Card catalog
//! - POST /api/v1/cards/draw - Daily draw
//! - GET /api/v1/cards/mine - Draw history

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CardDrawWithCard, LuckyCard};

/// A catalog card
#[derive(Debug, Serialize)]
pub struct CardResponse {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub rarity: String,
    pub blessing: String,
}

impl From<LuckyCard> for CardResponse {
    fn from(card: LuckyCard) -> Self {
        Self {
            id: card.id,
            slug: card.slug,
            name: card.name,
            rarity: card.rarity.to_string(),
            blessing: card.blessing,
        }
    }
}

/// A draw with its card
#[derive(Debug, Serialize)]
pub struct DrawResponse {
    pub id: i64,
    pub card: CardResponse,
    pub drawn_at: String,
}

impl From<CardDrawWithCard> for DrawResponse {
    fn from(draw: CardDrawWithCard) -> Self {
        Self {
            id: draw.id,
            card: draw.card.into(),
            drawn_at: draw.drawn_at.to_rfc3339(),
        }
    }
}

/// Paged draw history
#[derive(Debug, Serialize)]
pub struct DrawHistoryResponse {
    pub draws: Vec<DrawResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Build public card routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_cards))
}

/// Build routes that require authentication
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/draw", post(draw_card))
        .route("/mine", get(my_draws))
}

/// GET /api/v1/cards - The card catalog
async fn list_cards(
    State(state): State<AppState>,
) -> Result<Json<Vec<CardResponse>>, ApiError> {
    let cards = state.card_service.catalog().await?;
    Ok(Json(cards.into_iter().map(CardResponse::from).collect()))
}

/// POST /api/v1/cards/draw - Draw today's card
///
/// A second draw on the same UTC day returns CONFLICT.
async fn draw_card(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<DrawResponse>, ApiError> {
    let draw = state.card_service.draw(user.id).await?;
    Ok(Json(draw.into()))
}

/// GET /api/v1/cards/mine - The caller's draw history
async fn my_draws(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<DrawHistoryResponse>, ApiError> {
    let page = state.card_service.history(user.id, query.params()).await?;

    Ok(Json(DrawHistoryResponse {
        total: page.total,
        page: page.page,
        page_size: page.per_page,
        draws: page.items.into_iter().map(DrawResponse::from).collect(),
    }))
}
