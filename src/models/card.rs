//! Lucky card model
//!
//! Lucky cards are cosmetic randomized collectibles. The catalog is seeded
//! by a migration; draws reference catalog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Card rarity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl fmt::Display for CardRarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common => write!(f, "common"),
            Self::Rare => write!(f, "rare"),
            Self::Epic => write!(f, "epic"),
            Self::Legendary => write!(f, "legendary"),
        }
    }
}

impl FromStr for CardRarity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "common" => Ok(Self::Common),
            "rare" => Ok(Self::Rare),
            "epic" => Ok(Self::Epic),
            "legendary" => Ok(Self::Legendary),
            _ => Err(anyhow::anyhow!("Invalid card rarity: {}", s)),
        }
    }
}

/// Catalog entry for a collectible card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuckyCard {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub rarity: CardRarity,
    /// Short fortune text shown with the card
    pub blessing: String,
    /// Relative draw weight within the catalog
    pub weight: i64,
}

/// A single draw performed by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDraw {
    pub id: i64,
    pub user_id: i64,
    pub card_id: i64,
    pub drawn_at: DateTime<Utc>,
}

/// A draw joined with its catalog entry, for history listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDrawWithCard {
    pub id: i64,
    pub card: LuckyCard,
    pub drawn_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rarity_roundtrip() {
        for rarity in [
            CardRarity::Common,
            CardRarity::Rare,
            CardRarity::Epic,
            CardRarity::Legendary,
        ] {
            assert_eq!(CardRarity::from_str(&rarity.to_string()).unwrap(), rarity);
        }
        assert!(CardRarity::from_str("mythic").is_err());
    }
}
