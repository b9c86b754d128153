//! Follow model
//!
//! A follow is a directed edge between two users. The relationship is
//! "mutual" when both directed edges exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Follow edge entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: i64,
    /// The user doing the following
    pub follower_id: i64,
    /// The user being followed
    pub followed_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Aggregate follow counts for a user profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowStats {
    pub followers: i64,
    pub following: i64,
}
