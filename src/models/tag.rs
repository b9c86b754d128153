//! Tag model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Keyword tag entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug (unique)
    pub slug: String,
    /// Display name
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Tag with the number of public diaries that use it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub diary_count: i64,
}
