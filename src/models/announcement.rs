//! Announcement model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Admin-authored broadcast message shown to all users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an announcement
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAnnouncementInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub published: bool,
}

/// Input for updating an announcement
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAnnouncementInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
}
