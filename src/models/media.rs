//! Media attachment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uploaded media file, optionally attached to a diary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: i64,
    pub uploader_id: i64,
    pub diary_id: Option<i64>,
    /// Public URL the file is served from
    pub url: String,
    /// Stored filename
    pub filename: String,
    pub content_type: String,
    /// File size in bytes
    pub size: i64,
    pub created_at: DateTime<Utc>,
}
