//! Chat message model
//!
//! Messages are stored server-side; a conversation is the set of messages
//! exchanged between two users in either direction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direct chat message between two users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: String,
    /// Whether the recipient has seen the message
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// One row per conversation partner, for the conversation list view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The other participant
    pub peer_id: i64,
    pub peer_username: String,
    pub peer_display_name: Option<String>,
    pub peer_avatar: Option<String>,
    /// Most recent message in the conversation
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    /// Messages from the peer not yet read
    pub unread_count: i64,
}
