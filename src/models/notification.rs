//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Notification kinds delivered to users.
///
/// Follow/comment/like notifications carry the acting user; announcement
/// notifications carry no actor and reference an admin broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Follow,
    Comment,
    Like,
    Announcement,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Follow => write!(f, "follow"),
            Self::Comment => write!(f, "comment"),
            Self::Like => write!(f, "like"),
            Self::Announcement => write!(f, "announcement"),
        }
    }
}

impl FromStr for NotificationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "follow" => Ok(Self::Follow),
            "comment" => Ok(Self::Comment),
            "like" => Ok(Self::Like),
            "announcement" => Ok(Self::Announcement),
            _ => Err(anyhow::anyhow!("Invalid notification kind: {}", s)),
        }
    }
}

/// Notification entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    /// Recipient user ID
    pub user_id: i64,
    /// Acting user, if any
    pub actor_id: Option<i64>,
    pub kind: NotificationKind,
    /// Related diary, if any
    pub diary_id: Option<i64>,
    /// Related comment, if any
    pub comment_id: Option<i64>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create an unsaved notification row
    pub fn new(user_id: i64, actor_id: Option<i64>, kind: NotificationKind) -> Self {
        Self {
            id: 0,
            user_id,
            actor_id,
            kind,
            diary_id: None,
            comment_id: None,
            read: false,
            created_at: Utc::now(),
        }
    }

    /// Attach a related diary
    pub fn with_diary(mut self, diary_id: i64) -> Self {
        self.diary_id = Some(diary_id);
        self
    }

    /// Attach a related comment
    pub fn with_comment(mut self, comment_id: i64) -> Self {
        self.comment_id = Some(comment_id);
        self
    }
}
