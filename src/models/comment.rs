//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub diary_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment with additional info for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithMeta {
    pub id: i64,
    pub diary_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author_name: String,
    pub avatar_url: String,
    pub like_count: i64,
    pub is_liked: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<CommentWithMeta>,
}

impl CommentWithMeta {
    /// Generate Gravatar URL from email, used when a user has no avatar set
    pub fn gravatar_url(email: &str) -> String {
        if email.is_empty() {
            return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
        }
        let hash = format!("{:x}", md5::compute(email.trim().to_lowercase()));
        format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
    }
}

/// Input for creating a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub diary_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
}

/// Like target type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTargetType {
    Diary,
    Comment,
}

impl std::fmt::Display for LikeTargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diary => write!(f, "diary"),
            Self::Comment => write!(f, "comment"),
        }
    }
}

impl std::str::FromStr for LikeTargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "diary" => Ok(Self::Diary),
            "comment" => Ok(Self::Comment),
            _ => Err(format!("Invalid like target type: {}", s)),
        }
    }
}

/// Like entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: i64,
    pub target_type: LikeTargetType,
    pub target_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_like_target_type_roundtrip() {
        assert_eq!(LikeTargetType::from_str("diary").unwrap(), LikeTargetType::Diary);
        assert_eq!(LikeTargetType::from_str("Comment").unwrap(), LikeTargetType::Comment);
        assert!(LikeTargetType::from_str("user").is_err());
        assert_eq!(LikeTargetType::Diary.to_string(), "diary");
    }

    #[test]
    fn test_gravatar_url_from_email() {
        let url = CommentWithMeta::gravatar_url("Someone@Example.com ");
        // md5 of "someone@example.com"
        assert!(url.contains("gravatar.com/avatar/"));
        assert!(url.ends_with("?d=mp&s=80"));
        assert!(!url.contains("Someone"));
    }

    #[test]
    fn test_gravatar_url_empty_email() {
        let url = CommentWithMeta::gravatar_url("");
        assert_eq!(url, "https://www.gravatar.com/avatar/?d=mp&s=80");
    }
}
