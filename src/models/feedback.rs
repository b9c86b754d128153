//! Feedback ticket model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feedback ticket status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Open,
    Resolved,
    Closed,
}

impl Default for FeedbackStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Resolved => write!(f, "resolved"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for FeedbackStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(anyhow::anyhow!("Invalid feedback status: {}", s)),
        }
    }
}

/// User-submitted feedback ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub user_id: i64,
    pub subject: String,
    pub content: String,
    pub status: FeedbackStatus,
    /// Admin reply, if any
    pub reply: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [FeedbackStatus::Open, FeedbackStatus::Resolved, FeedbackStatus::Closed] {
            assert_eq!(FeedbackStatus::from_str(&status.to_string()).unwrap(), status);
        }
        assert!(FeedbackStatus::from_str("pending").is_err());
    }
}
