//! Diary model
//!
//! This module provides:
//! - `Diary` entity representing a journal entry
//! - `DiaryVisibility` and `DiaryStatus` enums
//! - Input types for creating and updating diaries
//! - Pagination types for list queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Diary entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diary {
    /// Unique identifier
    pub id: i64,
    /// Author user ID
    pub author_id: i64,
    /// Entry title
    pub title: String,
    /// Entry body
    pub content: String,
    /// Emotion label recorded with the entry
    pub emotion: Option<String>,
    /// Weather label recorded with the entry
    pub weather: Option<String>,
    /// Who can see the entry
    pub visibility: DiaryVisibility,
    /// Publication status
    pub status: DiaryStatus,
    /// View count
    #[serde(default)]
    pub view_count: i64,
    /// Like count
    #[serde(default)]
    pub like_count: i64,
    /// Comment count
    #[serde(default)]
    pub comment_count: i64,
    /// Publication timestamp
    pub published_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Diary {
    /// Create a new diary with the given parameters
    pub fn new(
        author_id: i64,
        title: String,
        content: String,
        visibility: DiaryVisibility,
        status: DiaryStatus,
    ) -> Self {
        let now = Utc::now();
        let published_at = if status == DiaryStatus::Published {
            Some(now)
        } else {
            None
        };

        Self {
            id: 0, // Will be set by database
            author_id,
            title,
            content,
            emotion: None,
            weather: None,
            visibility,
            status,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            published_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the entry is visible to users other than the author
    pub fn is_publicly_visible(&self) -> bool {
        self.visibility == DiaryVisibility::Public && self.status == DiaryStatus::Published
    }
}

/// Diary visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiaryVisibility {
    /// Visible to everyone once published
    Public,
    /// Visible to the author only
    Private,
}

impl Default for DiaryVisibility {
    fn default() -> Self {
        Self::Public
    }
}

impl DiaryVisibility {
    /// Convert visibility to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DiaryVisibility::Public => "public",
            DiaryVisibility::Private => "private",
        }
    }

    /// Parse visibility from database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(DiaryVisibility::Public),
            "private" => Some(DiaryVisibility::Private),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiaryVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diary publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiaryStatus {
    /// Draft - visible to the author only
    Draft,
    /// Published
    Published,
}

impl Default for DiaryStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl DiaryStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DiaryStatus::Draft => "draft",
            DiaryStatus::Published => "published",
        }
    }

    /// Parse status from database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(DiaryStatus::Draft),
            "published" => Some(DiaryStatus::Published),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiaryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating a new diary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiaryInput {
    /// Entry title
    pub title: String,
    /// Entry body
    pub content: String,
    /// Emotion label (optional)
    pub emotion: Option<String>,
    /// Weather label (optional)
    pub weather: Option<String>,
    /// Visibility (defaults to Public)
    pub visibility: Option<DiaryVisibility>,
    /// Status (defaults to Draft)
    pub status: Option<DiaryStatus>,
    /// Keyword tags attached by name
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for updating an existing diary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDiaryInput {
    /// New title (optional)
    pub title: Option<String>,
    /// New content (optional)
    pub content: Option<String>,
    /// New emotion label (optional)
    pub emotion: Option<String>,
    /// New weather label (optional)
    pub weather: Option<String>,
    /// New visibility (optional)
    pub visibility: Option<DiaryVisibility>,
    /// New status (optional)
    pub status: Option<DiaryStatus>,
    /// Replacement tag set (optional)
    pub tags: Option<Vec<String>>,
}

impl UpdateDiaryInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.content.is_some()
            || self.emotion.is_some()
            || self.weather.is_some()
            || self.visibility.is_some()
            || self.status.is_some()
            || self.tags.is_some()
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        ((self.page.saturating_sub(1)) * self.per_page) as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        ((self.total as u32) + self.per_page - 1) / self.per_page
    }

    /// Check if there is a next page
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of items in the current page
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            per_page: 10,
        }
    }
}

/// Map a page of items into another type, keeping pagination intact
impl<T> PagedResult<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Pagination never produces a negative offset and offset/limit stay
        /// consistent with page size.
        #[test]
        fn list_params_offset_consistent(page in 0u32..1000, per_page in 0u32..1000) {
            let params = ListParams::new(page, per_page);
            prop_assert!(params.offset() >= 0);
            prop_assert!(params.limit() >= 1);
            prop_assert!(params.limit() <= 100);
            prop_assert_eq!(
                params.offset(),
                ((params.page - 1) * params.per_page) as i64
            );
        }

        /// total_pages is the ceiling of total / per_page.
        #[test]
        fn paged_result_page_math(total in 0i64..10_000, per_page in 1u32..100) {
            let params = ListParams::new(1, per_page);
            let result: PagedResult<i64> = PagedResult::new(Vec::new(), total, &params);
            let expected = ((total as u32) + per_page - 1) / per_page;
            prop_assert_eq!(result.total_pages(), expected);
        }
    }
}
