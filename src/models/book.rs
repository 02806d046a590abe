//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Book record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub published_year: Option<i32>,
    pub page_count: i32,
    /// Whether the book can currently be lent
    pub available: bool,
    /// Set once when the book is first stored
    pub added_at: DateTime<Utc>,
}

/// Create / update book request
///
/// `id` is only meaningful for `save`: when it names an existing book the
/// record is merged, otherwise a new book is inserted. `added_at` is honoured
/// on insert and ignored afterwards.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 50, message = "Title must be between 1 and 50 characters"))]
    pub title: String,
    #[validate(length(max = 50, message = "Author cannot exceed 50 characters"))]
    pub author: Option<String>,
    pub published_year: Option<i32>,
    #[validate(range(min = 0, message = "Page count cannot be negative"))]
    pub page_count: i32,
    #[serde(default = "default_available")]
    pub available: bool,
    pub added_at: Option<DateTime<Utc>>,
}

fn default_available() -> bool {
    true
}

impl BookInput {
    pub fn new(title: impl Into<String>, page_count: i32) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: None,
            published_year: None,
            page_count,
            available: true,
            added_at: None,
        }
    }

    /// Build the stored record for a fresh insert
    pub fn into_book(self, id: i64) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            published_year: self.published_year,
            page_count: self.page_count,
            available: self.available,
            added_at: self.added_at.unwrap_or_else(Utc::now),
        }
    }
}

impl Book {
    /// Overwrite mutable fields; id and `added_at` are kept
    pub fn apply(&mut self, input: &BookInput) {
        self.title = input.title.clone();
        self.author = input.author.clone();
        self.published_year = input.published_year;
        self.page_count = input.page_count;
        self.available = input.available;
    }
}
