//! Repository layer for database operations
//!
//! Each entity has a storage contract (`BookRepository`, `UserRepository`,
//! `LoanRepository`) with a Postgres implementation and a process-local one.
//! Absence is never an error at this layer: lookups return `Option` or an
//! empty `Vec`, `update` returns `None` and `delete_by_id` returns `false`.

pub mod books;
pub mod loans;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    error::AppResult,
    models::{Book, BookInput, Loan, LoanInput, User, UserInput},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn find_all(&self) -> AppResult<Vec<Book>>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>>;
    /// First book carrying exactly this title
    async fn find_by_title(&self, title: &str) -> AppResult<Option<Book>>;
    async fn find_available(&self) -> AppResult<Vec<Book>>;
    async fn find_by_author(&self, author: &str) -> AppResult<Vec<Book>>;
    async fn find_by_published_year_after(&self, year: i32) -> AppResult<Vec<Book>>;
    async fn find_by_page_count_greater_than(&self, page_count: i32) -> AppResult<Vec<Book>>;
    /// Insert when `id` is absent or unknown, merge otherwise
    async fn save(&self, book: BookInput) -> AppResult<Book>;
    async fn update(&self, id: i64, book: &BookInput) -> AppResult<Option<Book>>;
    async fn delete_by_id(&self, id: i64) -> AppResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self) -> AppResult<Vec<User>>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_by_first_name(&self, first_name: &str) -> AppResult<Vec<User>>;
    async fn find_by_last_name(&self, last_name: &str) -> AppResult<Vec<User>>;
    /// Users registered strictly after the start of `date`
    async fn find_by_registered_after(&self, date: NaiveDate) -> AppResult<Vec<User>>;
    async fn save(&self, user: UserInput) -> AppResult<User>;
    async fn update(&self, id: i64, user: &UserInput) -> AppResult<Option<User>>;
    async fn delete_by_id(&self, id: i64) -> AppResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn find_all(&self) -> AppResult<Vec<Loan>>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Loan>>;
    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Vec<Loan>>;
    async fn find_by_book_id(&self, book_id: i64) -> AppResult<Vec<Loan>>;
    async fn find_not_returned(&self) -> AppResult<Vec<Loan>>;
    async fn exists_for_user(&self, user_id: i64) -> AppResult<bool>;
    async fn exists_for_book(&self, book_id: i64) -> AppResult<bool>;
    async fn save(&self, loan: LoanInput) -> AppResult<Loan>;
    /// Replace the user and book references
    async fn update(&self, id: i64, loan: &LoanInput) -> AppResult<Option<Loan>>;
    async fn update_return_status(&self, id: i64, returned: bool) -> AppResult<Option<Loan>>;
    async fn delete_by_id(&self, id: i64) -> AppResult<bool>;
}

/// Main repository struct holding one store per entity
#[derive(Clone)]
pub struct Repository {
    /// Present when backed by Postgres
    pub pool: Option<Pool<Postgres>>,
    pub books: Arc<dyn BookRepository>,
    pub users: Arc<dyn UserRepository>,
    pub loans: Arc<dyn LoanRepository>,
    /// Held while a loan reference is checked and written, or while a user or
    /// book is checked for loans and deleted
    references: Arc<Mutex<()>>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        let mut repository = Self::from_stores(
            Arc::new(books::PgBooksRepository::new(pool.clone())),
            Arc::new(users::PgUsersRepository::new(pool.clone())),
            Arc::new(loans::PgLoansRepository::new(pool.clone())),
        );
        repository.pool = Some(pool);
        repository
    }

    /// Create a repository kept entirely in process memory
    pub fn in_memory() -> Self {
        Self::from_stores(
            Arc::new(memory::MemoryBooksRepository::default()),
            Arc::new(memory::MemoryUsersRepository::default()),
            Arc::new(memory::MemoryLoansRepository::default()),
        )
    }

    /// Assemble a repository from arbitrary stores, without a pool
    pub fn from_stores(
        books: Arc<dyn BookRepository>,
        users: Arc<dyn UserRepository>,
        loans: Arc<dyn LoanRepository>,
    ) -> Self {
        Self {
            pool: None,
            books,
            users,
            loans,
            references: Arc::new(Mutex::new(())),
        }
    }

    /// Serialize reference checks with the writes that depend on them
    pub async fn lock_references(&self) -> MutexGuard<'_, ()> {
        self.references.lock().await
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}
