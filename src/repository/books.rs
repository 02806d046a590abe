//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::BookRepository;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookInput},
};

const BOOK_COLUMNS: &str = "id, title, author, published_year, page_count, available, added_at";

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, clause: &str) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books {} ORDER BY id",
            BOOK_COLUMNS, clause
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }
}

#[async_trait]
impl BookRepository for PgBooksRepository {
    async fn find_all(&self) -> AppResult<Vec<Book>> {
        let books = self.fetch_where("").await?;
        tracing::debug!("Loaded {} books", books.len());
        Ok(books)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn find_by_title(&self, title: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE title = $1 ORDER BY id LIMIT 1",
            BOOK_COLUMNS
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn find_available(&self) -> AppResult<Vec<Book>> {
        self.fetch_where("WHERE available = TRUE").await
    }

    async fn find_by_author(&self, author: &str) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE author = $1 ORDER BY id",
            BOOK_COLUMNS
        ))
        .bind(author)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn find_by_published_year_after(&self, year: i32) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE published_year > $1 ORDER BY id",
            BOOK_COLUMNS
        ))
        .bind(year)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn find_by_page_count_greater_than(&self, page_count: i32) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE page_count > $1 ORDER BY id",
            BOOK_COLUMNS
        ))
        .bind(page_count)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn save(&self, book: BookInput) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        // Merge into the existing row when the id is known
        if let Some(id) = book.id {
            let merged = sqlx::query_as::<_, Book>(&format!(
                r#"
                UPDATE books
                SET title = $2, author = $3, published_year = $4, page_count = $5, available = $6
                WHERE id = $1
                RETURNING {}
                "#,
                BOOK_COLUMNS
            ))
            .bind(id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(book.published_year)
            .bind(book.page_count)
            .bind(book.available)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(merged) = merged {
                tx.commit().await?;
                tracing::debug!("Merged book {}", merged.id);
                return Ok(merged);
            }
        }

        let inserted = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, author, published_year, page_count, available, added_at)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()))
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.published_year)
        .bind(book.page_count)
        .bind(book.available)
        .bind(book.added_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!("Inserted book {}", inserted.id);
        Ok(inserted)
    }

    async fn update(&self, id: i64, book: &BookInput) -> AppResult<Option<Book>> {
        let updated = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = $2, author = $3, published_year = $4, page_count = $5, available = $6
            WHERE id = $1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.published_year)
        .bind(book.page_count)
        .bind(book.available)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::from_foreign_key(e, || {
                    AppError::Conflict(format!("Book with id {} is referenced by loans", id))
                })
            })?;
        Ok(result.rows_affected() > 0)
    }
}
