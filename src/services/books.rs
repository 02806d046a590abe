//! Book catalog service

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookInput},
    repository::Repository,
};
use validator::Validate;

use super::cache::EntityCache;

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
    cache: EntityCache,
}

impl BooksService {
    pub fn new(repository: Repository, cache: EntityCache) -> Self {
        Self { repository, cache }
    }

    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let books = self.repository.books.find_all().await?;
        tracing::info!("Found {} books", books.len());
        Ok(books)
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        let key = self.cache.key("id", id);
        if let Some(book) = self.cache.get::<Book>(&key).await {
            return Ok(book);
        }

        let book = self.repository.books.find_by_id(id).await?.ok_or_else(|| {
            tracing::warn!(book_id = id, "Book not found");
            AppError::NotFound(format!("Book with id {} not found", id))
        })?;

        self.cache.put(&key, &book).await;
        Ok(book)
    }

    /// Get the first book carrying exactly this title
    pub async fn get_by_title(&self, title: &str) -> AppResult<Book> {
        let key = self.cache.key("title", title);
        if let Some(book) = self.cache.get::<Book>(&key).await {
            return Ok(book);
        }

        let book = self
            .repository
            .books
            .find_by_title(title)
            .await?
            .ok_or_else(|| {
                tracing::warn!(title, "Book not found");
                AppError::NotFound(format!("Book with title '{}' not found", title))
            })?;

        self.cache.put(&key, &book).await;
        Ok(book)
    }

    pub async fn list_available(&self) -> AppResult<Vec<Book>> {
        let books = self.repository.books.find_available().await?;
        tracing::info!("Found {} available books", books.len());
        Ok(books)
    }

    pub async fn list_by_author(&self, author: &str) -> AppResult<Vec<Book>> {
        let books = self.repository.books.find_by_author(author).await?;
        tracing::info!("Found {} books by '{}'", books.len(), author);
        Ok(books)
    }

    pub async fn list_published_after(&self, year: i32) -> AppResult<Vec<Book>> {
        let books = self.repository.books.find_by_published_year_after(year).await?;
        tracing::info!("Found {} books published after {}", books.len(), year);
        Ok(books)
    }

    pub async fn list_with_more_pages_than(&self, page_count: i32) -> AppResult<Vec<Book>> {
        let books = self
            .repository
            .books
            .find_by_page_count_greater_than(page_count)
            .await?;
        tracing::info!("Found {} books with more than {} pages", books.len(), page_count);
        Ok(books)
    }

    /// Insert a new book, or merge into the one named by `id`
    pub async fn save(&self, book: Option<BookInput>) -> AppResult<Book> {
        let book = book.ok_or_else(|| {
            tracing::warn!("Rejected empty book payload");
            AppError::BadRequest("Book cannot be empty".to_string())
        })?;
        book.validate()?;

        // A merge may rename the book
        let previous = match book.id {
            Some(id) => self.repository.books.find_by_id(id).await?,
            None => None,
        };

        let saved = self.repository.books.save(book).await?;
        if let Some(previous) = previous {
            self.evict_title(&previous.title).await;
        }
        self.refresh(&saved).await;

        tracing::info!(book_id = saved.id, "Book saved");
        Ok(saved)
    }

    /// Update an existing book; the path id always wins over the payload id
    pub async fn update(&self, id: i64, mut book: BookInput) -> AppResult<Book> {
        book.validate()?;

        let existing = self.repository.books.find_by_id(id).await?.ok_or_else(|| {
            tracing::warn!(book_id = id, "Book not found for update");
            AppError::NotFound(format!("Book with id {} not found", id))
        })?;

        book.id = Some(id);
        let updated = self
            .repository
            .books
            .update(id, &book)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        self.evict_title(&existing.title).await;
        self.refresh(&updated).await;

        tracing::info!(book_id = id, "Book updated");
        Ok(updated)
    }

    /// Delete a book that no loan references
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let _references = self.repository.lock_references().await;

        let existing = self.repository.books.find_by_id(id).await?.ok_or_else(|| {
            tracing::warn!(book_id = id, "Book not found for deletion");
            AppError::NotFound(format!("Book with id {} not found", id))
        })?;

        if self.repository.loans.exists_for_book(id).await? {
            return Err(AppError::Conflict(format!(
                "Book with id {} is referenced by loans",
                id
            )));
        }

        self.repository.books.delete_by_id(id).await?;
        self.cache.evict(&self.cache.key("id", id)).await;
        self.evict_title(&existing.title).await;

        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    async fn refresh(&self, book: &Book) {
        self.cache.put(&self.cache.key("id", book.id), book).await;
        self.evict_title(&book.title).await;
    }

    async fn evict_title(&self, title: &str) {
        self.cache.evict(&self.cache.key("title", title)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        repository::{MockBookRepository, MockLoanRepository, MockUserRepository},
        services::cache::{MemoryCache, NoopCache},
    };

    fn dune(id: i64) -> Book {
        Book {
            id,
            title: "Dune".to_string(),
            author: Some("Frank Herbert".to_string()),
            published_year: Some(1965),
            page_count: 412,
            available: true,
            added_at: Utc::now(),
        }
    }

    fn service(books: MockBookRepository, loans: MockLoanRepository) -> BooksService {
        let repository = Repository::from_stores(
            Arc::new(books),
            Arc::new(MockUserRepository::new()),
            Arc::new(loans),
        );
        BooksService::new(repository, EntityCache::new(Arc::new(NoopCache), "books"))
    }

    #[tokio::test]
    async fn test_get_by_id_missing_is_not_found() {
        let mut books = MockBookRepository::new();
        books.expect_find_by_id().with(eq(9)).returning(|_| Ok(None));

        let result = service(books, MockLoanRepository::new()).get_by_id(9).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_by_id_is_served_from_cache() {
        let mut books = MockBookRepository::new();
        books
            .expect_find_by_id()
            .with(eq(1))
            .times(1)
            .returning(|id| Ok(Some(dune(id))));

        let repository = Repository::from_stores(
            Arc::new(books),
            Arc::new(MockUserRepository::new()),
            Arc::new(MockLoanRepository::new()),
        );
        let service =
            BooksService::new(repository, EntityCache::new(Arc::new(MemoryCache::new(60)), "books"));

        let first = service.get_by_id(1).await.unwrap();
        let second = service.get_by_id(1).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_save_rejects_empty_payload() {
        let mut books = MockBookRepository::new();
        books.expect_save().never();

        let result = service(books, MockLoanRepository::new()).save(None).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_payload() {
        let mut books = MockBookRepository::new();
        books.expect_save().never();

        let result = service(books, MockLoanRepository::new())
            .save(Some(BookInput::new("x".repeat(60), 10)))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_missing_never_touches_storage() {
        let mut books = MockBookRepository::new();
        books.expect_find_by_id().returning(|_| Ok(None));
        books.expect_update().never();

        let result = service(books, MockLoanRepository::new())
            .update(4, BookInput::new("Dune", 412))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_forces_path_id() {
        let mut books = MockBookRepository::new();
        books.expect_find_by_id().with(eq(4)).returning(|id| Ok(Some(dune(id))));
        books
            .expect_update()
            .withf(|id, input| *id == 4 && input.id == Some(4))
            .times(1)
            .returning(|id, input| {
                let mut book = dune(id);
                book.apply(input);
                Ok(Some(book))
            });

        let mut input = BookInput::new("Dune Messiah", 256);
        input.id = Some(99);
        let updated = service(books, MockLoanRepository::new())
            .update(4, input)
            .await
            .unwrap();

        assert_eq!(updated.id, 4);
        assert_eq!(updated.title, "Dune Messiah");
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let mut books = MockBookRepository::new();
        books.expect_find_by_id().returning(|_| Ok(None));
        books.expect_delete_by_id().never();

        let result = service(books, MockLoanRepository::new()).delete(3).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_referenced_book_is_refused() {
        let mut books = MockBookRepository::new();
        books.expect_find_by_id().returning(|id| Ok(Some(dune(id))));
        books.expect_delete_by_id().never();

        let mut loans = MockLoanRepository::new();
        loans.expect_exists_for_book().with(eq(3)).returning(|_| Ok(true));

        let result = service(books, loans).delete(3).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_by_author_without_matches_is_empty() {
        let mut books = MockBookRepository::new();
        books.expect_find_by_author().returning(|_| Ok(Vec::new()));

        let books = service(books, MockLoanRepository::new())
            .list_by_author("Unknown Author")
            .await
            .unwrap();
        assert!(books.is_empty());
    }
}
