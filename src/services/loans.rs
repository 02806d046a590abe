//! Loan management service

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanInput},
    repository::Repository,
};

use super::cache::EntityCache;

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    cache: EntityCache,
}

impl LoansService {
    pub fn new(repository: Repository, cache: EntityCache) -> Self {
        Self { repository, cache }
    }

    pub async fn list(&self) -> AppResult<Vec<Loan>> {
        let loans = self.repository.loans.find_all().await?;
        tracing::info!("Found {} loans", loans.len());
        Ok(loans)
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Loan> {
        let key = self.cache.key("id", id);
        if let Some(loan) = self.cache.get::<Loan>(&key).await {
            return Ok(loan);
        }

        let loan = self.repository.loans.find_by_id(id).await?.ok_or_else(|| {
            tracing::warn!(loan_id = id, "Loan not found");
            AppError::NotFound(format!("Loan with id {} not found", id))
        })?;

        self.cache.put(&key, &loan).await;
        Ok(loan)
    }

    pub async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Loan>> {
        let loans = self.repository.loans.find_by_user_id(user_id).await?;
        tracing::info!("Found {} loans for user {}", loans.len(), user_id);
        Ok(loans)
    }

    pub async fn list_for_book(&self, book_id: i64) -> AppResult<Vec<Loan>> {
        let loans = self.repository.loans.find_by_book_id(book_id).await?;
        tracing::info!("Found {} loans for book {}", loans.len(), book_id);
        Ok(loans)
    }

    pub async fn list_not_returned(&self) -> AppResult<Vec<Loan>> {
        let loans = self.repository.loans.find_not_returned().await?;
        tracing::info!("Found {} outstanding loans", loans.len());
        Ok(loans)
    }

    /// Lend a book to a user, or merge into the loan named by `id`
    pub async fn create(&self, loan: Option<LoanInput>) -> AppResult<Loan> {
        let loan = loan.ok_or_else(|| {
            tracing::warn!("Rejected empty loan payload");
            AppError::BadRequest("Loan cannot be empty".to_string())
        })?;

        let references = self.repository.lock_references().await;
        self.check_references(&loan).await?;
        let saved = self.repository.loans.save(loan).await?;
        drop(references);

        self.cache.put(&self.cache.key("id", saved.id), &saved).await;

        tracing::info!(
            loan_id = saved.id,
            user_id = saved.user_id,
            book_id = saved.book_id,
            "Loan saved"
        );
        Ok(saved)
    }

    /// Point an existing loan at another user or book
    pub async fn update(&self, id: i64, mut loan: LoanInput) -> AppResult<Loan> {
        if self.repository.loans.find_by_id(id).await?.is_none() {
            tracing::warn!(loan_id = id, "Loan not found for update");
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }

        let references = self.repository.lock_references().await;
        self.check_references(&loan).await?;

        loan.id = Some(id);
        let updated = self
            .repository
            .loans
            .update(id, &loan)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;
        drop(references);

        self.cache.put(&self.cache.key("id", id), &updated).await;

        tracing::info!(loan_id = id, "Loan updated");
        Ok(updated)
    }

    /// Mark a loan returned (stamping the return date) or outstanding again
    pub async fn set_return_status(&self, id: i64, returned: bool) -> AppResult<Loan> {
        if self.repository.loans.find_by_id(id).await?.is_none() {
            tracing::warn!(loan_id = id, "Loan not found for return status update");
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }

        let updated = self
            .repository
            .loans
            .update_return_status(id, returned)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;

        self.cache.put(&self.cache.key("id", id), &updated).await;

        tracing::info!(loan_id = id, returned, return_date = ?updated.return_date, "Loan return status updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        if self.repository.loans.find_by_id(id).await?.is_none() {
            tracing::warn!(loan_id = id, "Loan not found for deletion");
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }

        self.repository.loans.delete_by_id(id).await?;
        self.cache.evict(&self.cache.key("id", id)).await;

        tracing::info!(loan_id = id, "Loan deleted");
        Ok(())
    }

    async fn check_references(&self, loan: &LoanInput) -> AppResult<()> {
        if self.repository.users.find_by_id(loan.user_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "User with id {} not found",
                loan.user_id
            )));
        }
        if self.repository.books.find_by_id(loan.book_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Book with id {} not found",
                loan.book_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::{
        models::{BookInput, UserInput},
        services::{cache::MemoryCache, users::UsersService},
    };

    async fn setup() -> (LoansService, Repository, i64, i64) {
        let repository = Repository::in_memory();
        let user = repository.users.save(UserInput::new("Ann", "Lee")).await.unwrap();
        let book = repository.books.save(BookInput::new("Dune", 412)).await.unwrap();
        let service = LoansService::new(
            repository.clone(),
            EntityCache::new(Arc::new(MemoryCache::new(60)), "loans"),
        );
        (service, repository, user.id, book.id)
    }

    #[tokio::test]
    async fn test_create_requires_existing_user_and_book() {
        let (service, repository, user_id, book_id) = setup().await;

        let missing_user = service.create(Some(LoanInput::new(user_id + 100, book_id))).await;
        assert!(matches!(missing_user, Err(AppError::NotFound(_))));

        let missing_book = service.create(Some(LoanInput::new(user_id, book_id + 100))).await;
        assert!(matches!(missing_book, Err(AppError::NotFound(_))));

        assert!(repository.loans.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_payload() {
        let (service, _, _, _) = setup().await;
        assert!(matches!(service.create(None).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_return_transition_round_trip() {
        let (service, _, user_id, book_id) = setup().await;
        let loan = assert_ok!(service.create(Some(LoanInput::new(user_id, book_id))).await);
        assert!(!loan.returned);
        assert!(loan.return_date.is_none());

        let returned = assert_ok!(service.set_return_status(loan.id, true).await);
        assert!(returned.returned);
        assert!(returned.return_date.is_some());
        assert_eq!(returned.loan_date, loan.loan_date);

        // The cached entry was replaced, not left stale
        let fetched = assert_ok!(service.get_by_id(loan.id).await);
        assert_eq!(fetched, returned);

        let reopened = assert_ok!(service.set_return_status(loan.id, false).await);
        assert!(!reopened.returned);
        assert!(reopened.return_date.is_none());
    }

    #[tokio::test]
    async fn test_return_status_on_missing_loan_is_not_found() {
        let (service, _, _, _) = setup().await;
        let result = assert_err!(service.set_return_status(77, true).await);
        assert!(matches!(result, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_missing_creates_nothing() {
        let (service, repository, user_id, book_id) = setup().await;
        let result = service.update(5, LoanInput::new(user_id, book_id)).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(repository.loans.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_returning_a_loan_leaves_book_availability_alone() {
        let (service, repository, user_id, book_id) = setup().await;
        let loan = service.create(Some(LoanInput::new(user_id, book_id))).await.unwrap();
        service.set_return_status(loan.id, true).await.unwrap();

        let book = repository.books.find_by_id(book_id).await.unwrap().unwrap();
        assert!(book.available);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_user_delete_never_orphans_a_loan() {
        let repository = Repository::in_memory();
        let cache = Arc::new(MemoryCache::new(60));
        let loans = LoansService::new(repository.clone(), EntityCache::new(cache.clone(), "loans"));
        let users = UsersService::new(repository.clone(), EntityCache::new(cache, "users"));
        let book_id = repository.books.save(BookInput::new("Dune", 412)).await.unwrap().id;

        for _ in 0..50 {
            let user_id = repository.users.save(UserInput::new("Ann", "Lee")).await.unwrap().id;

            let lend = {
                let loans = loans.clone();
                tokio::spawn(async move { loans.create(Some(LoanInput::new(user_id, book_id))).await })
            };
            let remove = {
                let users = users.clone();
                tokio::spawn(async move { users.delete(user_id).await })
            };

            match (lend.await.unwrap(), remove.await.unwrap()) {
                (Ok(_), Err(AppError::Conflict(_))) => {}
                (Err(AppError::NotFound(_)), Ok(())) => {}
                other => panic!("inconsistent outcome: {:?}", other),
            }
        }

        for loan in repository.loans.find_all().await.unwrap() {
            assert!(repository.users.find_by_id(loan.user_id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_list_for_user_without_loans_is_empty() {
        let (service, _, user_id, _) = setup().await;
        assert!(service.list_for_user(user_id).await.unwrap().is_empty());
        assert!(service.list_not_returned().await.unwrap().is_empty());
    }
}
