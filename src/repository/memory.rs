//! Process-local stores, used for development and tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;

use super::{BookRepository, LoanRepository, UserRepository};
use crate::{
    error::AppResult,
    models::{Book, BookInput, Loan, LoanInput, User, UserInput},
};

/// Rows keyed by identity plus an identity sequence
struct Table<T> {
    rows: RwLock<BTreeMap<i64, T>>,
    sequence: AtomicI64,
}

impl<T: Clone> Table<T> {
    fn next_id(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .read()
            .await
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    async fn get(&self, id: i64) -> Option<T> {
        self.rows.read().await.get(&id).cloned()
    }

    async fn remove(&self, id: i64) -> bool {
        self.rows.write().await.remove(&id).is_some()
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            sequence: AtomicI64::new(0),
        }
    }
}

#[derive(Default)]
pub struct MemoryBooksRepository {
    table: Table<Book>,
}

#[async_trait]
impl BookRepository for MemoryBooksRepository {
    async fn find_all(&self) -> AppResult<Vec<Book>> {
        Ok(self.table.filter(|_| true).await)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>> {
        Ok(self.table.get(id).await)
    }

    async fn find_by_title(&self, title: &str) -> AppResult<Option<Book>> {
        Ok(self.table.filter(|b| b.title == title).await.into_iter().next())
    }

    async fn find_available(&self) -> AppResult<Vec<Book>> {
        Ok(self.table.filter(|b| b.available).await)
    }

    async fn find_by_author(&self, author: &str) -> AppResult<Vec<Book>> {
        Ok(self.table.filter(|b| b.author.as_deref() == Some(author)).await)
    }

    async fn find_by_published_year_after(&self, year: i32) -> AppResult<Vec<Book>> {
        Ok(self
            .table
            .filter(|b| b.published_year.map_or(false, |y| y > year))
            .await)
    }

    async fn find_by_page_count_greater_than(&self, page_count: i32) -> AppResult<Vec<Book>> {
        Ok(self.table.filter(|b| b.page_count > page_count).await)
    }

    async fn save(&self, book: BookInput) -> AppResult<Book> {
        let mut rows = self.table.rows.write().await;

        if let Some(existing) = book.id.and_then(|id| rows.get_mut(&id)) {
            existing.apply(&book);
            return Ok(existing.clone());
        }

        let stored = book.into_book(self.table.next_id());
        rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: i64, book: &BookInput) -> AppResult<Option<Book>> {
        let mut rows = self.table.rows.write().await;
        Ok(rows.get_mut(&id).map(|existing| {
            existing.apply(book);
            existing.clone()
        }))
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        Ok(self.table.remove(id).await)
    }
}

#[derive(Default)]
pub struct MemoryUsersRepository {
    table: Table<User>,
}

#[async_trait]
impl UserRepository for MemoryUsersRepository {
    async fn find_all(&self) -> AppResult<Vec<User>> {
        Ok(self.table.filter(|_| true).await)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.table.get(id).await)
    }

    async fn find_by_first_name(&self, first_name: &str) -> AppResult<Vec<User>> {
        Ok(self.table.filter(|u| u.first_name == first_name).await)
    }

    async fn find_by_last_name(&self, last_name: &str) -> AppResult<Vec<User>> {
        Ok(self.table.filter(|u| u.last_name == last_name).await)
    }

    async fn find_by_registered_after(&self, date: NaiveDate) -> AppResult<Vec<User>> {
        let start_of_day = date.and_time(NaiveTime::MIN).and_utc();
        Ok(self.table.filter(|u| u.registered_at > start_of_day).await)
    }

    async fn save(&self, user: UserInput) -> AppResult<User> {
        let mut rows = self.table.rows.write().await;

        if let Some(existing) = user.id.and_then(|id| rows.get_mut(&id)) {
            existing.apply(&user);
            return Ok(existing.clone());
        }

        let stored = user.into_user(self.table.next_id());
        rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: i64, user: &UserInput) -> AppResult<Option<User>> {
        let mut rows = self.table.rows.write().await;
        Ok(rows.get_mut(&id).map(|existing| {
            existing.apply(user);
            existing.clone()
        }))
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        Ok(self.table.remove(id).await)
    }
}

/// Loan history order, matching `ORDER BY loan_date, id`
fn by_loan_date(mut loans: Vec<Loan>) -> Vec<Loan> {
    loans.sort_by_key(|loan| (loan.loan_date, loan.id));
    loans
}

#[derive(Default)]
pub struct MemoryLoansRepository {
    table: Table<Loan>,
}

#[async_trait]
impl LoanRepository for MemoryLoansRepository {
    async fn find_all(&self) -> AppResult<Vec<Loan>> {
        Ok(self.table.filter(|_| true).await)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Loan>> {
        Ok(self.table.get(id).await)
    }

    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Vec<Loan>> {
        Ok(by_loan_date(self.table.filter(|l| l.user_id == user_id).await))
    }

    async fn find_by_book_id(&self, book_id: i64) -> AppResult<Vec<Loan>> {
        Ok(by_loan_date(self.table.filter(|l| l.book_id == book_id).await))
    }

    async fn find_not_returned(&self) -> AppResult<Vec<Loan>> {
        Ok(by_loan_date(self.table.filter(|l| !l.returned).await))
    }

    async fn exists_for_user(&self, user_id: i64) -> AppResult<bool> {
        Ok(self.table.rows.read().await.values().any(|l| l.user_id == user_id))
    }

    async fn exists_for_book(&self, book_id: i64) -> AppResult<bool> {
        Ok(self.table.rows.read().await.values().any(|l| l.book_id == book_id))
    }

    async fn save(&self, loan: LoanInput) -> AppResult<Loan> {
        let mut rows = self.table.rows.write().await;

        if let Some(existing) = loan.id.and_then(|id| rows.get_mut(&id)) {
            existing.apply(&loan);
            return Ok(existing.clone());
        }

        let stored = loan.into_loan(self.table.next_id());
        rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: i64, loan: &LoanInput) -> AppResult<Option<Loan>> {
        let mut rows = self.table.rows.write().await;
        Ok(rows.get_mut(&id).map(|existing| {
            existing.apply(loan);
            existing.clone()
        }))
    }

    async fn update_return_status(&self, id: i64, returned: bool) -> AppResult<Option<Loan>> {
        let mut rows = self.table.rows.write().await;
        Ok(rows.get_mut(&id).map(|existing| {
            existing.set_returned(returned, Utc::now());
            existing.clone()
        }))
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        Ok(self.table.remove(id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_assigns_fresh_identities() {
        let repo = MemoryBooksRepository::default();
        let first = repo.save(BookInput::new("Dune", 412)).await.unwrap();
        let second = repo.save(BookInput::new("Emma", 474)).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(repo.find_by_id(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_save_with_known_id_merges_and_keeps_added_at() {
        let repo = MemoryBooksRepository::default();
        let stored = repo.save(BookInput::new("Dune", 412)).await.unwrap();

        let mut input = BookInput::new("Dune (2nd ed.)", 420);
        input.id = Some(stored.id);
        input.added_at = Some(stored.added_at - chrono::Duration::days(10));
        let merged = repo.save(input).await.unwrap();

        assert_eq!(merged.id, stored.id);
        assert_eq!(merged.added_at, stored.added_at);
        assert_eq!(merged.title, "Dune (2nd ed.)");
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_user_merge_and_update_keep_registered_at() {
        let repo = MemoryUsersRepository::default();
        let registered_at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc();
        let mut input = UserInput::new("Ann", "Lee");
        input.registered_at = Some(registered_at);
        let stored = repo.save(input).await.unwrap();

        let backdated = NaiveDate::from_ymd_opt(1999, 1, 1)
            .unwrap()
            .and_time(NaiveTime::MIN)
            .and_utc();

        let mut merge = UserInput::new("Ann", "Lee-Smith");
        merge.id = Some(stored.id);
        merge.registered_at = Some(backdated);
        let merged = repo.save(merge).await.unwrap();
        assert_eq!(merged.id, stored.id);
        assert_eq!(merged.last_name, "Lee-Smith");
        assert_eq!(merged.registered_at, registered_at);

        let mut update = UserInput::new("Anne", "Lee");
        update.registered_at = Some(backdated);
        let updated = repo.update(stored.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.first_name, "Anne");
        assert_eq!(updated.registered_at, registered_at);
    }

    #[tokio::test]
    async fn test_loan_merge_and_update_keep_loan_date() {
        let repo = MemoryLoansRepository::default();
        let stored = repo.save(LoanInput::new(1, 2)).await.unwrap();
        let backdated = stored.loan_date - chrono::Duration::days(30);

        let mut merge = LoanInput::new(3, 2);
        merge.id = Some(stored.id);
        merge.loan_date = Some(backdated);
        let merged = repo.save(merge).await.unwrap();
        assert_eq!(merged.id, stored.id);
        assert_eq!(merged.user_id, 3);
        assert_eq!(merged.loan_date, stored.loan_date);

        let mut update = LoanInput::new(3, 4);
        update.loan_date = Some(backdated);
        let updated = repo.update(stored.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.book_id, 4);
        assert_eq!(updated.loan_date, stored.loan_date);
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_loan_lists_follow_loan_date() {
        let repo = MemoryLoansRepository::default();
        let recent = repo.save(LoanInput::new(1, 1)).await.unwrap();

        let mut older = LoanInput::new(1, 2);
        older.loan_date = Some(recent.loan_date - chrono::Duration::days(7));
        let older = repo.save(older).await.unwrap();
        assert!(older.id > recent.id);

        let ids = |loans: Vec<Loan>| loans.into_iter().map(|l| l.id).collect::<Vec<_>>();
        assert_eq!(ids(repo.find_by_user_id(1).await.unwrap()), vec![older.id, recent.id]);
        assert_eq!(ids(repo.find_not_returned().await.unwrap()), vec![older.id, recent.id]);
    }

    #[tokio::test]
    async fn test_save_with_unknown_id_inserts_with_new_identity() {
        let repo = MemoryBooksRepository::default();
        let mut input = BookInput::new("Dune", 412);
        input.id = Some(999);

        let stored = repo.save(input).await.unwrap();
        assert_ne!(stored.id, 999);
        assert!(repo.find_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_none_and_stores_nothing() {
        let repo = MemoryUsersRepository::default();
        let updated = repo.update(5, &UserInput::new("Ann", "Lee")).await.unwrap();

        assert!(updated.is_none());
        assert!(repo.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_predicates_return_empty_when_nothing_matches() {
        let repo = MemoryBooksRepository::default();
        let mut input = BookInput::new("Dune", 412);
        input.author = Some("Frank Herbert".into());
        input.published_year = Some(1965);
        repo.save(input).await.unwrap();

        assert!(repo.find_by_author("Unknown Author").await.unwrap().is_empty());
        assert!(repo.find_by_published_year_after(1965).await.unwrap().is_empty());
        assert_eq!(repo.find_by_published_year_after(1964).await.unwrap().len(), 1);
        assert_eq!(repo.find_by_page_count_greater_than(400).await.unwrap().len(), 1);
        assert!(repo.find_by_title("Emma").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_registered_after_uses_start_of_day() {
        let repo = MemoryUsersRepository::default();
        let mut input = UserInput::new("Ann", "Lee");
        input.registered_at = Some(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
                .and_utc(),
        );
        repo.save(input).await.unwrap();

        let same_day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let next_day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(repo.find_by_registered_after(same_day).await.unwrap().len(), 1);
        assert!(repo.find_by_registered_after(next_day).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_return_status_transition() {
        let repo = MemoryLoansRepository::default();
        let loan = repo.save(LoanInput::new(1, 1)).await.unwrap();

        let returned = repo.update_return_status(loan.id, true).await.unwrap().unwrap();
        assert!(returned.returned);
        assert!(returned.return_date.is_some());
        assert_eq!(returned.loan_date, loan.loan_date);
        assert!(repo.find_not_returned().await.unwrap().is_empty());

        let reopened = repo.update_return_status(loan.id, false).await.unwrap().unwrap();
        assert!(!reopened.returned);
        assert!(reopened.return_date.is_none());

        assert!(repo.update_return_status(42, true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_whether_a_row_was_removed() {
        let repo = MemoryLoansRepository::default();
        let loan = repo.save(LoanInput::new(1, 2)).await.unwrap();

        assert!(repo.exists_for_user(1).await.unwrap());
        assert!(repo.exists_for_book(2).await.unwrap());
        assert!(repo.delete_by_id(loan.id).await.unwrap());
        assert!(!repo.delete_by_id(loan.id).await.unwrap());
        assert!(!repo.exists_for_user(1).await.unwrap());
    }
}
