//! Loans repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::LoanRepository;
use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanInput},
};

const LOAN_COLUMNS: &str = "id, user_id, book_id, loan_date, return_date, returned";

#[derive(Clone)]
pub struct PgLoansRepository {
    pool: Pool<Postgres>,
}

impl PgLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn missing_reference(loan: &LoanInput) -> impl FnOnce() -> AppError + '_ {
    move || {
        AppError::NotFound(format!(
            "User with id {} or book with id {} not found",
            loan.user_id, loan.book_id
        ))
    }
}

#[async_trait]
impl LoanRepository for PgLoansRepository {
    async fn find_all(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans ORDER BY id",
            LOAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        tracing::debug!("Loaded {} loans", loans.len());
        Ok(loans)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1",
            LOAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(loan)
    }

    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE user_id = $1 ORDER BY loan_date, id",
            LOAN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn find_by_book_id(&self, book_id: i64) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE book_id = $1 ORDER BY loan_date, id",
            LOAN_COLUMNS
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn find_not_returned(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE returned = FALSE ORDER BY loan_date, id",
            LOAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn exists_for_user(&self, user_id: i64) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM loans WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn exists_for_book(&self, book_id: i64) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM loans WHERE book_id = $1)")
                .bind(book_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn save(&self, loan: LoanInput) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        if let Some(id) = loan.id {
            let merged = sqlx::query_as::<_, Loan>(&format!(
                "UPDATE loans SET user_id = $2, book_id = $3 WHERE id = $1 RETURNING {}",
                LOAN_COLUMNS
            ))
            .bind(id)
            .bind(loan.user_id)
            .bind(loan.book_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::from_foreign_key(e, missing_reference(&loan)))?;

            if let Some(merged) = merged {
                tx.commit().await?;
                tracing::debug!("Merged loan {}", merged.id);
                return Ok(merged);
            }
        }

        // Same construction as the in-memory store so both agree on the
        // returned/return_date pair
        let on_violation = missing_reference(&loan);
        let draft = loan.clone().into_loan(0);

        let inserted = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (user_id, book_id, loan_date, return_date, returned)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(draft.user_id)
        .bind(draft.book_id)
        .bind(draft.loan_date)
        .bind(draft.return_date)
        .bind(draft.returned)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_foreign_key(e, on_violation))?;

        tx.commit().await?;
        tracing::debug!("Inserted loan {}", inserted.id);
        Ok(inserted)
    }

    async fn update(&self, id: i64, loan: &LoanInput) -> AppResult<Option<Loan>> {
        let updated = sqlx::query_as::<_, Loan>(&format!(
            "UPDATE loans SET user_id = $2, book_id = $3 WHERE id = $1 RETURNING {}",
            LOAN_COLUMNS
        ))
        .bind(id)
        .bind(loan.user_id)
        .bind(loan.book_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_foreign_key(e, missing_reference(loan)))?;
        Ok(updated)
    }

    async fn update_return_status(&self, id: i64, returned: bool) -> AppResult<Option<Loan>> {
        let updated = sqlx::query_as::<_, Loan>(&format!(
            r#"
            UPDATE loans
            SET returned = $2,
                return_date = CASE WHEN $2 THEN COALESCE(return_date, $3) ELSE NULL END
            WHERE id = $1
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(id)
        .bind(returned)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
