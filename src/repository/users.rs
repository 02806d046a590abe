//! Users repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use super::UserRepository;
use crate::{
    error::{AppError, AppResult},
    models::user::{User, UserInput},
};

const USER_COLUMNS: &str = "id, first_name, last_name, birth_date, registered_at, role";

#[derive(Clone)]
pub struct PgUsersRepository {
    pool: Pool<Postgres>,
}

impl PgUsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUsersRepository {
    async fn find_all(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        tracing::debug!("Loaded {} users", users.len());
        Ok(users)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_first_name(&self, first_name: &str) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE first_name = $1 ORDER BY id",
            USER_COLUMNS
        ))
        .bind(first_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find_by_last_name(&self, last_name: &str) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE last_name = $1 ORDER BY id",
            USER_COLUMNS
        ))
        .bind(last_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find_by_registered_after(&self, date: NaiveDate) -> AppResult<Vec<User>> {
        let start_of_day = date.and_time(chrono::NaiveTime::MIN).and_utc();

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE registered_at > $1 ORDER BY id",
            USER_COLUMNS
        ))
        .bind(start_of_day)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn save(&self, user: UserInput) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        if let Some(id) = user.id {
            let merged = sqlx::query_as::<_, User>(&format!(
                r#"
                UPDATE users
                SET first_name = $2, last_name = $3, birth_date = $4, role = $5
                WHERE id = $1
                RETURNING {}
                "#,
                USER_COLUMNS
            ))
            .bind(id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.birth_date)
            .bind(user.role)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(merged) = merged {
                tx.commit().await?;
                tracing::debug!("Merged user {}", merged.id);
                return Ok(merged);
            }
        }

        let inserted = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (first_name, last_name, birth_date, role, registered_at)
            VALUES ($1, $2, $3, $4, COALESCE($5, NOW()))
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.birth_date)
        .bind(user.role)
        .bind(user.registered_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!("Inserted user {}", inserted.id);
        Ok(inserted)
    }

    async fn update(&self, id: i64, user: &UserInput) -> AppResult<Option<User>> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, birth_date = $4, role = $5
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.birth_date)
        .bind(user.role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::from_foreign_key(e, || {
                    AppError::Conflict(format!("User with id {} is referenced by loans", id))
                })
            })?;
        Ok(result.rows_affected() > 0)
    }
}
