//! User management service

use chrono::NaiveDate;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{User, UserInput},
    repository::Repository,
};

use super::cache::EntityCache;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    cache: EntityCache,
}

impl UsersService {
    pub fn new(repository: Repository, cache: EntityCache) -> Self {
        Self { repository, cache }
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        let users = self.repository.users.find_all().await?;
        tracing::info!("Found {} users", users.len());
        Ok(users)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        let key = self.cache.key("id", id);
        if let Some(user) = self.cache.get::<User>(&key).await {
            return Ok(user);
        }

        let user = self.repository.users.find_by_id(id).await?.ok_or_else(|| {
            tracing::warn!(user_id = id, "User not found");
            AppError::NotFound(format!("User with id {} not found", id))
        })?;

        self.cache.put(&key, &user).await;
        Ok(user)
    }

    pub async fn list_by_first_name(&self, first_name: &str) -> AppResult<Vec<User>> {
        let users = self.repository.users.find_by_first_name(first_name).await?;
        tracing::info!("Found {} users named '{}'", users.len(), first_name);
        Ok(users)
    }

    pub async fn list_by_last_name(&self, last_name: &str) -> AppResult<Vec<User>> {
        let users = self.repository.users.find_by_last_name(last_name).await?;
        tracing::info!("Found {} users with last name '{}'", users.len(), last_name);
        Ok(users)
    }

    pub async fn list_registered_after(&self, date: NaiveDate) -> AppResult<Vec<User>> {
        let users = self.repository.users.find_by_registered_after(date).await?;
        tracing::info!("Found {} users registered after {}", users.len(), date);
        Ok(users)
    }

    /// Insert a new user, or merge into the one named by `id`
    pub async fn save(&self, user: Option<UserInput>) -> AppResult<User> {
        let user = user.ok_or_else(|| {
            tracing::warn!("Rejected empty user payload");
            AppError::BadRequest("User cannot be empty".to_string())
        })?;
        user.validate()?;

        let saved = self.repository.users.save(user).await?;
        self.cache.put(&self.cache.key("id", saved.id), &saved).await;

        tracing::info!(user_id = saved.id, "User saved");
        Ok(saved)
    }

    /// Update an existing user; the path id always wins over the payload id
    pub async fn update(&self, id: i64, mut user: UserInput) -> AppResult<User> {
        user.validate()?;

        if self.repository.users.find_by_id(id).await?.is_none() {
            tracing::warn!(user_id = id, "User not found for update");
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        user.id = Some(id);
        let updated = self
            .repository
            .users
            .update(id, &user)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;

        self.cache.put(&self.cache.key("id", id), &updated).await;

        tracing::info!(user_id = id, "User updated");
        Ok(updated)
    }

    /// Delete a user that no loan references
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let _references = self.repository.lock_references().await;

        if self.repository.users.find_by_id(id).await?.is_none() {
            tracing::warn!(user_id = id, "User not found for deletion");
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        if self.repository.loans.exists_for_user(id).await? {
            return Err(AppError::Conflict(format!(
                "User with id {} is referenced by loans",
                id
            )));
        }

        self.repository.users.delete_by_id(id).await?;
        self.cache.evict(&self.cache.key("id", id)).await;

        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        models::user::Role,
        repository::{MockBookRepository, MockLoanRepository, MockUserRepository},
        services::cache::MemoryCache,
    };

    fn ann(id: i64) -> User {
        User {
            id,
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            birth_date: None,
            registered_at: Utc::now(),
            role: Role::Reader,
        }
    }

    fn service(users: MockUserRepository, loans: MockLoanRepository) -> UsersService {
        let repository = Repository::from_stores(
            Arc::new(MockBookRepository::new()),
            Arc::new(users),
            Arc::new(loans),
        );
        UsersService::new(repository, EntityCache::new(Arc::new(MemoryCache::new(60)), "users"))
    }

    #[tokio::test]
    async fn test_update_replaces_cached_entry() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .with(eq(1))
            .times(2)
            .returning(|id| Ok(Some(ann(id))));
        users.expect_update().returning(|id, input| {
            let mut user = ann(id);
            user.apply(input);
            Ok(Some(user))
        });

        let service = service(users, MockLoanRepository::new());
        assert_eq!(service.get_by_id(1).await.unwrap().last_name, "Lee");

        let mut input = UserInput::new("Ann", "Park");
        input.role = Role::Librarian;
        service.update(1, input).await.unwrap();

        // Served from the replaced cache entry, no third repository read
        let cached = service.get_by_id(1).await.unwrap();
        assert_eq!(cached.last_name, "Park");
        assert_eq!(cached.role, Role::Librarian);
    }

    #[tokio::test]
    async fn test_update_missing_never_touches_storage() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| Ok(None));
        users.expect_update().never();

        let result = service(users, MockLoanRepository::new())
            .update(8, UserInput::new("Ann", "Lee"))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_user_with_loans_is_refused() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| Ok(Some(ann(id))));
        users.expect_delete_by_id().never();

        let mut loans = MockLoanRepository::new();
        loans.expect_exists_for_user().with(eq(1)).returning(|_| Ok(true));

        let result = service(users, loans).delete(1).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_evicts_cached_user() {
        let mut users = MockUserRepository::new();
        let mut lookups = 0;
        users.expect_find_by_id().returning(move |id| {
            lookups += 1;
            // Present for the first read and the delete check, gone afterwards
            Ok(if lookups <= 2 { Some(ann(id)) } else { None })
        });
        users.expect_delete_by_id().times(1).returning(|_| Ok(true));

        let mut loans = MockLoanRepository::new();
        loans.expect_exists_for_user().returning(|_| Ok(false));

        let service = service(users, loans);
        service.get_by_id(2).await.unwrap();
        service.delete(2).await.unwrap();

        assert!(matches!(service.get_by_id(2).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_last_name_without_matches_is_empty() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_last_name().returning(|_| Ok(Vec::new()));

        let users = service(users, MockLoanRepository::new())
            .list_by_last_name("Nobody")
            .await
            .unwrap();
        assert!(users.is_empty());
    }
}
