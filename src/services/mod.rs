//! Business logic services

pub mod books;
pub mod cache;
pub mod loans;
pub mod users;

use std::sync::Arc;

use crate::repository::Repository;
use cache::{CacheStore, EntityCache};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub books: books::BooksService,
    pub users: users::UsersService,
    pub loans: loans::LoansService,
    pub repository: Repository,
}

impl Services {
    /// Create all services over one repository and one cache store
    pub fn new(repository: Repository, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            books: books::BooksService::new(
                repository.clone(),
                EntityCache::new(cache.clone(), "books"),
            ),
            users: users::UsersService::new(
                repository.clone(),
                EntityCache::new(cache.clone(), "users"),
            ),
            loans: loans::LoansService::new(repository.clone(), EntityCache::new(cache, "loans")),
            repository,
        }
    }
}
