//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library API",
        version = "1.0.0",
        description = "Book, user and loan management REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::get_book_by_title,
        books::list_available_books,
        books::list_books_by_author,
        books::list_books_published_after,
        books::list_books_with_more_pages_than,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Users
        users::list_users,
        users::get_user,
        users::list_users_by_first_name,
        users::list_users_by_last_name,
        users::list_users_registered_after,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::list_user_loans,
        loans::list_book_loans,
        loans::list_not_returned_loans,
        loans::create_loan,
        loans::update_loan,
        loans::update_return_status,
        loans::delete_loan,
    ),
    components(
        schemas(
            crate::models::book::Book,
            crate::models::book::BookInput,
            crate::models::user::User,
            crate::models::user::UserInput,
            crate::models::user::Role,
            crate::models::loan::Loan,
            crate::models::loan::LoanInput,
            crate::models::loan::ReturnStatus,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "users", description = "User management"),
        (name = "loans", description = "Loan management")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
