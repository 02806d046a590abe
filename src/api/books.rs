//! Book catalog endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::book::{Book, BookInput},
    AppState,
};

use super::{AppJson, AppPath};

/// List all books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.list().await?;
    Ok(Json(books))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.get_by_id(id).await?;
    Ok(Json(book))
}

/// Get book by exact title
#[utoipa::path(
    get,
    path = "/books/title/{title}",
    tag = "books",
    params(
        ("title" = String, Path, description = "Exact title")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "No book with this title", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book_by_title(
    State(state): State<AppState>,
    AppPath(title): AppPath<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.get_by_title(&title).await?;
    Ok(Json(book))
}

/// List books that can currently be lent
#[utoipa::path(
    get,
    path = "/books/available",
    tag = "books",
    responses(
        (status = 200, description = "Available books", body = Vec<Book>)
    )
)]
pub async fn list_available_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.list_available().await?;
    Ok(Json(books))
}

/// List books by author
#[utoipa::path(
    get,
    path = "/books/author/{author}",
    tag = "books",
    params(
        ("author" = String, Path, description = "Exact author name")
    ),
    responses(
        (status = 200, description = "Books by this author, possibly empty", body = Vec<Book>)
    )
)]
pub async fn list_books_by_author(
    State(state): State<AppState>,
    AppPath(author): AppPath<String>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.list_by_author(&author).await?;
    Ok(Json(books))
}

/// List books published after a year
#[utoipa::path(
    get,
    path = "/books/published-after/{year}",
    tag = "books",
    params(
        ("year" = i32, Path, description = "Exclusive lower bound")
    ),
    responses(
        (status = 200, description = "Matching books, possibly empty", body = Vec<Book>),
        (status = 400, description = "Invalid year", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books_published_after(
    State(state): State<AppState>,
    AppPath(year): AppPath<i32>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.list_published_after(year).await?;
    Ok(Json(books))
}

/// List books with more pages than a threshold
#[utoipa::path(
    get,
    path = "/books/pages-over/{count}",
    tag = "books",
    params(
        ("count" = i32, Path, description = "Exclusive lower bound on page count")
    ),
    responses(
        (status = 200, description = "Matching books, possibly empty", body = Vec<Book>),
        (status = 400, description = "Invalid page count", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books_with_more_pages_than(
    State(state): State<AppState>,
    AppPath(count): AppPath<i32>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.list_with_more_pages_than(count).await?;
    Ok(Json(books))
}

/// Create a book (or merge into the one named by `id`)
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = BookInput,
    responses(
        (status = 200, description = "Book stored", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AppJson(book): AppJson<Option<BookInput>>,
) -> AppResult<Json<Book>> {
    let saved = state.services.books.save(book).await?;
    Ok(Json(saved))
}

/// Update an existing book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(book): AppJson<BookInput>,
) -> AppResult<Json<Book>> {
    let updated = state.services.books.update(id, book).await?;
    Ok(Json(updated))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is referenced by loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    state.services.books.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
