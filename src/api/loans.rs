//! Loan management endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanInput, ReturnStatus},
    AppState,
};

use super::{AppJson, AppPath, AppQuery};

/// List all loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    responses(
        (status = 200, description = "All loans", body = Vec<Loan>)
    )
)]
pub async fn list_loans(State(state): State<AppState>) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list().await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_by_id(id).await?;
    Ok(Json(loan))
}

/// Get loans for a specific user
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's loans, possibly empty", body = Vec<Loan>)
    )
)]
pub async fn list_user_loans(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i64>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list_for_user(user_id).await?;
    Ok(Json(loans))
}

/// Get the loan history of a book
#[utoipa::path(
    get,
    path = "/books/{id}/loans",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book's loans, possibly empty", body = Vec<Loan>)
    )
)]
pub async fn list_book_loans(
    State(state): State<AppState>,
    AppPath(book_id): AppPath<i64>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list_for_book(book_id).await?;
    Ok(Json(loans))
}

/// List loans not yet returned
#[utoipa::path(
    get,
    path = "/loans/not-returned",
    tag = "loans",
    responses(
        (status = 200, description = "Outstanding loans, possibly empty", body = Vec<Loan>)
    )
)]
pub async fn list_not_returned_loans(State(state): State<AppState>) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list_not_returned().await?;
    Ok(Json(loans))
}

/// Create a new loan (lend a book)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = LoanInput,
    responses(
        (status = 200, description = "Loan stored", body = Loan),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AppJson(loan): AppJson<Option<LoanInput>>,
) -> AppResult<Json<Loan>> {
    let saved = state.services.loans.create(loan).await?;
    Ok(Json(saved))
}

/// Reassign a loan to another user or book
#[utoipa::path(
    put,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    request_body = LoanInput,
    responses(
        (status = 200, description = "Loan updated", body = Loan),
        (status = 404, description = "Loan, user or book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_loan(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(loan): AppJson<LoanInput>,
) -> AppResult<Json<Loan>> {
    let updated = state.services.loans.update(id, loan).await?;
    Ok(Json(updated))
}

/// Mark a loan returned or outstanding
#[utoipa::path(
    put,
    path = "/loans/{id}/return-status",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID"),
        ReturnStatus
    ),
    responses(
        (status = 200, description = "Return status updated", body = Loan),
        (status = 400, description = "Missing or invalid `returned` flag", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_return_status(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppQuery(status): AppQuery<ReturnStatus>,
) -> AppResult<Json<Loan>> {
    let loan = state
        .services
        .loans
        .set_return_status(id, status.returned)
        .await?;
    Ok(Json(loan))
}

/// Delete a loan
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_loan(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    state.services.loans.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
