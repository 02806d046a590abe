//! User management endpoints

use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::user::{User, UserInput},
    AppState,
};

use super::{AppJson, AppPath};

/// List all users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = Vec<User>)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    let users = state.services.users.list().await?;
    Ok(Json(users))
}

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_id(id).await?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/users/first-name/{name}",
    tag = "users",
    params(
        ("name" = String, Path, description = "Exact first name")
    ),
    responses(
        (status = 200, description = "Matching users, possibly empty", body = Vec<User>)
    )
)]
pub async fn list_users_by_first_name(
    State(state): State<AppState>,
    AppPath(name): AppPath<String>,
) -> AppResult<Json<Vec<User>>> {
    let users = state.services.users.list_by_first_name(&name).await?;
    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/users/last-name/{name}",
    tag = "users",
    params(
        ("name" = String, Path, description = "Exact last name")
    ),
    responses(
        (status = 200, description = "Matching users, possibly empty", body = Vec<User>)
    )
)]
pub async fn list_users_by_last_name(
    State(state): State<AppState>,
    AppPath(name): AppPath<String>,
) -> AppResult<Json<Vec<User>>> {
    let users = state.services.users.list_by_last_name(&name).await?;
    Ok(Json(users))
}

/// List users registered after a date (YYYY-MM-DD)
#[utoipa::path(
    get,
    path = "/users/registered-after/{date}",
    tag = "users",
    params(
        ("date" = String, Path, description = "Date in YYYY-MM-DD format")
    ),
    responses(
        (status = 200, description = "Matching users, possibly empty", body = Vec<User>),
        (status = 400, description = "Invalid date", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users_registered_after(
    State(state): State<AppState>,
    AppPath(date): AppPath<NaiveDate>,
) -> AppResult<Json<Vec<User>>> {
    let users = state.services.users.list_registered_after(date).await?;
    Ok(Json(users))
}

/// Create a new user (or merge into the one named by `id`)
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = UserInput,
    responses(
        (status = 200, description = "User stored", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(user): AppJson<Option<UserInput>>,
) -> AppResult<Json<User>> {
    let saved = state.services.users.save(user).await?;
    Ok(Json(saved))
}

/// Update an existing user
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UserInput,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(user): AppJson<UserInput>,
) -> AppResult<Json<User>> {
    let updated = state.services.users.update(id, user).await?;
    Ok(Json(updated))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 409, description = "User is referenced by loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    state.services.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
