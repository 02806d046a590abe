//! User model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

/// User role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    Reader,
    Librarian,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "READER",
            Role::Librarian => "LIBRARIAN",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "READER" => Ok(Role::Reader),
            "LIBRARIAN" => Ok(Role::Librarian),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// Stored as TEXT
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// User record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    /// Set once when the user is first stored
    pub registered_at: DateTime<Utc>,
    pub role: Role,
}

/// Create / update user request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UserInput {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 25, message = "First name must be between 1 and 25 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 25, message = "Last name must be between 1 and 25 characters"))]
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub role: Role,
    pub registered_at: Option<DateTime<Utc>>,
}

impl UserInput {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            birth_date: None,
            role: Role::Reader,
            registered_at: None,
        }
    }

    pub fn into_user(self, id: i64) -> User {
        User {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            birth_date: self.birth_date,
            registered_at: self.registered_at.unwrap_or_else(Utc::now),
            role: self.role,
        }
    }
}

impl User {
    /// Overwrite mutable fields; id and `registered_at` are kept
    pub fn apply(&mut self, input: &UserInput) {
        self.first_name = input.first_name.clone();
        self.last_name = input.last_name.clone();
        self.birth_date = input.birth_date;
        self.role = input.role;
    }
}
