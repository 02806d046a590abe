//! Loan model and the return-status transition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Loan record as stored
///
/// `returned` and `return_date` always move together: a returned loan has a
/// return date, an outstanding one has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub loan_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub returned: bool,
}

/// Create / update loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoanInput {
    pub id: Option<i64>,
    pub user_id: i64,
    pub book_id: i64,
    pub loan_date: Option<DateTime<Utc>>,
    /// Only honoured on insert; use the return-status endpoint afterwards
    #[serde(default)]
    pub returned: bool,
}

/// Query for the return-status transition
#[derive(Debug, Clone, Copy, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReturnStatus {
    pub returned: bool,
}

impl LoanInput {
    pub fn new(user_id: i64, book_id: i64) -> Self {
        Self {
            id: None,
            user_id,
            book_id,
            loan_date: None,
            returned: false,
        }
    }

    pub fn into_loan(self, id: i64) -> Loan {
        let now = Utc::now();
        let mut loan = Loan {
            id,
            user_id: self.user_id,
            book_id: self.book_id,
            loan_date: self.loan_date.unwrap_or(now),
            return_date: None,
            returned: false,
        };
        loan.set_returned(self.returned, now);
        loan
    }
}

impl Loan {
    /// Overwrite the references; dates and return status are kept
    pub fn apply(&mut self, input: &LoanInput) {
        self.user_id = input.user_id;
        self.book_id = input.book_id;
    }

    /// Move between OUTSTANDING and RETURNED.
    ///
    /// Marking an already returned loan keeps its first return date;
    /// marking a loan outstanding clears it.
    pub fn set_returned(&mut self, returned: bool, now: DateTime<Utc>) {
        self.returned = returned;
        self.return_date = if returned {
            Some(self.return_date.unwrap_or(now))
        } else {
            None
        };
    }
}
