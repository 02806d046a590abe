//! Data models for the library server

pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookInput};
pub use loan::{Loan, LoanInput, ReturnStatus};
pub use user::{Role, User, UserInput};
