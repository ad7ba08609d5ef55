//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the
//! application. All ledger writes go through [`AllocationRepository`] and
//! [`PaymentRepository`]; nothing else touches `clients.credit_balance`.

pub mod allocation;
pub mod client;
pub mod payment;
pub mod session;

pub use allocation::{AllocationOutcome, AllocationRepository, TenderInput};
pub use client::{ClientRepository, CreateClientInput};
pub use payment::{PaymentRepository, PaymentWithEntries};
pub use session::{CreateSessionInput, SessionRepository, UpdateSessionInput};

use praxis_core::ledger::LedgerError;
use praxis_shared::types::Money;
use rust_decimal::Decimal;
use sea_orm::DbErr;

/// Maps a database error into the ledger taxonomy.
pub(crate) fn db_err(err: DbErr) -> LedgerError {
    LedgerError::Database(err.to_string())
}

/// Converts a stored decimal into `Money`.
///
/// Column constraints keep stored amounts non-negative with 2-decimal
/// scale, so a failure here means corrupt data, not bad input.
pub(crate) fn stored_money(amount: Decimal) -> Result<Money, LedgerError> {
    Money::try_new(amount).map_err(|e| LedgerError::Internal(format!("corrupt stored amount: {e}")))
}
