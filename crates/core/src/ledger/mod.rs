//! Payment ledger logic.
//!
//! This module implements the core ledger functionality:
//! - Domain types for sessions, payments, and tender entries
//! - The allocation engine splitting tenders across debt and credit
//! - Debt/credit aggregation (read-side projections)
//! - The payment status state machine
//! - Allocation domain events
//! - Error types for ledger operations

pub mod allocation;
pub mod error;
pub mod events;
pub mod status;
pub mod summary;
pub mod types;

#[cfg(test)]
mod allocation_props;

pub use allocation::AllocationEngine;
pub use error::LedgerError;
pub use events::AllocationEvent;
pub use status::validate_transition;
pub use summary::{
    DebtAggregator, DebtSummary, MonthKey, MonthlyTotal, SettledPayment, TenderRecord,
    UnpaidSession,
};
pub use types::{
    AllocationPlan, AllocationStep, PaymentMethod, PaymentSnapshot, PaymentStatus, SessionKind,
};
