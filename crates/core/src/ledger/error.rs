//! Ledger error types for validation and state errors.
//!
//! This module defines all errors that can occur during ledger operations:
//! amount validation, entity lookup, payment state, concurrency, and
//! persistence failures.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use praxis_shared::types::money::MoneyError;

use super::types::PaymentStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Tendered or charged amount is not positive.
    #[error("Amount must be positive: {0}")]
    NonPositiveAmount(Decimal),

    /// Amount carries more than 2 decimal places.
    #[error("Amount has more than 2 decimal places: {0}")]
    InvalidPrecision(Decimal),

    // ========== Lookup Errors ==========
    /// Client not found.
    #[error("Client not found: {0}")]
    ClientNotFound(Uuid),

    /// Session not found.
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// Payment not found.
    #[error("Payment not found: {0}")]
    PaymentNotFound(Uuid),

    // ========== Payment State Errors ==========
    /// The payment's status does not allow the requested action.
    #[error("Payment {payment_id} is {status} and cannot accept tenders")]
    PaymentNotSettleable {
        /// The payment ID.
        payment_id: Uuid,
        /// The status that blocked the action.
        status: PaymentStatus,
    },

    /// Invalid status transition.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: PaymentStatus,
        /// Requested status.
        to: PaymentStatus,
    },

    /// Break sessions are never charged.
    #[error("Session {0} is a break and cannot be charged")]
    SessionNotChargeable(Uuid),

    /// Session price cannot change once a payment exists.
    #[error("Session {0} already has a payment; its price is locked")]
    PriceLocked(Uuid),

    /// Refund amount exceeds what was actually paid.
    #[error("Refund of {refund} exceeds the {paid} paid on payment {payment_id}")]
    RefundExceedsPaid {
        /// The payment ID.
        payment_id: Uuid,
        /// Requested refund amount.
        refund: Decimal,
        /// Total actually paid.
        paid: Decimal,
    },

    // ========== Concurrency Errors ==========
    /// A concurrent writer won the race; the caller should retry.
    #[error("Concurrent modification detected, please retry")]
    ConcurrencyConflict,

    // ========== Persistence Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount(_) | Self::InvalidPrecision(_) => "INVALID_AMOUNT",
            Self::ClientNotFound(_) => "CLIENT_NOT_FOUND",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::PaymentNotSettleable { .. } => "PAYMENT_NOT_SETTLEABLE",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::SessionNotChargeable(_) => "SESSION_NOT_CHARGEABLE",
            Self::PriceLocked(_) => "PRICE_LOCKED",
            Self::RefundExceedsPaid { .. } => "REFUND_EXCEEDS_PAID",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::Database(_) => "LEDGER_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::NonPositiveAmount(_) | Self::InvalidPrecision(_) => 400,

            // 404 Not Found
            Self::ClientNotFound(_) | Self::SessionNotFound(_) | Self::PaymentNotFound(_) => 404,

            // 422 Unprocessable - business rule violations
            Self::PaymentNotSettleable { .. }
            | Self::InvalidStatusTransition { .. }
            | Self::SessionNotChargeable(_)
            | Self::PriceLocked(_)
            | Self::RefundExceedsPaid { .. } => 422,

            // 409 Conflict - concurrency errors
            Self::ConcurrencyConflict => 409,

            // 500 Internal Server Error
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::Negative(amount) => Self::NonPositiveAmount(amount),
            MoneyError::TooPrecise(amount) => Self::InvalidPrecision(amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::NonPositiveAmount(dec!(0)).error_code(),
            "INVALID_AMOUNT"
        );
        assert_eq!(
            LedgerError::InvalidPrecision(dec!(1.005)).error_code(),
            "INVALID_AMOUNT"
        );
        assert_eq!(
            LedgerError::PaymentNotSettleable {
                payment_id: Uuid::nil(),
                status: PaymentStatus::Cancelled,
            }
            .error_code(),
            "PAYMENT_NOT_SETTLEABLE"
        );
        assert_eq!(
            LedgerError::ConcurrencyConflict.error_code(),
            "CONCURRENCY_CONFLICT"
        );
        assert_eq!(
            LedgerError::Database("down".into()).error_code(),
            "LEDGER_UNAVAILABLE"
        );
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(LedgerError::NonPositiveAmount(dec!(-1)).http_status_code(), 400);
        assert_eq!(
            LedgerError::PaymentNotFound(Uuid::nil()).http_status_code(),
            404
        );
        assert_eq!(
            LedgerError::InvalidStatusTransition {
                from: PaymentStatus::Cancelled,
                to: PaymentStatus::Paid,
            }
            .http_status_code(),
            422
        );
        assert_eq!(LedgerError::ConcurrencyConflict.http_status_code(), 409);
        assert_eq!(LedgerError::Internal("boom".into()).http_status_code(), 500);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LedgerError::ConcurrencyConflict.is_retryable());
        assert!(!LedgerError::NonPositiveAmount(dec!(0)).is_retryable());
        assert!(!LedgerError::Database("down".into()).is_retryable());
    }

    #[test]
    fn test_money_error_conversion() {
        let err: LedgerError = MoneyError::Negative(dec!(-5)).into();
        assert!(matches!(err, LedgerError::NonPositiveAmount(_)));

        let err: LedgerError = MoneyError::TooPrecise(dec!(1.001)).into();
        assert!(matches!(err, LedgerError::InvalidPrecision(_)));
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::InvalidStatusTransition {
            from: PaymentStatus::Cancelled,
            to: PaymentStatus::Paid,
        };
        assert_eq!(err.to_string(), "Invalid status transition: cancelled -> paid");

        let err = LedgerError::RefundExceedsPaid {
            payment_id: Uuid::nil(),
            refund: dec!(200),
            paid: dec!(150),
        };
        assert!(err.to_string().contains("exceeds"));
    }
}
