//! Payment status state machine.
//!
//! Legal transitions:
//! - `pending -> paid` (settling tender lands)
//! - `pending -> cancelled` (session cancelled with no remaining charge)
//! - `paid -> refunded` (explicit reversal)
//!
//! Everything else is rejected. Cancelled and refunded payments keep their
//! amounts for audit; only the status changes.

use praxis_shared::types::Money;

use super::error::LedgerError;
use super::types::PaymentStatus;

/// Validates a requested status transition.
///
/// # Errors
///
/// Returns `LedgerError::InvalidStatusTransition` for any transition not in
/// the machine above. Self-transitions are also rejected.
pub fn validate_transition(from: PaymentStatus, to: PaymentStatus) -> Result<(), LedgerError> {
    let allowed = matches!(
        (from, to),
        (PaymentStatus::Pending, PaymentStatus::Paid)
            | (PaymentStatus::Pending, PaymentStatus::Cancelled)
            | (PaymentStatus::Paid, PaymentStatus::Refunded)
    );

    if allowed {
        Ok(())
    } else {
        Err(LedgerError::InvalidStatusTransition { from, to })
    }
}

/// Derives the open/settled status from the recorded amounts.
///
/// A payment is `paid` exactly when the recorded tenders cover the
/// expected amount. Status is always written in the same transaction as
/// the entries, so the two can never disagree in storage.
#[must_use]
pub fn derive_status(paid_amount: Money, expected_amount: Money) -> PaymentStatus {
    if paid_amount >= expected_amount {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(PaymentStatus::Pending, PaymentStatus::Paid)]
    #[case(PaymentStatus::Pending, PaymentStatus::Cancelled)]
    #[case(PaymentStatus::Paid, PaymentStatus::Refunded)]
    fn test_legal_transitions(#[case] from: PaymentStatus, #[case] to: PaymentStatus) {
        assert!(validate_transition(from, to).is_ok());
    }

    #[rstest]
    #[case(PaymentStatus::Cancelled, PaymentStatus::Paid)]
    #[case(PaymentStatus::Cancelled, PaymentStatus::Pending)]
    #[case(PaymentStatus::Refunded, PaymentStatus::Paid)]
    #[case(PaymentStatus::Paid, PaymentStatus::Pending)]
    #[case(PaymentStatus::Paid, PaymentStatus::Cancelled)]
    #[case(PaymentStatus::Pending, PaymentStatus::Refunded)]
    #[case(PaymentStatus::Pending, PaymentStatus::Pending)]
    #[case(PaymentStatus::Paid, PaymentStatus::Paid)]
    fn test_illegal_transitions(#[case] from: PaymentStatus, #[case] to: PaymentStatus) {
        assert!(matches!(
            validate_transition(from, to),
            Err(LedgerError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_derive_status() {
        let expected = Money::try_new(dec!(300)).unwrap();
        assert_eq!(
            derive_status(Money::try_new(dec!(299.99)).unwrap(), expected),
            PaymentStatus::Pending
        );
        assert_eq!(
            derive_status(Money::try_new(dec!(300)).unwrap(), expected),
            PaymentStatus::Paid
        );
    }

    #[test]
    fn test_derive_status_zero_charge_is_paid() {
        // A zero-priced session has nothing to owe.
        assert_eq!(derive_status(Money::ZERO, Money::ZERO), PaymentStatus::Paid);
    }
}
