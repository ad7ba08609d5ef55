//! Property-based tests for the allocation engine.
//!
//! - Conservation: tendered money is fully accounted for between applied
//!   entries and the credit balance
//! - Credit balance can never go negative
//! - A payment's stored total never exceeds its expected amount
//! - Status is paid exactly when the charge is covered
//! - Bulk settlement retires oldest sessions first

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use praxis_shared::types::{Money, PaymentId, SessionId};

use super::allocation::AllocationEngine;
use super::types::{PaymentSnapshot, PaymentStatus};

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Money> {
    (1i64..1_000_000i64).prop_map(|cents| Money::try_new(Decimal::new(cents, 2)).unwrap())
}

/// Strategy to generate non-negative amounts (0.00 to 10,000.00).
fn amount() -> impl Strategy<Value = Money> {
    (0i64..1_000_000i64).prop_map(|cents| Money::try_new(Decimal::new(cents, 2)).unwrap())
}

/// Strategy to generate a pending payment with partial history.
fn pending_payment() -> impl Strategy<Value = PaymentSnapshot> {
    (positive_amount(), amount(), 0u32..3_000_000u32).prop_map(|(expected, paid_raw, offset)| {
        // Keep paid strictly below expected so the payment is still open.
        let paid = if paid_raw >= expected {
            Money::ZERO
        } else {
            paid_raw
        };
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::seconds(i64::from(offset));
        PaymentSnapshot {
            id: PaymentId::new(),
            session_id: SessionId::new(),
            session_start: start,
            status: PaymentStatus::Pending,
            expected_amount: expected,
            paid_amount: paid,
        }
    })
}

fn sorted_starts(payments: &[PaymentSnapshot]) -> Vec<(DateTime<Utc>, PaymentId)> {
    let mut starts: Vec<(DateTime<Utc>, PaymentId)> = payments
        .iter()
        .map(|p| (p.session_start, p.id))
        .collect();
    starts.sort();
    starts
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// For any single allocation, the tender is fully accounted for:
    /// what lands on the payment plus what is banked equals the tender.
    #[test]
    fn prop_single_conserves_money(
        payment in pending_payment(),
        tendered in positive_amount(),
        use_credit in any::<bool>(),
        credit in amount(),
    ) {
        let plan = AllocationEngine::plan_single(&payment, tendered, use_credit, credit).unwrap();

        prop_assert_eq!(
            plan.tender_applied().add(plan.credit_gained),
            tendered,
            "tender must split exactly between payment and credit"
        );
    }

    /// Credit spending never exceeds the balance it was given, so the
    /// resulting balance is never negative.
    #[test]
    fn prop_credit_balance_never_negative(
        payment in pending_payment(),
        tendered in positive_amount(),
        credit in amount(),
    ) {
        let plan = AllocationEngine::plan_single(&payment, tendered, true, credit).unwrap();

        prop_assert!(plan.credit_spent <= credit);
        let after = plan.credit_balance_after(credit);
        prop_assert!(after >= Money::ZERO);
    }

    /// The stored total on a payment never exceeds its expected amount;
    /// status is paid exactly when the charge is covered.
    #[test]
    fn prop_stored_total_capped_and_status_consistent(
        payment in pending_payment(),
        tendered in positive_amount(),
        use_credit in any::<bool>(),
        credit in amount(),
    ) {
        let plan = AllocationEngine::plan_single(&payment, tendered, use_credit, credit).unwrap();

        for step in &plan.steps {
            let total_after = payment.paid_amount.add(step.total_applied());
            prop_assert!(total_after <= payment.expected_amount);
            let covered = total_after >= payment.expected_amount;
            prop_assert_eq!(step.new_status == PaymentStatus::Paid, covered);
        }
    }

    /// Bulk settlement conserves money across many payments.
    #[test]
    fn prop_settle_all_conserves_money(
        payments in prop::collection::vec(pending_payment(), 0..8),
        tendered in positive_amount(),
    ) {
        let plan = AllocationEngine::plan_settle_all(&payments, tendered).unwrap();

        prop_assert_eq!(plan.tender_applied().add(plan.credit_gained), tendered);
    }

    /// Bulk settlement walks payments strictly oldest-first: a payment
    /// receives money only if every older payment was fully retired.
    #[test]
    fn prop_settle_all_is_oldest_first(
        payments in prop::collection::vec(pending_payment(), 1..8),
        tendered in positive_amount(),
    ) {
        let plan = AllocationEngine::plan_settle_all(&payments, tendered).unwrap();
        let order = sorted_starts(&payments);

        // Steps appear in chronological order.
        let step_positions: Vec<usize> = plan
            .steps
            .iter()
            .map(|s| order.iter().position(|(_, id)| *id == s.payment_id).unwrap())
            .collect();
        let mut sorted_positions = step_positions.clone();
        sorted_positions.sort_unstable();
        prop_assert_eq!(&step_positions, &sorted_positions);

        // Every step except the last fully retires its payment.
        for step in plan.steps.iter().rev().skip(1) {
            prop_assert_eq!(step.new_status, PaymentStatus::Paid);
        }

        // Money is banked only when every open payment was retired.
        if plan.credit_gained.is_positive() {
            for step in &plan.steps {
                prop_assert_eq!(step.new_status, PaymentStatus::Paid);
            }
            let open_count = payments
                .iter()
                .filter(|p| p.debt().is_positive())
                .count();
            prop_assert_eq!(plan.steps.len(), open_count);
        }
    }
}
