//! Allocation engine.
//!
//! Given a tendered amount, decides how it is split between a payment's
//! outstanding debt and the client's credit balance. The engine is pure:
//! it plans against [`PaymentSnapshot`]s read inside the caller's database
//! transaction, and the repository layer applies the plan atomically.

use praxis_shared::types::Money;

use super::error::LedgerError;
use super::status::derive_status;
use super::types::{AllocationPlan, AllocationStep, PaymentSnapshot, PaymentStatus};

/// Stateless allocation planner.
pub struct AllocationEngine;

impl AllocationEngine {
    /// Plans a tender against one specific payment.
    ///
    /// Semantics:
    /// 1. If the caller opted in, existing credit covers `min(credit, debt)`
    ///    first, as an implicit `credit`-method entry.
    /// 2. The tender then covers the remaining debt.
    /// 3. Any excess tender is banked to the client's credit balance.
    /// 4. A tender against an already-settled payment is banked entirely to
    ///    credit (the loser of a concurrent over-tender race is
    ///    auto-credited, never silently lost).
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveAmount` for a zero tender, and
    /// `PaymentNotSettleable` when the payment is cancelled or refunded.
    pub fn plan_single(
        payment: &PaymentSnapshot,
        tendered: Money,
        use_credit_first: bool,
        credit_balance: Money,
    ) -> Result<AllocationPlan, LedgerError> {
        validate_tender(tendered)?;

        match payment.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Paid => {
                // Debt is zero; the whole tender becomes credit.
                return Ok(AllocationPlan {
                    steps: vec![],
                    credit_spent: Money::ZERO,
                    credit_gained: tendered,
                });
            }
            PaymentStatus::Cancelled | PaymentStatus::Refunded => {
                return Err(LedgerError::PaymentNotSettleable {
                    payment_id: payment.id.into_inner(),
                    status: payment.status,
                });
            }
        }

        let debt = payment.debt();

        let credit_applied = if use_credit_first {
            credit_balance.min(debt)
        } else {
            Money::ZERO
        };
        let debt_after_credit = debt.saturating_sub(credit_applied);

        let tender_applied = tendered.min(debt_after_credit);
        let credit_gained = tendered.saturating_sub(tender_applied);

        let paid_after = payment
            .paid_amount
            .add(credit_applied)
            .add(tender_applied);
        let new_status = derive_status(paid_after, payment.expected_amount);

        let mut steps = Vec::new();
        if !credit_applied.is_zero() || !tender_applied.is_zero() {
            steps.push(AllocationStep {
                payment_id: payment.id,
                tender_applied,
                credit_applied,
                new_status,
            });
        }

        Ok(AllocationPlan {
            steps,
            credit_spent: credit_applied,
            credit_gained,
        })
    }

    /// Plans a bulk settlement across all of a client's open payments.
    ///
    /// Payments are retired oldest-session-first (tie-break: payment id
    /// ascending) until the tender is exhausted; any remainder after all
    /// debts are cleared becomes credit. The ordering is part of the
    /// contract: client statements reproduce it.
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveAmount` for a zero tender.
    pub fn plan_settle_all(
        payments: &[PaymentSnapshot],
        tendered: Money,
    ) -> Result<AllocationPlan, LedgerError> {
        validate_tender(tendered)?;

        let mut open: Vec<&PaymentSnapshot> = payments
            .iter()
            .filter(|p| p.status.is_settleable() && p.debt().is_positive())
            .collect();
        open.sort_by(|a, b| {
            a.session_start
                .cmp(&b.session_start)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut remaining = tendered;
        let mut steps = Vec::new();

        for payment in open {
            if remaining.is_zero() {
                break;
            }
            let applied = remaining.min(payment.debt());
            remaining = remaining.saturating_sub(applied);

            let paid_after = payment.paid_amount.add(applied);
            steps.push(AllocationStep {
                payment_id: payment.id,
                tender_applied: applied,
                credit_applied: Money::ZERO,
                new_status: derive_status(paid_after, payment.expected_amount),
            });
        }

        Ok(AllocationPlan {
            steps,
            credit_spent: Money::ZERO,
            credit_gained: remaining,
        })
    }
}

fn validate_tender(tendered: Money) -> Result<(), LedgerError> {
    if !tendered.is_positive() {
        return Err(LedgerError::NonPositiveAmount(tendered.amount()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use praxis_shared::types::{PaymentId, SessionId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::try_new(d).unwrap()
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, d, 10, 0, 0).unwrap()
    }

    fn pending(expected: Decimal, paid: Decimal, start: DateTime<Utc>) -> PaymentSnapshot {
        PaymentSnapshot {
            id: PaymentId::new(),
            session_id: SessionId::new(),
            session_start: start,
            status: PaymentStatus::Pending,
            expected_amount: money(expected),
            paid_amount: money(paid),
        }
    }

    #[test]
    fn test_exact_tender_settles_payment() {
        // Session price 300, no prior payment, tender 300.
        let payment = pending(dec!(300), dec!(0), day(5));
        let plan =
            AllocationEngine::plan_single(&payment, money(dec!(300)), false, Money::ZERO).unwrap();

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tender_applied, money(dec!(300)));
        assert_eq!(plan.steps[0].new_status, PaymentStatus::Paid);
        assert_eq!(plan.credit_gained, Money::ZERO);
        assert_eq!(plan.credit_spent, Money::ZERO);
    }

    #[test]
    fn test_partial_tender_keeps_payment_open() {
        // Session price 300, tender 200: debt 100 remains.
        let payment = pending(dec!(300), dec!(0), day(5));
        let plan =
            AllocationEngine::plan_single(&payment, money(dec!(200)), false, Money::ZERO).unwrap();

        assert_eq!(plan.steps[0].tender_applied, money(dec!(200)));
        assert_eq!(plan.steps[0].new_status, PaymentStatus::Pending);
        assert_eq!(plan.credit_gained, Money::ZERO);
    }

    #[test]
    fn test_second_installment_overflow_becomes_credit() {
        // 200 already paid on a 300 charge; tendering 150 settles and
        // banks 50.
        let payment = pending(dec!(300), dec!(200), day(5));
        let plan =
            AllocationEngine::plan_single(&payment, money(dec!(150)), false, Money::ZERO).unwrap();

        assert_eq!(plan.steps[0].tender_applied, money(dec!(100)));
        assert_eq!(plan.steps[0].new_status, PaymentStatus::Paid);
        assert_eq!(plan.credit_gained, money(dec!(50)));
    }

    #[test]
    fn test_use_credit_first_then_tender() {
        // Credit 40, price 100, tender 60: credit covers 40, tender 60,
        // payment settles with zero credit left.
        let payment = pending(dec!(100), dec!(0), day(5));
        let plan =
            AllocationEngine::plan_single(&payment, money(dec!(60)), true, money(dec!(40)))
                .unwrap();

        let step = &plan.steps[0];
        assert_eq!(step.credit_applied, money(dec!(40)));
        assert_eq!(step.tender_applied, money(dec!(60)));
        assert_eq!(step.new_status, PaymentStatus::Paid);
        assert_eq!(plan.credit_spent, money(dec!(40)));
        assert_eq!(plan.credit_gained, Money::ZERO);
        assert_eq!(plan.credit_balance_after(money(dec!(40))), Money::ZERO);
    }

    #[test]
    fn test_credit_first_caps_at_debt() {
        // Credit 500 against a 100 charge: only 100 of credit is spent
        // and the tender overflows entirely.
        let payment = pending(dec!(100), dec!(0), day(5));
        let plan =
            AllocationEngine::plan_single(&payment, money(dec!(30)), true, money(dec!(500)))
                .unwrap();

        assert_eq!(plan.credit_spent, money(dec!(100)));
        assert_eq!(plan.steps[0].tender_applied, Money::ZERO);
        assert_eq!(plan.credit_gained, money(dec!(30)));
        assert_eq!(plan.credit_balance_after(money(dec!(500))), money(dec!(430)));
    }

    #[test]
    fn test_tender_against_paid_payment_is_auto_credited() {
        let mut payment = pending(dec!(300), dec!(300), day(5));
        payment.status = PaymentStatus::Paid;

        let plan =
            AllocationEngine::plan_single(&payment, money(dec!(300)), false, Money::ZERO).unwrap();
        assert!(plan.steps.is_empty());
        assert_eq!(plan.credit_gained, money(dec!(300)));
    }

    #[test]
    fn test_tender_against_cancelled_payment_is_rejected() {
        let mut payment = pending(dec!(300), dec!(0), day(5));
        payment.status = PaymentStatus::Cancelled;

        let err =
            AllocationEngine::plan_single(&payment, money(dec!(300)), false, Money::ZERO)
                .unwrap_err();
        assert!(matches!(err, LedgerError::PaymentNotSettleable { .. }));
    }

    #[test]
    fn test_zero_tender_is_rejected() {
        let payment = pending(dec!(300), dec!(0), day(5));
        let err =
            AllocationEngine::plan_single(&payment, Money::ZERO, false, Money::ZERO).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount(_)));

        let err = AllocationEngine::plan_settle_all(&[], Money::ZERO).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount(_)));
    }

    #[test]
    fn test_settle_all_retires_oldest_first() {
        // Jan 5 owes 100, Jan 20 owes 50; tendering 120 settles Jan 5,
        // leaves 30 on Jan 20, banks nothing.
        let older = pending(dec!(100), dec!(0), day(5));
        let newer = pending(dec!(50), dec!(0), day(20));
        let payments = vec![newer.clone(), older.clone()];

        let plan = AllocationEngine::plan_settle_all(&payments, money(dec!(120))).unwrap();

        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].payment_id, older.id);
        assert_eq!(plan.steps[0].tender_applied, money(dec!(100)));
        assert_eq!(plan.steps[0].new_status, PaymentStatus::Paid);
        assert_eq!(plan.steps[1].payment_id, newer.id);
        assert_eq!(plan.steps[1].tender_applied, money(dec!(20)));
        assert_eq!(plan.steps[1].new_status, PaymentStatus::Pending);
        assert_eq!(plan.credit_gained, Money::ZERO);
    }

    #[test]
    fn test_settle_all_ties_break_by_payment_id() {
        let mut a = pending(dec!(100), dec!(0), day(5));
        let mut b = pending(dec!(100), dec!(0), day(5));
        // Force a deterministic id order.
        if b.id < a.id {
            std::mem::swap(&mut a, &mut b);
        }

        let plan =
            AllocationEngine::plan_settle_all(&[b.clone(), a.clone()], money(dec!(100))).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].payment_id, a.id);
    }

    #[test]
    fn test_settle_all_remainder_becomes_credit() {
        let only = pending(dec!(80), dec!(0), day(5));
        let plan = AllocationEngine::plan_settle_all(&[only], money(dec!(100))).unwrap();

        assert_eq!(plan.steps[0].tender_applied, money(dec!(80)));
        assert_eq!(plan.credit_gained, money(dec!(20)));
    }

    #[test]
    fn test_settle_all_with_no_open_debt_banks_everything() {
        let mut paid = pending(dec!(100), dec!(100), day(5));
        paid.status = PaymentStatus::Paid;

        let plan = AllocationEngine::plan_settle_all(&[paid], money(dec!(100))).unwrap();
        assert!(plan.steps.is_empty());
        assert_eq!(plan.credit_gained, money(dec!(100)));
    }

    #[test]
    fn test_settle_all_skips_cancelled_payments() {
        let mut cancelled = pending(dec!(100), dec!(0), day(1));
        cancelled.status = PaymentStatus::Cancelled;
        let open = pending(dec!(50), dec!(0), day(10));

        let plan =
            AllocationEngine::plan_settle_all(&[cancelled, open.clone()], money(dec!(50)))
                .unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].payment_id, open.id);
    }

    #[test]
    fn test_conservation_single() {
        // tendered == applied + credited, always.
        let payment = pending(dec!(300), dec!(120), day(5));
        let tendered = money(dec!(250));
        let plan = AllocationEngine::plan_single(&payment, tendered, false, Money::ZERO).unwrap();

        assert_eq!(plan.tender_applied().add(plan.credit_gained), tendered);
    }
}
