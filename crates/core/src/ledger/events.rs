//! Allocation domain events.
//!
//! Each successful allocation emits one event per atomic step. The
//! communication subsystem consumes these to send receipts; the ledger
//! itself never sends messages. Persisted events double as the
//! idempotency journal for bulk settlement.

use rust_decimal::Decimal;
use serde::Serialize;

use praxis_shared::types::{ClientId, Money, PaymentId};

use super::types::{AllocationPlan, PaymentStatus};

/// The outcome of one atomic allocation step.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationEvent {
    /// The client whose ledger moved.
    pub client_id: ClientId,
    /// The payment that received money, if any; `None` for a pure credit
    /// deposit.
    pub payment_id: Option<PaymentId>,
    /// Amount applied to the payment (tender plus spent credit).
    pub amount_applied: Money,
    /// Signed change to the client's credit balance in this step.
    pub credit_delta: Decimal,
    /// The payment's status after the step, if a payment was touched.
    pub new_status: Option<PaymentStatus>,
}

impl AllocationEvent {
    /// Events for a single-payment allocation: one event carrying both
    /// the applied amount and the net credit movement.
    ///
    /// `target` is the payment the caller aimed at; it is reported even
    /// when the whole tender was redirected to credit (the auto-credit
    /// outcome of a lost over-tender race), so receipts can say which
    /// session the client meant to pay.
    #[must_use]
    pub fn from_single(
        client_id: ClientId,
        target: PaymentId,
        plan: &AllocationPlan,
    ) -> Self {
        let (amount_applied, new_status) = plan
            .steps
            .first()
            .map_or((Money::ZERO, None), |s| {
                (s.total_applied(), Some(s.new_status))
            });

        Self {
            client_id,
            payment_id: Some(target),
            amount_applied,
            credit_delta: plan.credit_delta(),
            new_status,
        }
    }

    /// Events for a bulk settlement: one per retired payment, plus a
    /// trailing credit-deposit event if a remainder was banked.
    #[must_use]
    pub fn from_settle_all(client_id: ClientId, plan: &AllocationPlan) -> Vec<Self> {
        let mut events: Vec<Self> = plan
            .steps
            .iter()
            .map(|step| Self {
                client_id,
                payment_id: Some(step.payment_id),
                amount_applied: step.total_applied(),
                credit_delta: Decimal::ZERO,
                new_status: Some(step.new_status),
            })
            .collect();

        if plan.credit_gained.is_positive() {
            events.push(Self {
                client_id,
                payment_id: None,
                amount_applied: Money::ZERO,
                credit_delta: plan.credit_gained.amount(),
                new_status: None,
            });
        }

        events
    }

    /// Total money movement recorded by this event, used when replaying
    /// an idempotent bulk settlement to work out how much of the original
    /// tender already landed.
    #[must_use]
    pub fn tender_consumed(&self) -> Decimal {
        self.amount_applied.amount() + self.credit_delta.max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::AllocationStep;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::try_new(d).unwrap()
    }

    #[test]
    fn test_single_event_carries_net_credit() {
        let target = PaymentId::new();
        let plan = AllocationPlan {
            steps: vec![AllocationStep {
                payment_id: target,
                tender_applied: money(dec!(100)),
                credit_applied: money(dec!(40)),
                new_status: PaymentStatus::Paid,
            }],
            credit_spent: money(dec!(40)),
            credit_gained: money(dec!(10)),
        };

        let event = AllocationEvent::from_single(ClientId::new(), target, &plan);
        assert_eq!(event.payment_id, Some(target));
        assert_eq!(event.amount_applied, money(dec!(140)));
        assert_eq!(event.credit_delta, dec!(-30));
        assert_eq!(event.new_status, Some(PaymentStatus::Paid));
    }

    #[test]
    fn test_single_event_for_redirected_tender() {
        let target = PaymentId::new();
        let plan = AllocationPlan {
            steps: vec![],
            credit_spent: Money::ZERO,
            credit_gained: money(dec!(300)),
        };

        let event = AllocationEvent::from_single(ClientId::new(), target, &plan);
        assert_eq!(event.payment_id, Some(target));
        assert_eq!(event.amount_applied, Money::ZERO);
        assert_eq!(event.credit_delta, dec!(300));
        assert_eq!(event.new_status, None);
    }

    #[test]
    fn test_settle_all_events_include_credit_deposit() {
        let first = PaymentId::new();
        let second = PaymentId::new();
        let plan = AllocationPlan {
            steps: vec![
                AllocationStep {
                    payment_id: first,
                    tender_applied: money(dec!(100)),
                    credit_applied: Money::ZERO,
                    new_status: PaymentStatus::Paid,
                },
                AllocationStep {
                    payment_id: second,
                    tender_applied: money(dec!(50)),
                    credit_applied: Money::ZERO,
                    new_status: PaymentStatus::Paid,
                },
            ],
            credit_spent: Money::ZERO,
            credit_gained: money(dec!(20)),
        };

        let events = AllocationEvent::from_settle_all(ClientId::new(), &plan);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].payment_id, Some(first));
        assert_eq!(events[1].payment_id, Some(second));
        assert_eq!(events[2].payment_id, None);
        assert_eq!(events[2].credit_delta, dec!(20));

        let consumed: Decimal = events.iter().map(AllocationEvent::tender_consumed).sum();
        assert_eq!(consumed, dec!(170));
    }
}
