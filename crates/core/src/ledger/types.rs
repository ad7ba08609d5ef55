//! Ledger domain types for payments and allocation.
//!
//! This module defines the core types used to record session charges and
//! to allocate tendered amounts across outstanding debt and client credit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use praxis_shared::types::{Money, PaymentId, SessionId};

/// How a tender was handed over.
///
/// The ledger records the outcome of an off-band transaction; it never
/// moves money itself. `Credit` marks an implicit tender funded from the
/// client's prepaid credit balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash handed over in person.
    Cash,
    /// Card charged outside the system.
    CreditCard,
    /// Bank transfer.
    BankTransfer,
    /// Paper check.
    Check,
    /// Funded from the client's credit balance.
    Credit,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::CreditCard => write!(f, "credit_card"),
            Self::BankTransfer => write!(f, "bank_transfer"),
            Self::Check => write!(f, "check"),
            Self::Credit => write!(f, "credit"),
        }
    }
}

/// Payment lifecycle status.
///
/// `Pending` payments carry debt; `Paid` is the happy-path terminal state;
/// `Cancelled` and `Refunded` are terminal and permanently excluded from
/// debt calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Open charge with outstanding or partially-paid debt.
    Pending,
    /// Fully settled.
    Paid,
    /// Cancelled before settlement (terminal).
    Cancelled,
    /// Reversed after settlement (terminal).
    Refunded,
}

impl PaymentStatus {
    /// Returns true if tenders may still be applied to the payment.
    #[must_use]
    pub fn is_settleable(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled | Self::Refunded)
    }

    /// Returns true if the payment participates in debt calculations.
    #[must_use]
    pub fn counts_toward_debt(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

/// Kind of therapy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Session held at the practice.
    InPerson,
    /// Video session.
    Online,
    /// Phone session.
    Phone,
    /// Blocked-out time; never charged.
    Break,
}

impl SessionKind {
    /// Returns true if sessions of this kind can carry a charge.
    #[must_use]
    pub fn is_chargeable(self) -> bool {
        !matches!(self, Self::Break)
    }
}

/// A point-in-time view of one payment, read inside the allocating
/// transaction.
///
/// `paid_amount` is the sum of the payment's tender entries. The engine
/// plans against snapshots only; it never touches storage.
#[derive(Debug, Clone)]
pub struct PaymentSnapshot {
    /// The payment ID.
    pub id: PaymentId,
    /// The charged session.
    pub session_id: SessionId,
    /// Start time of the charged session; orders bulk settlement.
    pub session_start: DateTime<Utc>,
    /// Current status.
    pub status: PaymentStatus,
    /// The frozen charge amount.
    pub expected_amount: Money,
    /// Sum of all recorded tender entries.
    pub paid_amount: Money,
}

impl PaymentSnapshot {
    /// Outstanding debt: `max(0, expected - paid)`.
    #[must_use]
    pub fn debt(&self) -> Money {
        self.expected_amount.saturating_sub(self.paid_amount)
    }
}

/// One planned application of money to a single payment.
///
/// `credit_applied` becomes a `credit`-method entry, `tender_applied` an
/// entry with the caller's method. Either may be zero, but not both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationStep {
    /// The payment receiving the entries.
    pub payment_id: PaymentId,
    /// Portion funded by the newly tendered amount.
    pub tender_applied: Money,
    /// Portion funded from the client's existing credit balance.
    pub credit_applied: Money,
    /// Status of the payment after this step is applied.
    pub new_status: PaymentStatus,
}

impl AllocationStep {
    /// Total amount this step applies to the payment.
    #[must_use]
    pub fn total_applied(&self) -> Money {
        self.tender_applied.add(self.credit_applied)
    }

    /// Returns true if this step closes the payment.
    #[must_use]
    pub fn settles(&self) -> bool {
        self.new_status == PaymentStatus::Paid
    }
}

/// The outcome of planning an allocation: which payments receive how much,
/// and how the client's credit balance moves.
///
/// Conservation holds by construction:
/// `tendered == sum(tender_applied) + credit_gained` and
/// `credit_spent == sum(credit_applied)`.
#[derive(Debug, Clone, Default)]
pub struct AllocationPlan {
    /// Per-payment applications, in execution order.
    pub steps: Vec<AllocationStep>,
    /// Credit consumed from the client's balance (use-credit-first).
    pub credit_spent: Money,
    /// Tender overflow banked to the client's balance.
    pub credit_gained: Money,
}

impl AllocationPlan {
    /// Total of the new tender applied to payments.
    #[must_use]
    pub fn tender_applied(&self) -> Money {
        self.steps.iter().map(|s| s.tender_applied).sum()
    }

    /// Signed net change to the client's credit balance.
    #[must_use]
    pub fn credit_delta(&self) -> Decimal {
        self.credit_gained.amount() - self.credit_spent.amount()
    }

    /// The client's credit balance after applying this plan.
    ///
    /// The planner never spends more credit than the balance it was given,
    /// so the subtraction cannot go negative.
    #[must_use]
    pub fn credit_balance_after(&self, current: Money) -> Money {
        current.add(self.credit_gained).saturating_sub(self.credit_spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use praxis_shared::types::Money;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::try_new(d).unwrap()
    }

    #[test]
    fn test_status_settleable() {
        assert!(PaymentStatus::Pending.is_settleable());
        assert!(!PaymentStatus::Paid.is_settleable());
        assert!(!PaymentStatus::Cancelled.is_settleable());
        assert!(!PaymentStatus::Refunded.is_settleable());
    }

    #[test]
    fn test_status_counts_toward_debt() {
        assert!(PaymentStatus::Pending.counts_toward_debt());
        assert!(PaymentStatus::Paid.counts_toward_debt());
        assert!(!PaymentStatus::Cancelled.counts_toward_debt());
        assert!(!PaymentStatus::Refunded.counts_toward_debt());
    }

    #[test]
    fn test_session_kind_chargeable() {
        assert!(SessionKind::InPerson.is_chargeable());
        assert!(SessionKind::Online.is_chargeable());
        assert!(SessionKind::Phone.is_chargeable());
        assert!(!SessionKind::Break.is_chargeable());
    }

    #[test]
    fn test_snapshot_debt() {
        let snapshot = PaymentSnapshot {
            id: PaymentId::new(),
            session_id: SessionId::new(),
            session_start: Utc::now(),
            status: PaymentStatus::Pending,
            expected_amount: money(dec!(300)),
            paid_amount: money(dec!(120)),
        };
        assert_eq!(snapshot.debt(), money(dec!(180)));
    }

    #[test]
    fn test_snapshot_debt_never_negative() {
        let snapshot = PaymentSnapshot {
            id: PaymentId::new(),
            session_id: SessionId::new(),
            session_start: Utc::now(),
            status: PaymentStatus::Paid,
            expected_amount: money(dec!(100)),
            paid_amount: money(dec!(100)),
        };
        assert_eq!(snapshot.debt(), Money::ZERO);
    }

    #[test]
    fn test_plan_credit_delta() {
        let plan = AllocationPlan {
            steps: vec![],
            credit_spent: money(dec!(40)),
            credit_gained: money(dec!(10)),
        };
        assert_eq!(plan.credit_delta(), dec!(-30));
        assert_eq!(plan.credit_balance_after(money(dec!(40))), money(dec!(10)));
    }

    #[test]
    fn test_plan_tender_applied() {
        let id = PaymentId::new();
        let plan = AllocationPlan {
            steps: vec![
                AllocationStep {
                    payment_id: id,
                    tender_applied: money(dec!(100)),
                    credit_applied: Money::ZERO,
                    new_status: PaymentStatus::Paid,
                },
                AllocationStep {
                    payment_id: PaymentId::new(),
                    tender_applied: money(dec!(20)),
                    credit_applied: Money::ZERO,
                    new_status: PaymentStatus::Pending,
                },
            ],
            credit_spent: Money::ZERO,
            credit_gained: Money::ZERO,
        };
        assert_eq!(plan.tender_applied(), money(dec!(120)));
        assert!(plan.steps[0].settles());
        assert!(!plan.steps[1].settles());
    }
}
