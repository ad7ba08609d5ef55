//! Debt/credit aggregation.
//!
//! Read-side projections over the ledger: per-client debt summaries,
//! settled-payment history, and monthly revenue totals. These are pure
//! functions of snapshots fetched by the repository layer; they never
//! mutate anything.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use praxis_shared::types::{ClientId, Money, PaymentId, SessionId};

use super::types::{PaymentMethod, PaymentSnapshot};

/// One unpaid (or partially-paid) session in a debt summary.
#[derive(Debug, Clone, Serialize)]
pub struct UnpaidSession {
    /// The open payment.
    pub payment_id: PaymentId,
    /// The charged session.
    pub session_id: SessionId,
    /// When the session took place.
    pub session_date: DateTime<Utc>,
    /// The frozen charge.
    pub expected_amount: Money,
    /// What has been tendered so far.
    pub paid_so_far: Money,
    /// Outstanding remainder.
    pub debt: Money,
}

/// Per-client debt and credit snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DebtSummary {
    /// The client.
    pub client_id: ClientId,
    /// Sum of debt over all open payments.
    pub total_debt: Money,
    /// The client's prepaid/overpaid balance.
    pub credit_balance: Money,
    /// Open payments, oldest session first (the order bulk settlement
    /// retires them in).
    pub unpaid_sessions: Vec<UnpaidSession>,
}

/// One recorded tender in a settled payment's timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TenderRecord {
    /// Tendered amount.
    pub amount: Money,
    /// How it was handed over.
    pub method: PaymentMethod,
    /// When it was recorded.
    pub paid_at: DateTime<Utc>,
}

/// A fully-settled payment with its tender timeline.
#[derive(Debug, Clone, Serialize)]
pub struct SettledPayment {
    /// The payment.
    pub payment_id: PaymentId,
    /// The charged session.
    pub session_id: SessionId,
    /// When the session took place.
    pub session_date: DateTime<Utc>,
    /// The charge that was settled.
    pub expected_amount: Money,
    /// Total tendered (equals the charge; excess is banked as credit,
    /// never stored on the payment).
    pub total_paid: Money,
    /// When the settling tender landed. For a multi-installment payment
    /// this is the `paid_at` of the last installment, not the first.
    pub completed_at: DateTime<Utc>,
    /// Full tender timeline, oldest first.
    pub entries: Vec<TenderRecord>,
}

/// A calendar month, used to bucket revenue totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    /// Calendar year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
}

impl MonthKey {
    /// Creates a month key, clamping the month into 1-12.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year,
            month: month.clamp(1, 12),
        }
    }

    /// The month containing the given instant.
    #[must_use]
    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// The following month.
    #[must_use]
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid month: {s} (expected YYYY-MM)"))?;
        let year: i32 = year.parse().map_err(|_| format!("Invalid year in {s}"))?;
        let month: u32 = month.parse().map_err(|_| format!("Invalid month in {s}"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("Month out of range in {s}"));
        }
        Ok(Self { year, month })
    }
}

/// Revenue total for one month.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTotal {
    /// The month.
    pub month: MonthKey,
    /// Sum of settled charges whose settling tender landed in the month.
    pub total: Money,
    /// Number of payments settled in the month.
    pub settled_count: usize,
}

/// Stateless read-side aggregator.
pub struct DebtAggregator;

impl DebtAggregator {
    /// Builds the per-client debt summary.
    ///
    /// Cancelled and refunded payments are excluded; open payments are
    /// listed oldest session first with payment id as tie-break, matching
    /// the bulk-settlement order.
    #[must_use]
    pub fn debt_summary(
        client_id: ClientId,
        credit_balance: Money,
        payments: &[PaymentSnapshot],
    ) -> DebtSummary {
        let mut unpaid: Vec<UnpaidSession> = payments
            .iter()
            .filter(|p| p.status.counts_toward_debt() && p.debt().is_positive())
            .map(|p| UnpaidSession {
                payment_id: p.id,
                session_id: p.session_id,
                session_date: p.session_start,
                expected_amount: p.expected_amount,
                paid_so_far: p.paid_amount,
                debt: p.debt(),
            })
            .collect();
        unpaid.sort_by(|a, b| {
            a.session_date
                .cmp(&b.session_date)
                .then_with(|| a.payment_id.cmp(&b.payment_id))
        });

        let total_debt = unpaid.iter().map(|u| u.debt).sum();

        DebtSummary {
            client_id,
            total_debt,
            credit_balance,
            unpaid_sessions: unpaid,
        }
    }

    /// Filters and orders settled payments for display.
    ///
    /// The optional range is applied to the completion date (the settling
    /// tender's `paid_at`), and results are returned newest first.
    #[must_use]
    pub fn payment_history(
        mut payments: Vec<SettledPayment>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<SettledPayment> {
        payments.retain(|p| {
            from.is_none_or(|f| p.completed_at >= f) && to.is_none_or(|t| p.completed_at <= t)
        });
        payments.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        payments
    }

    /// Buckets settled payments into per-month revenue totals.
    ///
    /// Every month in the inclusive range appears in the result, zero
    /// months included, so charts get a continuous axis. Only
    /// fully-settled payments count; open partials are excluded until
    /// they close.
    #[must_use]
    pub fn monthly_totals(
        payments: &[SettledPayment],
        from: MonthKey,
        to: MonthKey,
    ) -> Vec<MonthlyTotal> {
        let mut totals = Vec::new();
        let mut month = from;
        while month <= to {
            let in_month: Vec<&SettledPayment> = payments
                .iter()
                .filter(|p| MonthKey::of(p.completed_at) == month)
                .collect();
            totals.push(MonthlyTotal {
                month,
                total: in_month.iter().map(|p| p.total_paid).sum(),
                settled_count: in_month.len(),
            });
            month = month.next();
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use praxis_shared::types::Money;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::ledger::types::PaymentStatus;

    fn money(d: Decimal) -> Money {
        Money::try_new(d).unwrap()
    }

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, day, 12, 0, 0).unwrap()
    }

    fn snapshot(
        status: PaymentStatus,
        expected: Decimal,
        paid: Decimal,
        start: DateTime<Utc>,
    ) -> PaymentSnapshot {
        PaymentSnapshot {
            id: PaymentId::new(),
            session_id: SessionId::new(),
            session_start: start,
            status,
            expected_amount: money(expected),
            paid_amount: money(paid),
        }
    }

    fn settled(expected: Decimal, completed_at: DateTime<Utc>) -> SettledPayment {
        SettledPayment {
            payment_id: PaymentId::new(),
            session_id: SessionId::new(),
            session_date: completed_at,
            expected_amount: money(expected),
            total_paid: money(expected),
            completed_at,
            entries: vec![TenderRecord {
                amount: money(expected),
                method: PaymentMethod::Cash,
                paid_at: completed_at,
            }],
        }
    }

    #[test]
    fn test_debt_summary_totals_and_order() {
        let client_id = ClientId::new();
        let payments = vec![
            snapshot(PaymentStatus::Pending, dec!(50), dec!(0), at(1, 20)),
            snapshot(PaymentStatus::Pending, dec!(100), dec!(30), at(1, 5)),
            snapshot(PaymentStatus::Paid, dec!(200), dec!(200), at(1, 1)),
            snapshot(PaymentStatus::Cancelled, dec!(400), dec!(0), at(1, 2)),
        ];

        let summary = DebtAggregator::debt_summary(client_id, money(dec!(25)), &payments);

        assert_eq!(summary.total_debt, money(dec!(120)));
        assert_eq!(summary.credit_balance, money(dec!(25)));
        assert_eq!(summary.unpaid_sessions.len(), 2);
        // Oldest session first.
        assert_eq!(summary.unpaid_sessions[0].session_date, at(1, 5));
        assert_eq!(summary.unpaid_sessions[0].debt, money(dec!(70)));
        assert_eq!(summary.unpaid_sessions[1].session_date, at(1, 20));
    }

    #[test]
    fn test_debt_summary_is_pure() {
        let client_id = ClientId::new();
        let payments = vec![snapshot(PaymentStatus::Pending, dec!(80), dec!(0), at(2, 3))];

        let first = DebtAggregator::debt_summary(client_id, Money::ZERO, &payments);
        let second = DebtAggregator::debt_summary(client_id, Money::ZERO, &payments);
        assert_eq!(first.total_debt, second.total_debt);
        assert_eq!(first.unpaid_sessions.len(), second.unpaid_sessions.len());
    }

    #[test]
    fn test_payment_history_newest_first() {
        let history = DebtAggregator::payment_history(
            vec![settled(dec!(100), at(1, 5)), settled(dec!(200), at(2, 10))],
            None,
            None,
        );
        assert_eq!(history[0].completed_at, at(2, 10));
        assert_eq!(history[1].completed_at, at(1, 5));
    }

    #[test]
    fn test_payment_history_range_filter() {
        let history = DebtAggregator::payment_history(
            vec![
                settled(dec!(100), at(1, 5)),
                settled(dec!(200), at(2, 10)),
                settled(dec!(300), at(3, 15)),
            ],
            Some(at(2, 1)),
            Some(at(2, 28)),
        );
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].completed_at, at(2, 10));
    }

    #[test]
    fn test_monthly_totals_buckets_by_completion() {
        let payments = vec![
            settled(dec!(100), at(1, 5)),
            settled(dec!(200), at(1, 25)),
            settled(dec!(300), at(3, 15)),
        ];

        let totals = DebtAggregator::monthly_totals(
            &payments,
            MonthKey::new(2026, 1),
            MonthKey::new(2026, 3),
        );

        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].total, money(dec!(300)));
        assert_eq!(totals[0].settled_count, 2);
        // Empty months still appear.
        assert_eq!(totals[1].total, Money::ZERO);
        assert_eq!(totals[1].settled_count, 0);
        assert_eq!(totals[2].total, money(dec!(300)));
    }

    #[test]
    fn test_month_key_parsing_and_order() {
        let key: MonthKey = "2026-03".parse().unwrap();
        assert_eq!(key, MonthKey::new(2026, 3));
        assert_eq!(key.to_string(), "2026-03");
        assert!("2026-13".parse::<MonthKey>().is_err());
        assert!("garbage".parse::<MonthKey>().is_err());

        assert_eq!(MonthKey::new(2026, 12).next(), MonthKey::new(2027, 1));
        assert!(MonthKey::new(2026, 12) < MonthKey::new(2027, 1));
    }
}
