//! Transactional execution of allocation plans.
//!
//! Every allocation re-reads the payment, its entries, and the client's
//! credit balance inside its own database transaction, plans in core, and
//! applies the plan guarded by optimistic-lock versions. A lost race rolls
//! the transaction back and is retried a bounded number of times; the
//! retry observes fresh state, so a tender that raced a settling tender is
//! re-planned against zero debt and banked as credit instead of being
//! double-applied.
//!
//! Bulk settlement is a walk of per-payment steps, each atomic on its own.
//! A crash mid-walk leaves a valid ledger; resubmitting with the same
//! idempotency key deducts what already landed (recorded in
//! `allocation_events`) and continues.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use tracing::warn;
use uuid::Uuid;

use praxis_core::ledger::{
    AllocationEngine, AllocationEvent, AllocationStep, LedgerError, PaymentMethod,
};
use praxis_shared::types::{ClientId, Money, PaymentId};

use super::payment::{load_snapshot, load_snapshots};
use super::{db_err, stored_money};
use crate::entities::{allocation_events, clients, payment_entries, payments};

const DEFAULT_RETRIES: u32 = 3;

/// A tender submitted by a caller.
#[derive(Debug, Clone)]
pub struct TenderInput {
    /// Amount handed over.
    pub amount: Money,
    /// How it was handed over.
    pub method: PaymentMethod,
    /// The payment to apply it to; without a target the tender walks the
    /// client's open payments oldest-first.
    pub target_payment_id: Option<Uuid>,
    /// Spend the client's existing credit against the debt before the
    /// tendered amount.
    pub use_credit_first: bool,
}

/// The applied result of an allocation.
#[derive(Debug)]
pub struct AllocationOutcome {
    /// Payments that received money, in application order.
    pub updated_payments: Vec<payments::Model>,
    /// Signed net change to the client's credit balance.
    pub credit_delta: Decimal,
    /// The client's credit balance after the allocation.
    pub remaining_credit: Decimal,
    /// Domain events emitted, one per atomic step.
    pub events: Vec<AllocationEvent>,
}

enum StepOutcome {
    Applied {
        payment: payments::Model,
        event: AllocationEvent,
        applied: Money,
    },
    Banked {
        event: AllocationEvent,
    },
}

/// Executes allocation plans transactionally.
#[derive(Debug, Clone)]
pub struct AllocationRepository {
    db: DatabaseConnection,
    retries: u32,
}

impl AllocationRepository {
    /// Creates a new allocation repository with the default retry budget.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Overrides the conflict retry budget.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Applies a tender for a client.
    ///
    /// With a target payment this is the "pay one session" path; without
    /// one the tender walks the client's open payments oldest-first.
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveAmount`, `ClientNotFound`, `PaymentNotFound`,
    /// `PaymentNotSettleable`, or — after the retry budget is exhausted —
    /// the retryable `ConcurrencyConflict`.
    pub async fn apply_payment(
        &self,
        client_id: Uuid,
        input: TenderInput,
    ) -> Result<AllocationOutcome, LedgerError> {
        match input.target_payment_id {
            Some(target) => {
                let mut attempt = 0;
                loop {
                    match self.try_apply_single(client_id, target, &input).await {
                        Err(e) if e.is_retryable() && attempt < self.retries => {
                            attempt += 1;
                            warn!(
                                client_id = %client_id,
                                payment_id = %target,
                                attempt,
                                "allocation lost a write race, retrying"
                            );
                        }
                        other => return other,
                    }
                }
            }
            None => {
                self.settle_walk(client_id, input.amount, input.method, None)
                    .await
            }
        }
    }

    /// Settles all of a client's debts oldest-first, banking any
    /// remainder as credit.
    ///
    /// The walk is resumable: pass the same client-generated
    /// `idempotency_key` on resubmission and already-applied steps are
    /// deducted instead of re-applied.
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveAmount`, `ClientNotFound`, or — after the
    /// retry budget is exhausted — `ConcurrencyConflict`.
    pub async fn pay_all_debts(
        &self,
        client_id: Uuid,
        amount: Money,
        method: PaymentMethod,
        idempotency_key: Option<String>,
    ) -> Result<AllocationOutcome, LedgerError> {
        self.settle_walk(client_id, amount, method, idempotency_key)
            .await
    }

    // ========================================================================
    // Single-payment path
    // ========================================================================

    async fn try_apply_single(
        &self,
        client_id: Uuid,
        target: Uuid,
        input: &TenderInput,
    ) -> Result<AllocationOutcome, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let client = load_client(&txn, client_id).await?;
        let payment = payments::Entity::find_by_id(target)
            .filter(payments::Column::ClientId.eq(client_id))
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::PaymentNotFound(target))?;

        let snapshot = load_snapshot(&txn, &payment).await?;
        let credit = stored_money(client.credit_balance)?;

        let plan =
            AllocationEngine::plan_single(&snapshot, input.amount, input.use_credit_first, credit)?;

        let now = Utc::now();
        let mut updated = Vec::new();
        // A single-payment plan holds at most one step, so the payment
        // row read above carries the version the guard needs.
        for step in &plan.steps {
            updated.push(apply_step(&txn, &payment, step, input.method, now).await?);
        }

        let delta = plan.credit_delta();
        if delta != Decimal::ZERO {
            adjust_credit(&txn, &client, delta).await?;
        }

        let event = AllocationEvent::from_single(
            ClientId::from_uuid(client_id),
            PaymentId::from_uuid(target),
            &plan,
        );
        insert_event(&txn, &event, None).await?;

        txn.commit().await.map_err(db_err)?;

        Ok(AllocationOutcome {
            updated_payments: updated,
            credit_delta: delta,
            remaining_credit: client.credit_balance + delta,
            events: vec![event],
        })
    }

    // ========================================================================
    // Oldest-first walk (bulk settlement)
    // ========================================================================

    async fn settle_walk(
        &self,
        client_id: Uuid,
        amount: Money,
        method: PaymentMethod,
        idempotency_key: Option<String>,
    ) -> Result<AllocationOutcome, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(amount.amount()));
        }

        let mut remaining = amount;
        if let Some(key) = idempotency_key.as_deref() {
            let consumed = self.consumed_for_key(client_id, key).await?;
            if consumed >= remaining.amount() {
                // Full replay: everything already landed.
                let remaining_credit = load_client(&self.db, client_id).await?.credit_balance;
                return Ok(AllocationOutcome {
                    updated_payments: vec![],
                    credit_delta: Decimal::ZERO,
                    remaining_credit,
                    events: vec![],
                });
            }
            remaining = stored_money(remaining.amount() - consumed)?;
        }

        let mut updated = Vec::new();
        let mut events = Vec::new();
        let mut credit_delta = Decimal::ZERO;
        let mut attempt = 0u32;

        while remaining.is_positive() {
            match self
                .try_settle_step(client_id, remaining, method, idempotency_key.as_deref())
                .await
            {
                Ok(StepOutcome::Applied {
                    payment,
                    event,
                    applied,
                }) => {
                    attempt = 0;
                    remaining = remaining.saturating_sub(applied);
                    updated.push(payment);
                    events.push(event);
                }
                Ok(StepOutcome::Banked { event }) => {
                    attempt = 0;
                    credit_delta += remaining.amount();
                    events.push(event);
                    remaining = Money::ZERO;
                }
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        client_id = %client_id,
                        attempt,
                        "bulk settlement step lost a write race, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let remaining_credit = load_client(&self.db, client_id).await?.credit_balance;

        Ok(AllocationOutcome {
            updated_payments: updated,
            credit_delta,
            remaining_credit,
            events,
        })
    }

    /// One atomic step of the walk: re-read, plan, apply the oldest open
    /// payment (or bank the remainder when no debt is left).
    async fn try_settle_step(
        &self,
        client_id: Uuid,
        remaining: Money,
        method: PaymentMethod,
        idempotency_key: Option<&str>,
    ) -> Result<StepOutcome, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let client = load_client(&txn, client_id).await?;
        let snapshots = load_snapshots(&txn, client_id).await?;
        let plan = AllocationEngine::plan_settle_all(&snapshots, remaining)?;

        let outcome = if let Some(step) = plan.steps.first() {
            let payment = payments::Entity::find_by_id(step.payment_id.into_inner())
                .one(&txn)
                .await
                .map_err(db_err)?
                .ok_or_else(|| LedgerError::PaymentNotFound(step.payment_id.into_inner()))?;

            let updated = apply_step(&txn, &payment, step, method, Utc::now()).await?;

            let event = AllocationEvent {
                client_id: ClientId::from_uuid(client_id),
                payment_id: Some(step.payment_id),
                amount_applied: step.total_applied(),
                credit_delta: Decimal::ZERO,
                new_status: Some(step.new_status),
            };
            insert_event(&txn, &event, idempotency_key).await?;

            StepOutcome::Applied {
                payment: updated,
                event,
                applied: step.tender_applied,
            }
        } else {
            // No open debt left: bank the remainder.
            adjust_credit(&txn, &client, remaining.amount()).await?;

            let event = AllocationEvent {
                client_id: ClientId::from_uuid(client_id),
                payment_id: None,
                amount_applied: Money::ZERO,
                credit_delta: remaining.amount(),
                new_status: None,
            };
            insert_event(&txn, &event, idempotency_key).await?;

            StepOutcome::Banked { event }
        };

        txn.commit().await.map_err(db_err)?;
        Ok(outcome)
    }

    /// How much of an idempotent bulk tender already landed.
    async fn consumed_for_key(
        &self,
        client_id: Uuid,
        key: &str,
    ) -> Result<Decimal, LedgerError> {
        let rows = allocation_events::Entity::find()
            .filter(allocation_events::Column::ClientId.eq(client_id))
            .filter(allocation_events::Column::IdempotencyKey.eq(key))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|r| r.amount_applied + r.credit_delta.max(Decimal::ZERO))
            .sum())
    }
}

// ============================================================================
// Shared write helpers
// ============================================================================

async fn load_client<C: sea_orm::ConnectionTrait>(
    conn: &C,
    client_id: Uuid,
) -> Result<clients::Model, LedgerError> {
    clients::Entity::find_by_id(client_id)
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::ClientNotFound(client_id))
}

/// Inserts the step's entries and advances the payment, guarded by the
/// version read in this transaction.
async fn apply_step(
    txn: &DatabaseTransaction,
    payment: &payments::Model,
    step: &AllocationStep,
    method: PaymentMethod,
    now: DateTime<Utc>,
) -> Result<payments::Model, LedgerError> {
    // Credit-funded entry first, then the tendered one, so statements
    // show credit being spent before new money.
    if step.credit_applied.is_positive() {
        insert_entry(txn, payment.id, step.credit_applied, PaymentMethod::Credit, now).await?;
    }
    if step.tender_applied.is_positive() {
        insert_entry(txn, payment.id, step.tender_applied, method, now).await?;
    }

    let mut guard = payments::ActiveModel {
        status: Set(step.new_status.into()),
        version: Set(payment.version + 1),
        updated_at: Set(now.into()),
        ..Default::default()
    };
    if step.settles() {
        guard.paid_at = Set(Some(now.into()));
    }

    let res = payments::Entity::update_many()
        .set(guard)
        .filter(payments::Column::Id.eq(payment.id))
        .filter(payments::Column::Version.eq(payment.version))
        .exec(txn)
        .await
        .map_err(db_err)?;
    if res.rows_affected == 0 {
        return Err(LedgerError::ConcurrencyConflict);
    }

    payments::Entity::find_by_id(payment.id)
        .one(txn)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::PaymentNotFound(payment.id))
}

async fn insert_entry(
    txn: &DatabaseTransaction,
    payment_id: Uuid,
    amount: Money,
    method: PaymentMethod,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let entry = payment_entries::ActiveModel {
        id: Set(Uuid::new_v4()),
        payment_id: Set(payment_id),
        amount: Set(amount.amount()),
        method: Set(method.into()),
        paid_at: Set(now.into()),
        created_at: Set(now.into()),
    };
    entry.insert(txn).await.map_err(db_err)?;
    Ok(())
}

/// Moves the client's credit balance by `delta`, guarded by the version
/// read in this transaction. The planner caps spending at the balance it
/// was handed, so the result cannot go negative.
async fn adjust_credit(
    txn: &DatabaseTransaction,
    client: &clients::Model,
    delta: Decimal,
) -> Result<(), LedgerError> {
    let new_balance = client.credit_balance + delta;
    if new_balance < Decimal::ZERO {
        return Err(LedgerError::Internal(format!(
            "credit balance for client {} would go negative",
            client.id
        )));
    }

    let guard = clients::ActiveModel {
        credit_balance: Set(new_balance),
        version: Set(client.version + 1),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    let res = clients::Entity::update_many()
        .set(guard)
        .filter(clients::Column::Id.eq(client.id))
        .filter(clients::Column::Version.eq(client.version))
        .exec(txn)
        .await
        .map_err(db_err)?;
    if res.rows_affected == 0 {
        return Err(LedgerError::ConcurrencyConflict);
    }
    Ok(())
}

async fn insert_event(
    txn: &DatabaseTransaction,
    event: &AllocationEvent,
    idempotency_key: Option<&str>,
) -> Result<(), LedgerError> {
    let row = allocation_events::ActiveModel {
        id: Set(Uuid::new_v4()),
        client_id: Set(event.client_id.into_inner()),
        payment_id: Set(event.payment_id.map(PaymentId::into_inner)),
        amount_applied: Set(event.amount_applied.amount()),
        credit_delta: Set(event.credit_delta),
        new_status: Set(event.new_status.map(Into::into)),
        idempotency_key: Set(idempotency_key.map(str::to_owned)),
        created_at: Set(Utc::now().into()),
    };
    row.insert(txn).await.map_err(db_err)?;
    Ok(())
}
