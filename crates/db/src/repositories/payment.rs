//! Payment repository: charge creation, lifecycle transitions, and the
//! read-side queries feeding the debt/credit aggregator.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use praxis_core::ledger::{
    status::validate_transition, LedgerError, PaymentSnapshot, PaymentStatus, SettledPayment,
    SessionKind, TenderRecord,
};
use praxis_shared::types::{Money, PaymentId, SessionId};

use super::{db_err, stored_money};
use crate::entities::{
    allocation_events, clients, payment_entries, payments, sea_orm_active_enums, sessions,
};

/// A payment together with its full tender timeline.
#[derive(Debug, Clone)]
pub struct PaymentWithEntries {
    /// The payment row.
    pub payment: payments::Model,
    /// Tender entries, oldest first.
    pub entries: Vec<payment_entries::Model>,
}

/// Payment repository.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    db: DatabaseConnection,
}

impl PaymentRepository {
    /// Creates a new payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates the payment for a session, snapshotting the session price
    /// as `expected_amount`.
    ///
    /// Idempotent: if a live (non-cancelled) payment already exists for
    /// the session it is returned instead of erroring, so duplicate
    /// client requests are harmless. A zero-priced session's payment is
    /// created directly `paid`; there is nothing to owe.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown session and
    /// `SessionNotChargeable` for break sessions.
    pub async fn create_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<payments::Model, LedgerError> {
        let session = sessions::Entity::find_by_id(session_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::SessionNotFound(session_id))?;

        let kind: SessionKind = session.kind.clone().into();
        if !kind.is_chargeable() {
            return Err(LedgerError::SessionNotChargeable(session_id));
        }

        if let Some(existing) = self.find_live_for_session(session_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let zero_charge = session.price.is_zero();
        let payment = payments::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id),
            client_id: Set(session.client_id),
            expected_amount: Set(session.price),
            status: Set(if zero_charge {
                sea_orm_active_enums::PaymentStatus::Paid
            } else {
                sea_orm_active_enums::PaymentStatus::Pending
            }),
            paid_at: Set(zero_charge.then(|| now.into())),
            cancel_reason: Set(None),
            refunded_amount: Set(None),
            refund_reason: Set(None),
            refunded_at: Set(None),
            version: Set(1),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        match payment.insert(&self.db).await {
            Ok(model) => Ok(model),
            // A concurrent request may have won the unique-index race;
            // the idempotency guard means we hand back its row.
            Err(insert_err) => match self.find_live_for_session(session_id).await? {
                Some(existing) => Ok(existing),
                None => Err(db_err(insert_err)),
            },
        }
    }

    async fn find_live_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<payments::Model>, LedgerError> {
        payments::Entity::find()
            .filter(payments::Column::SessionId.eq(session_id))
            .filter(payments::Column::Status.ne(sea_orm_active_enums::PaymentStatus::Cancelled))
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    /// Gets a payment with its tender timeline.
    ///
    /// # Errors
    ///
    /// Returns `PaymentNotFound` if no such payment exists.
    pub async fn get(&self, payment_id: Uuid) -> Result<PaymentWithEntries, LedgerError> {
        let payment = payments::Entity::find_by_id(payment_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::PaymentNotFound(payment_id))?;

        let entries = payment_entries::Entity::find()
            .filter(payment_entries::Column::PaymentId.eq(payment_id))
            .order_by_asc(payment_entries::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(PaymentWithEntries { payment, entries })
    }

    /// Cancels a pending payment.
    ///
    /// Amounts are retained for audit; only the status changes. Any
    /// tenders already recorded are released to the client's credit
    /// balance in the same transaction, so no money disappears.
    ///
    /// # Errors
    ///
    /// Returns `PaymentNotFound` or `InvalidStatusTransition`.
    pub async fn cancel(
        &self,
        payment_id: Uuid,
        reason: String,
    ) -> Result<payments::Model, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let payment = payments::Entity::find_by_id(payment_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::PaymentNotFound(payment_id))?;

        let status: PaymentStatus = payment.status.clone().into();
        validate_transition(status, PaymentStatus::Cancelled)?;

        let paid = paid_sum(&txn, payment_id).await?;
        if paid.is_positive() {
            release_credit(&txn, payment.client_id, paid).await?;

            let event = allocation_events::ActiveModel {
                id: Set(Uuid::new_v4()),
                client_id: Set(payment.client_id),
                payment_id: Set(Some(payment_id)),
                amount_applied: Set(rust_decimal::Decimal::ZERO),
                credit_delta: Set(paid.amount()),
                new_status: Set(Some(sea_orm_active_enums::PaymentStatus::Cancelled)),
                idempotency_key: Set(None),
                created_at: Set(Utc::now().into()),
            };
            event.insert(&txn).await.map_err(db_err)?;
        }

        let guard = payments::ActiveModel {
            status: Set(sea_orm_active_enums::PaymentStatus::Cancelled),
            cancel_reason: Set(Some(reason)),
            version: Set(payment.version + 1),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let res = payments::Entity::update_many()
            .set(guard)
            .filter(payments::Column::Id.eq(payment_id))
            .filter(payments::Column::Version.eq(payment.version))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if res.rows_affected == 0 {
            return Err(LedgerError::ConcurrencyConflict);
        }

        let updated = payments::Entity::find_by_id(payment_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::PaymentNotFound(payment_id))?;

        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Refunds a settled payment.
    ///
    /// Records the refunded amount and reason on the payment; the tender
    /// entries are never mutated. Refunded money leaves the practice
    /// off-band, so the credit balance is untouched.
    ///
    /// # Errors
    ///
    /// Returns `PaymentNotFound`, `InvalidStatusTransition`,
    /// `NonPositiveAmount`, or `RefundExceedsPaid`.
    pub async fn refund(
        &self,
        payment_id: Uuid,
        amount: Money,
        reason: String,
    ) -> Result<payments::Model, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(amount.amount()));
        }

        let txn = self.db.begin().await.map_err(db_err)?;

        let payment = payments::Entity::find_by_id(payment_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::PaymentNotFound(payment_id))?;

        let status: PaymentStatus = payment.status.clone().into();
        validate_transition(status, PaymentStatus::Refunded)?;

        let paid = paid_sum(&txn, payment_id).await?;
        if amount > paid {
            return Err(LedgerError::RefundExceedsPaid {
                payment_id,
                refund: amount.amount(),
                paid: paid.amount(),
            });
        }

        let now = Utc::now();
        let guard = payments::ActiveModel {
            status: Set(sea_orm_active_enums::PaymentStatus::Refunded),
            refunded_amount: Set(Some(amount.amount())),
            refund_reason: Set(Some(reason)),
            refunded_at: Set(Some(now.into())),
            version: Set(payment.version + 1),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let res = payments::Entity::update_many()
            .set(guard)
            .filter(payments::Column::Id.eq(payment_id))
            .filter(payments::Column::Version.eq(payment.version))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if res.rows_affected == 0 {
            return Err(LedgerError::ConcurrencyConflict);
        }

        let updated = payments::Entity::find_by_id(payment_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::PaymentNotFound(payment_id))?;

        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Loads allocation snapshots for all of a client's payments.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotFound` if the client does not exist.
    pub async fn snapshots_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<PaymentSnapshot>, LedgerError> {
        clients::Entity::find_by_id(client_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::ClientNotFound(client_id))?;

        load_snapshots(&self.db, client_id).await
    }

    /// Loads a client's settled payments with their tender timelines.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn settled_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<SettledPayment>, LedgerError> {
        let paid = payments::Entity::find()
            .filter(payments::Column::ClientId.eq(client_id))
            .filter(payments::Column::Status.eq(sea_orm_active_enums::PaymentStatus::Paid))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        build_settled(&self.db, paid).await
    }

    /// Loads all settled payments whose settling tender landed in the
    /// given range, across clients. Feeds the monthly revenue totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn settled_between(
        &self,
        from: chrono::DateTime<Utc>,
        to: chrono::DateTime<Utc>,
    ) -> Result<Vec<SettledPayment>, LedgerError> {
        let paid = payments::Entity::find()
            .filter(payments::Column::Status.eq(sea_orm_active_enums::PaymentStatus::Paid))
            .filter(payments::Column::PaidAt.gte(from))
            .filter(payments::Column::PaidAt.lte(to))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        build_settled(&self.db, paid).await
    }

    /// Lists a client's allocation events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn events_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<allocation_events::Model>, LedgerError> {
        allocation_events::Entity::find()
            .filter(allocation_events::Column::ClientId.eq(client_id))
            .order_by_desc(allocation_events::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)
    }
}

// ============================================================================
// Snapshot loaders (shared with the allocation executor, which re-reads
// inside its own transaction)
// ============================================================================

/// Sums the recorded tenders for one payment.
pub(crate) async fn paid_sum<C: ConnectionTrait>(
    conn: &C,
    payment_id: Uuid,
) -> Result<Money, LedgerError> {
    let entries = payment_entries::Entity::find()
        .filter(payment_entries::Column::PaymentId.eq(payment_id))
        .all(conn)
        .await
        .map_err(db_err)?;

    let mut total = Money::ZERO;
    for entry in &entries {
        total = total.add(stored_money(entry.amount)?);
    }
    Ok(total)
}

/// Builds the allocation snapshot for one payment row.
pub(crate) async fn load_snapshot<C: ConnectionTrait>(
    conn: &C,
    payment: &payments::Model,
) -> Result<PaymentSnapshot, LedgerError> {
    let session = sessions::Entity::find_by_id(payment.session_id)
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::SessionNotFound(payment.session_id))?;

    let paid = paid_sum(conn, payment.id).await?;

    Ok(PaymentSnapshot {
        id: PaymentId::from_uuid(payment.id),
        session_id: SessionId::from_uuid(payment.session_id),
        session_start: session.start_time.with_timezone(&Utc),
        status: payment.status.clone().into(),
        expected_amount: stored_money(payment.expected_amount)?,
        paid_amount: paid,
    })
}

/// Builds allocation snapshots for all of a client's payments.
pub(crate) async fn load_snapshots<C: ConnectionTrait>(
    conn: &C,
    client_id: Uuid,
) -> Result<Vec<PaymentSnapshot>, LedgerError> {
    let payment_rows = payments::Entity::find()
        .filter(payments::Column::ClientId.eq(client_id))
        .all(conn)
        .await
        .map_err(db_err)?;

    if payment_rows.is_empty() {
        return Ok(vec![]);
    }

    let session_ids: Vec<Uuid> = payment_rows.iter().map(|p| p.session_id).collect();
    let starts: HashMap<Uuid, chrono::DateTime<Utc>> = sessions::Entity::find()
        .filter(sessions::Column::Id.is_in(session_ids))
        .all(conn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|s| (s.id, s.start_time.with_timezone(&Utc)))
        .collect();

    let payment_ids: Vec<Uuid> = payment_rows.iter().map(|p| p.id).collect();
    let mut paid_by_payment: HashMap<Uuid, Money> = HashMap::new();
    let entries = payment_entries::Entity::find()
        .filter(payment_entries::Column::PaymentId.is_in(payment_ids))
        .all(conn)
        .await
        .map_err(db_err)?;
    for entry in entries {
        let amount = stored_money(entry.amount)?;
        let total = paid_by_payment.entry(entry.payment_id).or_insert(Money::ZERO);
        *total = total.add(amount);
    }

    payment_rows
        .into_iter()
        .map(|p| {
            let session_start = starts
                .get(&p.session_id)
                .copied()
                .ok_or(LedgerError::SessionNotFound(p.session_id))?;
            Ok(PaymentSnapshot {
                id: PaymentId::from_uuid(p.id),
                session_id: SessionId::from_uuid(p.session_id),
                session_start,
                status: p.status.clone().into(),
                expected_amount: stored_money(p.expected_amount)?,
                paid_amount: paid_by_payment.get(&p.id).copied().unwrap_or(Money::ZERO),
            })
        })
        .collect()
}

/// Credits a client's balance inside an open transaction, guarded by the
/// client's optimistic-lock version. Used by the allocation executor and
/// the cancel path; nothing else writes `credit_balance`.
pub(crate) async fn release_credit(
    txn: &DatabaseTransaction,
    client_id: Uuid,
    amount: Money,
) -> Result<(), LedgerError> {
    let client = clients::Entity::find_by_id(client_id)
        .one(txn)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::ClientNotFound(client_id))?;

    let guard = clients::ActiveModel {
        credit_balance: Set(client.credit_balance + amount.amount()),
        version: Set(client.version + 1),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    let res = clients::Entity::update_many()
        .set(guard)
        .filter(clients::Column::Id.eq(client_id))
        .filter(clients::Column::Version.eq(client.version))
        .exec(txn)
        .await
        .map_err(db_err)?;
    if res.rows_affected == 0 {
        return Err(LedgerError::ConcurrencyConflict);
    }
    Ok(())
}

/// Assembles `SettledPayment` projections for the given paid rows.
async fn build_settled<C: ConnectionTrait>(
    conn: &C,
    paid: Vec<payments::Model>,
) -> Result<Vec<SettledPayment>, LedgerError> {
    if paid.is_empty() {
        return Ok(vec![]);
    }

    let session_ids: Vec<Uuid> = paid.iter().map(|p| p.session_id).collect();
    let starts: HashMap<Uuid, chrono::DateTime<Utc>> = sessions::Entity::find()
        .filter(sessions::Column::Id.is_in(session_ids))
        .all(conn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|s| (s.id, s.start_time.with_timezone(&Utc)))
        .collect();

    let payment_ids: Vec<Uuid> = paid.iter().map(|p| p.id).collect();
    let mut entries_by_payment: HashMap<Uuid, Vec<payment_entries::Model>> = HashMap::new();
    let entry_rows = payment_entries::Entity::find()
        .filter(payment_entries::Column::PaymentId.is_in(payment_ids))
        .order_by_asc(payment_entries::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(db_err)?;
    for entry in entry_rows {
        entries_by_payment
            .entry(entry.payment_id)
            .or_default()
            .push(entry);
    }

    paid.into_iter()
        .map(|p| {
            let session_start = starts
                .get(&p.session_id)
                .copied()
                .ok_or(LedgerError::SessionNotFound(p.session_id))?;
            let entry_rows = entries_by_payment.remove(&p.id).unwrap_or_default();

            let records: Vec<TenderRecord> = entry_rows
                .iter()
                .map(|e| {
                    Ok(TenderRecord {
                        amount: stored_money(e.amount)?,
                        method: e.method.clone().into(),
                        paid_at: e.paid_at.with_timezone(&Utc),
                    })
                })
                .collect::<Result<_, LedgerError>>()?;

            let total_paid: Money = records.iter().map(|r| r.amount).sum();

            // The settling installment's timestamp is authoritative; the
            // last entry is the fallback for zero-charge payments.
            let completed_at = p
                .paid_at
                .map(|t| t.with_timezone(&Utc))
                .or_else(|| records.last().map(|r| r.paid_at))
                .unwrap_or_else(|| p.updated_at.with_timezone(&Utc));

            Ok(SettledPayment {
                payment_id: PaymentId::from_uuid(p.id),
                session_id: SessionId::from_uuid(p.session_id),
                session_date: session_start,
                expected_amount: stored_money(p.expected_amount)?,
                total_paid,
                completed_at,
                entries: records,
            })
        })
        .collect()
}
