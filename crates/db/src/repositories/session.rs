//! Session repository for database operations.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use praxis_core::ledger::{LedgerError, SessionKind};
use praxis_shared::types::{Money, PageRequest};

use super::db_err;
use crate::entities::{clients, payments, sea_orm_active_enums, sessions};

/// Input for creating a session.
#[derive(Debug, Clone)]
pub struct CreateSessionInput {
    /// The client the session belongs to.
    pub client_id: Uuid,
    /// Scheduled start.
    pub start_time: DateTime<Utc>,
    /// Scheduled end.
    pub end_time: DateTime<Utc>,
    /// Kind of session.
    pub kind: SessionKind,
    /// Charge for the session. Break sessions carry no charge regardless
    /// of this value.
    pub price: Money,
}

/// Input for updating a session before it is charged.
#[derive(Debug, Clone, Default)]
pub struct UpdateSessionInput {
    /// New start time.
    pub start_time: Option<DateTime<Utc>>,
    /// New end time.
    pub end_time: Option<DateTime<Utc>>,
    /// New price; rejected once a live payment exists.
    pub price: Option<Money>,
}

/// Session repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    db: DatabaseConnection,
}

impl SessionRepository {
    /// Creates a new session repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a new session.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotFound` if the client does not exist.
    pub async fn create(&self, input: CreateSessionInput) -> Result<sessions::Model, LedgerError> {
        clients::Entity::find_by_id(input.client_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::ClientNotFound(input.client_id))?;

        let now = Utc::now().into();
        let price = if input.kind.is_chargeable() {
            input.price.amount()
        } else {
            rust_decimal::Decimal::ZERO
        };

        let session = sessions::ActiveModel {
            id: Set(Uuid::new_v4()),
            client_id: Set(input.client_id),
            start_time: Set(input.start_time.into()),
            end_time: Set(input.end_time.into()),
            kind: Set(input.kind.into()),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
        };

        session.insert(&self.db).await.map_err(db_err)
    }

    /// Gets a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no such session exists.
    pub async fn get(&self, session_id: Uuid) -> Result<sessions::Model, LedgerError> {
        sessions::Entity::find_by_id(session_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::SessionNotFound(session_id))
    }

    /// Lists a client's sessions, most recent first, paginated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_client(
        &self,
        client_id: Uuid,
        page: &PageRequest,
    ) -> Result<(Vec<sessions::Model>, u64), LedgerError> {
        let query = sessions::Entity::find().filter(sessions::Column::ClientId.eq(client_id));

        let total = query.clone().count(&self.db).await.map_err(db_err)?;

        let items = query
            .order_by_desc(sessions::Column::StartTime)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok((items, total))
    }

    /// Updates a session's schedule and price.
    ///
    /// The price is locked once a live (non-cancelled) payment exists;
    /// its `expected_amount` snapshot would otherwise silently diverge
    /// from the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no such session exists and
    /// `PriceLocked` on a price change after a payment was created.
    pub async fn update(
        &self,
        session_id: Uuid,
        input: UpdateSessionInput,
    ) -> Result<sessions::Model, LedgerError> {
        let session = self.get(session_id).await?;

        if input.price.is_some() {
            let live_payment = payments::Entity::find()
                .filter(payments::Column::SessionId.eq(session_id))
                .filter(
                    payments::Column::Status
                        .ne(sea_orm_active_enums::PaymentStatus::Cancelled),
                )
                .one(&self.db)
                .await
                .map_err(db_err)?;
            if live_payment.is_some() {
                return Err(LedgerError::PriceLocked(session_id));
            }
        }

        let mut active: sessions::ActiveModel = session.into();
        if let Some(start) = input.start_time {
            active.start_time = Set(start.into());
        }
        if let Some(end) = input.end_time {
            active.end_time = Set(end.into());
        }
        if let Some(price) = input.price {
            active.price = Set(price.amount());
        }
        active.updated_at = Set(Utc::now().into());

        active.update(&self.db).await.map_err(db_err)
    }
}
