//! Client repository for database operations.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use praxis_core::ledger::LedgerError;
use praxis_shared::types::PageRequest;

use super::db_err;
use crate::entities::clients;

/// Input for creating a client.
#[derive(Debug, Clone)]
pub struct CreateClientInput {
    /// Full display name.
    pub full_name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
}

/// Client repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    db: DatabaseConnection,
}

impl ClientRepository {
    /// Creates a new client repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a new client with a zero credit balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, input: CreateClientInput) -> Result<clients::Model, LedgerError> {
        let now = Utc::now().into();

        let client = clients::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(input.full_name),
            email: Set(input.email),
            phone: Set(input.phone),
            credit_balance: Set(rust_decimal::Decimal::ZERO),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };

        client.insert(&self.db).await.map_err(db_err)
    }

    /// Gets a client by ID.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotFound` if no such client exists.
    pub async fn get(&self, client_id: Uuid) -> Result<clients::Model, LedgerError> {
        clients::Entity::find_by_id(client_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::ClientNotFound(client_id))
    }

    /// Lists clients ordered by name, paginated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        page: &PageRequest,
    ) -> Result<(Vec<clients::Model>, u64), LedgerError> {
        let total = clients::Entity::find()
            .count(&self.db)
            .await
            .map_err(db_err)?;

        let items = clients::Entity::find()
            .order_by_asc(clients::Column::FullName)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok((items, total))
    }

    /// Updates a client's contact details.
    ///
    /// The credit balance is deliberately not updatable here; only the
    /// allocation engine moves it.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotFound` if no such client exists.
    pub async fn update_contact(
        &self,
        client_id: Uuid,
        full_name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<clients::Model, LedgerError> {
        let client = self.get(client_id).await?;

        let mut active: clients::ActiveModel = client.into();
        if let Some(name) = full_name {
            active.full_name = Set(name);
        }
        if let Some(e) = email {
            active.email = Set(Some(e));
        }
        if let Some(p) = phone {
            active.phone = Set(Some(p));
        }
        active.updated_at = Set(Utc::now().into());

        active.update(&self.db).await.map_err(db_err)
    }
}
