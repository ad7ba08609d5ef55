//! `SeaORM` Entity for the payments table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PaymentStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub session_id: Uuid,
    pub client_id: Uuid,
    /// Charge snapshot taken from the session price; frozen at creation.
    pub expected_amount: Decimal,
    pub status: PaymentStatus,
    /// Set when the settling tender lands.
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub cancel_reason: Option<String>,
    pub refunded_amount: Option<Decimal>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTimeWithTimeZone>,
    /// Optimistic-lock version.
    pub version: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::clients::Entity",
        from = "Column::ClientId",
        to = "super::clients::Column::Id"
    )]
    Clients,
    #[sea_orm(
        belongs_to = "super::sessions::Entity",
        from = "Column::SessionId",
        to = "super::sessions::Column::Id"
    )]
    Sessions,
    #[sea_orm(has_many = "super::payment_entries::Entity")]
    PaymentEntries,
}

impl Related<super::clients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clients.def()
    }
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl Related<super::payment_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
