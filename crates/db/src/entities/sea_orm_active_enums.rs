//! Database enum types mapped to Postgres enums.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment lifecycle status (Postgres `payment_status`).
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_status")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Open charge.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Fully settled.
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Cancelled before settlement.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Reversed after settlement.
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

/// Tender method (Postgres `payment_method`).
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_method")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash.
    #[sea_orm(string_value = "cash")]
    Cash,
    /// Card charged outside the system.
    #[sea_orm(string_value = "credit_card")]
    CreditCard,
    /// Bank transfer.
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    /// Paper check.
    #[sea_orm(string_value = "check")]
    Check,
    /// Funded from the client's credit balance.
    #[sea_orm(string_value = "credit")]
    Credit,
}

/// Therapy session kind (Postgres `session_kind`).
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "session_kind")]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Held at the practice.
    #[sea_orm(string_value = "in_person")]
    InPerson,
    /// Video session.
    #[sea_orm(string_value = "online")]
    Online,
    /// Phone session.
    #[sea_orm(string_value = "phone")]
    Phone,
    /// Blocked-out time; never charged.
    #[sea_orm(string_value = "break")]
    Break,
}

// ============================================================================
// Conversions to/from the core domain enums
// ============================================================================

impl From<PaymentStatus> for praxis_core::ledger::PaymentStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => Self::Pending,
            PaymentStatus::Paid => Self::Paid,
            PaymentStatus::Cancelled => Self::Cancelled,
            PaymentStatus::Refunded => Self::Refunded,
        }
    }
}

impl From<praxis_core::ledger::PaymentStatus> for PaymentStatus {
    fn from(status: praxis_core::ledger::PaymentStatus) -> Self {
        match status {
            praxis_core::ledger::PaymentStatus::Pending => Self::Pending,
            praxis_core::ledger::PaymentStatus::Paid => Self::Paid,
            praxis_core::ledger::PaymentStatus::Cancelled => Self::Cancelled,
            praxis_core::ledger::PaymentStatus::Refunded => Self::Refunded,
        }
    }
}

impl From<PaymentMethod> for praxis_core::ledger::PaymentMethod {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => Self::Cash,
            PaymentMethod::CreditCard => Self::CreditCard,
            PaymentMethod::BankTransfer => Self::BankTransfer,
            PaymentMethod::Check => Self::Check,
            PaymentMethod::Credit => Self::Credit,
        }
    }
}

impl From<praxis_core::ledger::PaymentMethod> for PaymentMethod {
    fn from(method: praxis_core::ledger::PaymentMethod) -> Self {
        match method {
            praxis_core::ledger::PaymentMethod::Cash => Self::Cash,
            praxis_core::ledger::PaymentMethod::CreditCard => Self::CreditCard,
            praxis_core::ledger::PaymentMethod::BankTransfer => Self::BankTransfer,
            praxis_core::ledger::PaymentMethod::Check => Self::Check,
            praxis_core::ledger::PaymentMethod::Credit => Self::Credit,
        }
    }
}

impl From<SessionKind> for praxis_core::ledger::SessionKind {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::InPerson => Self::InPerson,
            SessionKind::Online => Self::Online,
            SessionKind::Phone => Self::Phone,
            SessionKind::Break => Self::Break,
        }
    }
}

impl From<praxis_core::ledger::SessionKind> for SessionKind {
    fn from(kind: praxis_core::ledger::SessionKind) -> Self {
        match kind {
            praxis_core::ledger::SessionKind::InPerson => Self::InPerson,
            praxis_core::ledger::SessionKind::Online => Self::Online,
            praxis_core::ledger::SessionKind::Phone => Self::Phone,
            praxis_core::ledger::SessionKind::Break => Self::Break,
        }
    }
}
