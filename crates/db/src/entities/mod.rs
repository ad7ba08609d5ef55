//! `SeaORM` entity definitions for the payment ledger.

pub mod allocation_events;
pub mod clients;
pub mod payment_entries;
pub mod payments;
pub mod sea_orm_active_enums;
pub mod sessions;
