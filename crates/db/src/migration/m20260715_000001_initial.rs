//! Initial database migration.
//!
//! Creates the ledger enums, tables, constraints, indexes, and the
//! updated_at trigger.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: TABLES
        // ============================================================
        db.execute_unprepared(CLIENTS_SQL).await?;
        db.execute_unprepared(SESSIONS_SQL).await?;
        db.execute_unprepared(PAYMENTS_SQL).await?;
        db.execute_unprepared(PAYMENT_ENTRIES_SQL).await?;
        db.execute_unprepared(ALLOCATION_EVENTS_SQL).await?;

        // ============================================================
        // PART 3: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- Therapy session kinds
CREATE TYPE session_kind AS ENUM (
    'in_person',
    'online',
    'phone',
    'break'
);

-- Payment lifecycle
CREATE TYPE payment_status AS ENUM (
    'pending',
    'paid',
    'cancelled',
    'refunded'
);

-- How a tender was handed over; 'credit' marks an implicit tender
-- funded from the client's credit balance
CREATE TYPE payment_method AS ENUM (
    'cash',
    'credit_card',
    'bank_transfer',
    'check',
    'credit'
);
";

const CLIENTS_SQL: &str = r"
CREATE TABLE clients (
    id UUID PRIMARY KEY,
    full_name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    credit_balance NUMERIC(12,2) NOT NULL DEFAULT 0
        CHECK (credit_balance >= 0),
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const SESSIONS_SQL: &str = r"
CREATE TABLE sessions (
    id UUID PRIMARY KEY,
    client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    start_time TIMESTAMPTZ NOT NULL,
    end_time TIMESTAMPTZ NOT NULL,
    kind session_kind NOT NULL,
    price NUMERIC(12,2) NOT NULL DEFAULT 0 CHECK (price >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CHECK (end_time > start_time)
);

CREATE INDEX idx_sessions_client_start ON sessions(client_id, start_time);
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    session_id UUID NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    expected_amount NUMERIC(12,2) NOT NULL CHECK (expected_amount >= 0),
    status payment_status NOT NULL DEFAULT 'pending',
    paid_at TIMESTAMPTZ,
    cancel_reason TEXT,
    refunded_amount NUMERIC(12,2) CHECK (refunded_amount >= 0),
    refund_reason TEXT,
    refunded_at TIMESTAMPTZ,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- One live payment per session; cancelled payments free the slot
CREATE UNIQUE INDEX uq_payments_live_session
    ON payments(session_id) WHERE status <> 'cancelled';

CREATE INDEX idx_payments_client_status ON payments(client_id, status);
CREATE INDEX idx_payments_paid_at ON payments(paid_at) WHERE paid_at IS NOT NULL;
";

const PAYMENT_ENTRIES_SQL: &str = r"
-- Append-only tender ledger; rows are never updated or deleted
CREATE TABLE payment_entries (
    id UUID PRIMARY KEY,
    payment_id UUID NOT NULL REFERENCES payments(id) ON DELETE CASCADE,
    amount NUMERIC(12,2) NOT NULL CHECK (amount > 0),
    method payment_method NOT NULL,
    paid_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_payment_entries_payment
    ON payment_entries(payment_id, created_at);
";

const ALLOCATION_EVENTS_SQL: &str = r"
-- Outbox of allocation outcomes; also the idempotency journal for
-- bulk settlement
CREATE TABLE allocation_events (
    id UUID PRIMARY KEY,
    client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    payment_id UUID REFERENCES payments(id) ON DELETE SET NULL,
    amount_applied NUMERIC(12,2) NOT NULL DEFAULT 0,
    credit_delta NUMERIC(12,2) NOT NULL DEFAULT 0,
    new_status payment_status,
    idempotency_key TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_allocation_events_client
    ON allocation_events(client_id, created_at);
CREATE INDEX idx_allocation_events_key
    ON allocation_events(idempotency_key) WHERE idempotency_key IS NOT NULL;
";

const TRIGGERS_SQL: &str = r"
CREATE OR REPLACE FUNCTION touch_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_clients_touch
    BEFORE UPDATE ON clients
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

CREATE TRIGGER trg_sessions_touch
    BEFORE UPDATE ON sessions
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

CREATE TRIGGER trg_payments_touch
    BEFORE UPDATE ON payments
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS allocation_events;
DROP TABLE IF EXISTS payment_entries;
DROP TABLE IF EXISTS payments;
DROP TABLE IF EXISTS sessions;
DROP TABLE IF EXISTS clients;
DROP FUNCTION IF EXISTS touch_updated_at();
DROP TYPE IF EXISTS payment_method;
DROP TYPE IF EXISTS payment_status;
DROP TYPE IF EXISTS session_kind;
";
