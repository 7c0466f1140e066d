//! Ledger schema.
//!
//! Creates the append-only ledger, the reservations table and the per-pool
//! lock rows.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: LEDGER
        // ============================================================
        db.execute_unprepared(LEDGER_SQL).await?;

        // ============================================================
        // PART 2: RESERVATIONS
        // ============================================================
        db.execute_unprepared(RESERVATIONS_SQL).await?;

        // ============================================================
        // PART 3: LOCKS
        // ============================================================
        db.execute_unprepared(LOCKS_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const LEDGER_SQL: &str = r"
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    subject_id UUID NOT NULL,
    period INTEGER NOT NULL,
    balance_type VARCHAR(32) NOT NULL,
    entry_type VARCHAR(32) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    reference_type VARCHAR(32) NOT NULL,
    reference_id VARCHAR(128) NOT NULL,
    reference_status VARCHAR(32),
    drawn_from UUID REFERENCES ledger_entries(id),
    expires_on DATE,
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    notes TEXT,
    CONSTRAINT chk_ledger_amount_non_negative CHECK (amount >= 0),
    CONSTRAINT chk_ledger_entry_type CHECK (entry_type IN (
        'ACCRUAL', 'ADJUSTMENT_ADD', 'CARRY_OVER', 'USAGE', 'ADJUSTMENT_SUB', 'EXPIRED'
    ))
);

-- Balance and history reads
CREATE INDEX idx_ledger_subject_period ON ledger_entries(subject_id, period, balance_type, created_at);

-- Idempotency lookups
CREATE INDEX idx_ledger_reference ON ledger_entries(reference_type, reference_id);

-- Bucket replay
CREATE INDEX idx_ledger_drawn_from ON ledger_entries(drawn_from) WHERE drawn_from IS NOT NULL;
";

const RESERVATIONS_SQL: &str = r"
CREATE TABLE reservations (
    id UUID PRIMARY KEY,
    subject_id UUID NOT NULL,
    balance_type VARCHAR(32) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    reference_type VARCHAR(32) NOT NULL,
    reference_id VARCHAR(128) NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'PENDING',
    allow_negative BOOLEAN NOT NULL DEFAULT false,
    expires_at TIMESTAMPTZ NOT NULL,
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    confirmed_at TIMESTAMPTZ,
    cancelled_at TIMESTAMPTZ,
    expired_at TIMESTAMPTZ,
    cancel_reason TEXT,
    CONSTRAINT uq_reservations_reference UNIQUE (reference_id),
    CONSTRAINT chk_reservation_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_reservation_status CHECK (status IN ('PENDING', 'CONFIRMED', 'CANCELLED', 'EXPIRED'))
);

-- Open holds per pool
CREATE INDEX idx_reservations_pending ON reservations(subject_id, balance_type) WHERE status = 'PENDING';

-- Stale hold scan
CREATE INDEX idx_reservations_expiry ON reservations(expires_at) WHERE status = 'PENDING';
";

const LOCKS_SQL: &str = r"
CREATE TABLE balance_locks (
    subject_id UUID NOT NULL,
    balance_type VARCHAR(32) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (subject_id, balance_type)
);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_ledger_modification
-- Ledger rows are immutable; corrections are new entries
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_ledger_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'ledger_entries is append-only. Post a correcting entry instead.';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_append_only
BEFORE UPDATE OR DELETE ON ledger_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_ledger_modification();
";

const DROP_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_ledger_append_only ON ledger_entries;
DROP FUNCTION IF EXISTS prevent_ledger_modification();
DROP TABLE IF EXISTS balance_locks CASCADE;
DROP TABLE IF EXISTS reservations CASCADE;
DROP TABLE IF EXISTS ledger_entries CASCADE;
";
