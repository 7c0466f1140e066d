//! Postgres implementation of the ledger storage seam.
//!
//! Writers serialize per (subject, balance type) on `balance_locks` rows taken
//! `FOR UPDATE` at the start of the unit of work. Reservation transitions are
//! conditional updates on `status = 'PENDING'`.

use chrono::{DateTime, Utc};
use entitle_core::ledger::{
    EntryQuery, EntryReference, EntryType, LedgerEntry, LedgerError, LedgerStore, LedgerTx,
    LockScope, NewLedgerEntry, ReferenceType, validate_new_entry,
};
use entitle_core::reservation::{Reservation, ReservationStatus, ReservationTransition};
use entitle_shared::types::{BalanceType, LedgerEntryId, ReservationId, SubjectId, UserId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    Statement, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{balance_locks, ledger_entries, reservations};

const LOCK_ROW_SQL: &str = r"
INSERT INTO balance_locks (subject_id, balance_type)
VALUES ($1, $2)
ON CONFLICT (subject_id, balance_type) DO NOTHING
";

fn db_err(e: DbErr) -> LedgerError {
    LedgerError::Database(e.to_string())
}

/// Ledger store backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a new store over an open connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self, scope: LockScope) -> Result<PgLedgerTx, LedgerError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        if let LockScope::Subject {
            subject_id,
            balance_types,
        } = &scope
        {
            for balance_type in balance_types {
                txn.execute(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    LOCK_ROW_SQL,
                    [subject_id.into_inner().into(), balance_type.as_str().into()],
                ))
                .await
                .map_err(db_err)?;
            }

            balance_locks::Entity::find()
                .filter(balance_locks::Column::SubjectId.eq(subject_id.into_inner()))
                .filter(
                    balance_locks::Column::BalanceType
                        .is_in(balance_types.iter().map(BalanceType::as_str)),
                )
                .order_by(Expr::cust(r#""balance_type" COLLATE "C""#), Order::Asc)
                .lock_exclusive()
                .all(&txn)
                .await
                .map_err(db_err)?;
            debug!(subject_id = %subject_id, locks = balance_types.len(), "Balance locks acquired");
        }

        Ok(PgLedgerTx { txn })
    }
}

/// Unit of work over one Postgres transaction. Dropping it rolls back.
pub struct PgLedgerTx {
    txn: DatabaseTransaction,
}

impl LedgerTx for PgLedgerTx {
    async fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError> {
        validate_new_entry(&entry)?;

        let model = ledger_entries::ActiveModel {
            id: Set(LedgerEntryId::new().into_inner()),
            subject_id: Set(entry.subject_id.into_inner()),
            period: Set(entry.period),
            balance_type: Set(entry.balance_type.as_str().to_string()),
            entry_type: Set(entry.entry_type.as_str().to_string()),
            amount: Set(entry.amount),
            reference_type: Set(entry.reference.reference_type.as_str().to_string()),
            reference_id: Set(entry.reference.reference_id),
            reference_status: Set(entry.reference.status),
            drawn_from: Set(entry.drawn_from.map(LedgerEntryId::into_inner)),
            expires_on: Set(entry.expires_on),
            created_by: Set(entry.created_by.map(UserId::into_inner)),
            created_at: Set(entry.created_at.into()),
            notes: Set(entry.notes),
        }
        .insert(&self.txn)
        .await
        .map_err(db_err)?;

        to_entry(model)
    }

    async fn get_by_reference(
        &mut self,
        reference_type: ReferenceType,
        reference_id: &str,
        entry_type: Option<EntryType>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut select = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::ReferenceType.eq(reference_type.as_str()))
            .filter(ledger_entries::Column::ReferenceId.eq(reference_id));
        if let Some(entry_type) = entry_type {
            select = select.filter(ledger_entries::Column::EntryType.eq(entry_type.as_str()));
        }

        select
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_entry)
            .collect()
    }

    async fn get_entries(&mut self, query: &EntryQuery) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut select = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::SubjectId.eq(query.subject_id.into_inner()));
        if let Some(period) = query.period {
            select = select.filter(ledger_entries::Column::Period.eq(period));
        }
        if !query.balance_types.is_empty() {
            select = select.filter(
                ledger_entries::Column::BalanceType
                    .is_in(query.balance_types.iter().map(BalanceType::as_str)),
            );
        }

        select
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_entry)
            .collect()
    }

    async fn subjects_with_entries(
        &mut self,
        balance_types: &[BalanceType],
    ) -> Result<Vec<SubjectId>, LedgerError> {
        let mut select = ledger_entries::Entity::find()
            .select_only()
            .column(ledger_entries::Column::SubjectId)
            .distinct();
        if !balance_types.is_empty() {
            select = select.filter(
                ledger_entries::Column::BalanceType
                    .is_in(balance_types.iter().map(BalanceType::as_str)),
            );
        }

        let subjects: Vec<Uuid> = select
            .order_by_asc(ledger_entries::Column::SubjectId)
            .into_tuple()
            .all(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(subjects.into_iter().map(SubjectId::from_uuid).collect())
    }

    async fn find_reservation(
        &mut self,
        reference_id: &str,
    ) -> Result<Option<Reservation>, LedgerError> {
        reservations::Entity::find()
            .filter(reservations::Column::ReferenceId.eq(reference_id))
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .map(to_reservation)
            .transpose()
    }

    async fn insert_reservation(
        &mut self,
        reservation: Reservation,
    ) -> Result<Reservation, LedgerError> {
        let reference_id = reservation.reference_id.clone();
        let model = reservations::ActiveModel {
            id: Set(reservation.id.into_inner()),
            subject_id: Set(reservation.subject_id.into_inner()),
            balance_type: Set(reservation.balance_type.as_str().to_string()),
            amount: Set(reservation.amount),
            reference_type: Set(reservation.reference_type.as_str().to_string()),
            reference_id: Set(reservation.reference_id),
            status: Set(reservation.status.as_str().to_string()),
            allow_negative: Set(reservation.allow_negative),
            expires_at: Set(reservation.expires_at.into()),
            created_by: Set(reservation.created_by.map(UserId::into_inner)),
            created_at: Set(reservation.created_at.into()),
            confirmed_at: Set(reservation.confirmed_at.map(Into::into)),
            cancelled_at: Set(reservation.cancelled_at.map(Into::into)),
            expired_at: Set(reservation.expired_at.map(Into::into)),
            cancel_reason: Set(reservation.cancel_reason),
        }
        .insert(&self.txn)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                LedgerError::DuplicateReservation(reference_id)
            }
            _ => db_err(e),
        })?;

        to_reservation(model)
    }

    async fn transition_reservation(
        &mut self,
        reference_id: &str,
        transition: ReservationTransition,
    ) -> Result<bool, LedgerError> {
        let status = transition.target_status().as_str();
        let mut update = reservations::Entity::update_many()
            .col_expr(reservations::Column::Status, Expr::value(status));
        update = match transition {
            ReservationTransition::Confirm { at } => update.col_expr(
                reservations::Column::ConfirmedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(at)),
            ),
            ReservationTransition::Cancel { at, reason } => update
                .col_expr(
                    reservations::Column::CancelledAt,
                    Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(at)),
                )
                .col_expr(reservations::Column::CancelReason, Expr::value(reason)),
            ReservationTransition::Expire { at } => update.col_expr(
                reservations::Column::ExpiredAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(at)),
            ),
        };

        let result = update
            .filter(reservations::Column::ReferenceId.eq(reference_id))
            .filter(reservations::Column::Status.eq(ReservationStatus::Pending.as_str()))
            .exec(&self.txn)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn list_reservations(
        &mut self,
        subject_id: SubjectId,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let mut select = reservations::Entity::find()
            .filter(reservations::Column::SubjectId.eq(subject_id.into_inner()));
        if let Some(status) = status {
            select = select.filter(reservations::Column::Status.eq(status.as_str()));
        }

        select
            .order_by_asc(reservations::Column::CreatedAt)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_reservation)
            .collect()
    }

    async fn pending_reservations(
        &mut self,
        subject_id: SubjectId,
        balance_types: &[BalanceType],
    ) -> Result<Vec<Reservation>, LedgerError> {
        reservations::Entity::find()
            .filter(reservations::Column::SubjectId.eq(subject_id.into_inner()))
            .filter(reservations::Column::Status.eq(ReservationStatus::Pending.as_str()))
            .filter(
                reservations::Column::BalanceType
                    .is_in(balance_types.iter().map(BalanceType::as_str)),
            )
            .order_by_asc(reservations::Column::CreatedAt)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_reservation)
            .collect()
    }

    async fn stale_reservations(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, LedgerError> {
        reservations::Entity::find()
            .filter(reservations::Column::Status.eq(ReservationStatus::Pending.as_str()))
            .filter(reservations::Column::ExpiresAt.lt(now))
            .order_by_asc(reservations::Column::ExpiresAt)
            .all(&self.txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_reservation)
            .collect()
    }

    async fn commit(self) -> Result<(), LedgerError> {
        self.txn.commit().await.map_err(db_err)
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.txn.rollback().await.map_err(db_err)
    }
}

// ========== Row Mapping ==========

fn corrupt(column: &str, value: &str) -> LedgerError {
    LedgerError::Internal(format!("unexpected {column} in storage: {value}"))
}

fn to_entry(model: ledger_entries::Model) -> Result<LedgerEntry, LedgerError> {
    let balance_type = BalanceType::parse(&model.balance_type)
        .ok_or_else(|| corrupt("balance_type", &model.balance_type))?;
    let entry_type = EntryType::parse(&model.entry_type)
        .ok_or_else(|| corrupt("entry_type", &model.entry_type))?;
    let reference_type = ReferenceType::parse(&model.reference_type)
        .ok_or_else(|| corrupt("reference_type", &model.reference_type))?;

    Ok(LedgerEntry {
        id: LedgerEntryId::from_uuid(model.id),
        subject_id: SubjectId::from_uuid(model.subject_id),
        period: model.period,
        balance_type,
        entry_type,
        amount: model.amount,
        reference: EntryReference {
            reference_type,
            reference_id: model.reference_id,
            status: model.reference_status,
        },
        drawn_from: model.drawn_from.map(LedgerEntryId::from_uuid),
        expires_on: model.expires_on,
        created_by: model.created_by.map(UserId::from_uuid),
        created_at: model.created_at.with_timezone(&Utc),
        notes: model.notes,
    })
}

fn to_reservation(model: reservations::Model) -> Result<Reservation, LedgerError> {
    let balance_type = BalanceType::parse(&model.balance_type)
        .ok_or_else(|| corrupt("balance_type", &model.balance_type))?;
    let reference_type = ReferenceType::parse(&model.reference_type)
        .ok_or_else(|| corrupt("reference_type", &model.reference_type))?;
    let status =
        ReservationStatus::parse(&model.status).ok_or_else(|| corrupt("status", &model.status))?;

    Ok(Reservation {
        id: ReservationId::from_uuid(model.id),
        subject_id: SubjectId::from_uuid(model.subject_id),
        balance_type,
        amount: model.amount,
        reference_type,
        reference_id: model.reference_id,
        status,
        allow_negative: model.allow_negative,
        expires_at: model.expires_at.with_timezone(&Utc),
        created_by: model.created_by.map(UserId::from_uuid),
        created_at: model.created_at.with_timezone(&Utc),
        confirmed_at: model.confirmed_at.map(|t| t.with_timezone(&Utc)),
        cancelled_at: model.cancelled_at.map(|t| t.with_timezone(&Utc)),
        expired_at: model.expired_at.map(|t| t.with_timezone(&Utc)),
        cancel_reason: model.cancel_reason,
    })
}
