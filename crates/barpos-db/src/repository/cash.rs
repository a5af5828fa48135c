//! # Cash Register Repository
//!
//! Shift lifecycle of the single cash register: open with a float, record
//! withdrawals and reinforcements, close with a counted float and a
//! reconciliation.
//!
//! ## Shift Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  open_register(float)          ──► CashRegister { status: OPEN }        │
//! │       │                            audit: REGISTER_OPENED               │
//! │       │                                                                 │
//! │       ├── record_movement(WITHDRAWAL | REINFORCEMENT)                   │
//! │       │                            audit: WITHDRAWAL | REINFORCEMENT    │
//! │       │                                                                 │
//! │       ├── (orders take payments; they count if paid_at falls in the     │
//! │       │    shift window)                                                │
//! │       ▼                                                                 │
//! │  close_register(counted)       ──► CashRegister { status: CLOSED }      │
//! │                                    + ShiftBalance                       │
//! │                                    audit: REGISTER_CLOSED               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "At most one OPEN register" is backed by a partial unique index, so two
//! concurrent opens cannot both commit.

use std::sync::Arc;

use barpos_core::cash::require_open_for_ledger;
use barpos_core::validation::{normalize_optional, validate_amount, validate_non_negative};
use barpos_core::{
    new_id, AuditAction, CashMovement, CashRegister, CashRegisterStatus, Clock, ClosedShift,
    CoreError, Money, MovementKind, ShiftBalance,
};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use crate::repository::audit::AuditRepository;

const REGISTER_COLUMNS: &str =
    "id, status, opened_by, opening_float_cents, opened_at, closed_at, closing_float_cents";
const MOVEMENT_COLUMNS: &str =
    "id, register_id, performed_by, kind, amount_cents, reason, created_at";

/// Repository for cash registers and their movements.
#[derive(Debug, Clone)]
pub struct CashRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    audit: AuditRepository,
}

impl CashRepository {
    /// Creates a new CashRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        let audit = AuditRepository::new(pool.clone(), clock.clone());
        CashRepository { pool, clock, audit }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The currently OPEN register, if any.
    pub async fn get_open(&self) -> DbResult<Option<CashRegister>> {
        let mut conn = self.pool.acquire().await?;
        self.get_open_in(&mut conn).await
    }

    /// Same as [`get_open`](Self::get_open), inside the caller's transaction.
    pub async fn get_open_in(&self, conn: &mut SqliteConnection) -> DbResult<Option<CashRegister>> {
        let sql = format!("SELECT {REGISTER_COLUMNS} FROM cash_registers WHERE status = 'OPEN'");
        let register = sqlx::query_as::<_, CashRegister>(&sql)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(register)
    }

    /// Gets a register by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<CashRegister>> {
        let sql = format!("SELECT {REGISTER_COLUMNS} FROM cash_registers WHERE id = ?1");
        let register = sqlx::query_as::<_, CashRegister>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(register)
    }

    /// Movements of one shift, oldest first.
    pub async fn movements(&self, register_id: &str) -> DbResult<Vec<CashMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM cash_movements WHERE register_id = ?1 ORDER BY created_at, rowid"
        );
        let movements = sqlx::query_as::<_, CashMovement>(&sql)
            .bind(register_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Past and current shifts, most recent first.
    pub async fn history(&self, limit: u32) -> DbResult<Vec<CashRegister>> {
        let sql = format!(
            "SELECT {REGISTER_COLUMNS} FROM cash_registers ORDER BY opened_at DESC, rowid DESC LIMIT ?1"
        );
        let registers = sqlx::query_as::<_, CashRegister>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(registers)
    }

    // =========================================================================
    // Shift Lifecycle
    // =========================================================================

    /// Opens a shift with the given float.
    ///
    /// ## Errors
    /// * `CashRegisterAlreadyOpen`
    /// * `Validation` - negative float
    pub async fn open_register(
        &self,
        actor_id: &str,
        opening_float_cents: i64,
    ) -> DbResult<CashRegister> {
        validate_non_negative("opening_float_cents", opening_float_cents)
            .map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;

        if self.get_open_in(&mut tx).await?.is_some() {
            return Err(CoreError::CashRegisterAlreadyOpen.into());
        }

        let register = CashRegister {
            id: new_id(),
            status: CashRegisterStatus::Open,
            opened_by: actor_id.to_string(),
            opening_float_cents,
            opened_at: self.clock.now(),
            closed_at: None,
            closing_float_cents: None,
        };

        sqlx::query(
            r#"
            INSERT INTO cash_registers (id, status, opened_by, opening_float_cents, opened_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&register.id)
        .bind(register.status)
        .bind(&register.opened_by)
        .bind(register.opening_float_cents)
        .bind(register.opened_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_on("cash_registers") => {
                DbError::Domain(CoreError::CashRegisterAlreadyOpen)
            }
            err => err,
        })?;

        self.audit
            .record(
                &mut tx,
                Some(actor_id),
                Some(&register.id),
                AuditAction::RegisterOpened,
                Some(json!({ "openingFloatCents": opening_float_cents })),
            )
            .await?;

        tx.commit().await?;

        info!(
            register_id = %register.id,
            opened_by = %actor_id,
            opening_float = %register.opening_float(),
            "Cash register opened"
        );
        Ok(register)
    }

    /// Closes the open shift and reconciles it.
    ///
    /// ```text
    /// expected = opening float
    ///          + payments with paid_at in [opened_at, now]
    ///          + reinforcements − withdrawals of this shift
    /// ```
    ///
    /// A non-zero discrepancy is logged and audited but never blocks the close.
    ///
    /// ## Errors
    /// * `NoOpenCashRegister`
    /// * `Validation` - negative counted float
    pub async fn close_register(
        &self,
        actor_id: &str,
        closing_float_cents: i64,
    ) -> DbResult<ClosedShift> {
        validate_non_negative("closing_float_cents", closing_float_cents)
            .map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;

        let open = require_open_for_ledger(self.get_open_in(&mut tx).await?)?;
        let closed_at = self.clock.now();

        let payments: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)
            FROM payments
            WHERE paid_at >= ?1 AND paid_at <= ?2
            "#,
        )
        .bind(open.opened_at)
        .bind(closed_at)
        .fetch_one(&mut *tx)
        .await?;

        let (reinforcements, withdrawals) = self.movement_totals(&mut tx, &open.id).await?;

        let balance = ShiftBalance::reconcile(
            open.opening_float(),
            Money::from_cents(payments),
            reinforcements,
            withdrawals,
            Money::from_cents(closing_float_cents),
        );

        let result = sqlx::query(
            r#"
            UPDATE cash_registers
            SET status = 'CLOSED', closed_at = ?2, closing_float_cents = ?3
            WHERE id = ?1 AND status = 'OPEN'
            "#,
        )
        .bind(&open.id)
        .bind(closed_at)
        .bind(closing_float_cents)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NoOpenCashRegister.into());
        }

        self.audit
            .record(
                &mut tx,
                Some(actor_id),
                Some(&open.id),
                AuditAction::RegisterClosed,
                Some(json!({
                    "closingFloatCents": balance.closing_float_cents,
                    "expectedCents": balance.expected_cents,
                    "discrepancyCents": balance.discrepancy_cents,
                    "paymentsCents": balance.payments_cents,
                    "movementsCents": balance.movements_net().cents(),
                })),
            )
            .await?;

        tx.commit().await?;

        if balance.is_balanced() {
            info!(register_id = %open.id, expected = %balance.expected(), "Cash register closed");
        } else {
            warn!(
                register_id = %open.id,
                expected = %balance.expected(),
                discrepancy = %balance.discrepancy(),
                "Cash register closed with discrepancy"
            );
        }

        let register = CashRegister {
            status: CashRegisterStatus::Closed,
            closed_at: Some(closed_at),
            closing_float_cents: Some(closing_float_cents),
            ..open
        };

        Ok(ClosedShift { register, balance })
    }

    /// Records a withdrawal or reinforcement on the open shift.
    ///
    /// ## Errors
    /// * `NoOpenCashRegister`
    /// * `InvalidAmount` - amount ≤ 0
    pub async fn record_movement(
        &self,
        actor_id: &str,
        kind: MovementKind,
        amount_cents: i64,
        reason: Option<&str>,
    ) -> DbResult<CashMovement> {
        validate_amount(amount_cents)?;

        let mut tx = begin_write(&self.pool).await?;

        let open = require_open_for_ledger(self.get_open_in(&mut tx).await?)?;

        let movement = CashMovement {
            id: new_id(),
            register_id: open.id.clone(),
            performed_by: actor_id.to_string(),
            kind,
            amount_cents,
            reason: normalize_optional(reason),
            created_at: self.clock.now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_movements (id, register_id, performed_by, kind, amount_cents, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.register_id)
        .bind(&movement.performed_by)
        .bind(movement.kind)
        .bind(movement.amount_cents)
        .bind(&movement.reason)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        self.audit
            .record(
                &mut tx,
                Some(actor_id),
                Some(&open.id),
                AuditAction::from(kind),
                Some(json!({
                    "movementId": movement.id,
                    "amountCents": amount_cents,
                    "reason": movement.reason,
                })),
            )
            .await?;

        tx.commit().await?;

        debug!(
            register_id = %open.id,
            kind = ?kind,
            amount = %Money::from_cents(amount_cents),
            "Cash movement recorded"
        );
        Ok(movement)
    }

    /// (reinforcements, withdrawals) of one shift.
    async fn movement_totals(
        &self,
        conn: &mut SqliteConnection,
        register_id: &str,
    ) -> DbResult<(Money, Money)> {
        let (reinforcements, withdrawals): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN kind = 'REINFORCEMENT' THEN amount_cents END), 0),
                COALESCE(SUM(CASE WHEN kind = 'WITHDRAWAL' THEN amount_cents END), 0)
            FROM cash_movements
            WHERE register_id = ?1
            "#,
        )
        .bind(register_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok((
            Money::from_cents(reinforcements),
            Money::from_cents(withdrawals),
        ))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{file_backed, Database, DbConfig};
    use barpos_core::FixedClock;
    use chrono::{Duration, TimeZone, Utc};

    async fn setup() -> (Database, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap(),
        ));
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(clock.clone());
        (db, clock)
    }

    #[tokio::test]
    async fn test_only_one_open_register() {
        let (db, _) = setup().await;
        let cash = db.cash();

        let register = cash.open_register("cashier-1", 10_000).await.unwrap();
        assert!(register.is_open());

        let err = cash.open_register("cashier-2", 5_000).await.unwrap_err();
        assert_eq!(err.code(), "CASH_REGISTER_ALREADY_OPEN");

        let open = cash.get_open().await.unwrap().unwrap();
        assert_eq!(open.id, register.id);
    }

    #[tokio::test]
    async fn test_negative_float_rejected() {
        let (db, _) = setup().await;
        let err = db.cash().open_register("c", -1).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(db.cash().get_open().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_movements_require_open_register() {
        let (db, _) = setup().await;
        let cash = db.cash();

        let err = cash
            .record_movement("c", MovementKind::Withdrawal, 100, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NO_OPEN_CASH_REGISTER");

        let err = cash.close_register("c", 0).await.unwrap_err();
        assert_eq!(err.code(), "NO_OPEN_CASH_REGISTER");

        cash.open_register("c", 0).await.unwrap();
        let err = cash
            .record_movement("c", MovementKind::Reinforcement, 0, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn test_close_reconciles_movements() {
        let (db, clock) = setup().await;
        let cash = db.cash();

        let register = cash.open_register("cashier-1", 10_000).await.unwrap();
        clock.advance(Duration::minutes(30));
        cash.record_movement("cashier-1", MovementKind::Reinforcement, 5_000, Some("change"))
            .await
            .unwrap();
        cash.record_movement("cashier-1", MovementKind::Withdrawal, 2_000, Some("  "))
            .await
            .unwrap();
        clock.advance(Duration::hours(4));

        let closed = cash.close_register("cashier-1", 12_500).await.unwrap();
        assert_eq!(closed.register.id, register.id);
        assert_eq!(closed.register.status, CashRegisterStatus::Closed);
        assert_eq!(closed.register.closing_float_cents, Some(12_500));
        assert_eq!(closed.balance.expected_cents, 13_000);
        assert_eq!(closed.balance.discrepancy_cents, -500);

        let movements = cash.movements(&register.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].reason.as_deref(), Some("change"));
        assert_eq!(movements[1].reason, None);

        let stored = cash.get(&register.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CashRegisterStatus::Closed);
        assert_eq!(stored.closed_at, Some(clock.now()));

        let trail = db.audit().for_register(&register.id).await.unwrap();
        let actions: Vec<AuditAction> = trail.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::RegisterOpened,
                AuditAction::Reinforcement,
                AuditAction::Withdrawal,
                AuditAction::RegisterClosed,
            ]
        );
        let details: serde_json::Value =
            serde_json::from_str(trail[3].details_json.as_deref().unwrap()).unwrap();
        assert_eq!(details["discrepancyCents"], -500);
        assert_eq!(details["movementsCents"], 3_000);
    }

    #[tokio::test]
    async fn test_reopen_after_close_and_history() {
        let (db, clock) = setup().await;
        let cash = db.cash();

        cash.open_register("c", 100).await.unwrap();
        clock.advance(Duration::hours(8));
        cash.close_register("c", 100).await.unwrap();
        clock.advance(Duration::hours(12));
        let second = cash.open_register("c", 200).await.unwrap();

        let history = cash.history(10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].status, CashRegisterStatus::Closed);
    }

    #[tokio::test]
    async fn test_concurrent_opens_leave_one_register() {
        let (db, _) = setup().await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cash = db.cash();
                tokio::spawn(async move { cash.open_register(&format!("c{i}"), 1_000).await })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(err) => assert_eq!(err.code(), "CASH_REGISTER_ALREADY_OPEN"),
            }
        }
        assert_eq!(opened, 1);

        let open: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cash_registers WHERE status = 'OPEN'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(open, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pooled_opens_leave_one_register() {
        let (_dir, db) = file_backed(8).await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cash = db.cash();
                tokio::spawn(async move { cash.open_register(&format!("c{i}"), 1_000).await })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(err) => assert_eq!(err.code(), "CASH_REGISTER_ALREADY_OPEN", "{err}"),
            }
        }
        assert_eq!(opened, 1);

        let register = db.cash().get_open().await.unwrap().unwrap();
        let trail = db.audit().for_register(&register.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, AuditAction::RegisterOpened);

        // Movements from many connections all land on the one open shift.
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let cash = db.cash();
                tokio::spawn(async move {
                    cash.record_movement("c0", MovementKind::Reinforcement, 100, None)
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(db.cash().movements(&register.id).await.unwrap().len(), 6);
    }
}
