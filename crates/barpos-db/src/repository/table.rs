//! # Table Repository
//!
//! Physical tables and their occupancy.
//!
//! ## Occupancy State Machine
//! ```text
//!            assign (open / convert-to)
//!   ┌──────┐ ─────────────────────────► ┌──────────┐
//!   │ FREE │                            │ OCCUPIED │
//!   └──────┘ ◄───────────────────────── └──────────┘
//!            release (close / convert-from)
//!
//!   AWAITING_PAYMENT is only ever set manually with `set_status`.
//! ```
//!
//! `assign` is a compare-and-set: `UPDATE ... WHERE status = 'FREE'`. Two
//! orders racing for the same table cannot both see it FREE.

use std::sync::Arc;

use barpos_core::validation::validate_name;
use barpos_core::{new_id, Clock, CoreError, Table, TableStatus};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

const TABLE_COLUMNS: &str = "id, label, status, created_at";

/// Repository for dining tables.
#[derive(Debug, Clone)]
pub struct TableRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl TableRepository {
    /// Creates a new TableRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        TableRepository { pool, clock }
    }

    /// Creates a FREE table.
    ///
    /// ## Errors
    /// * `Validation` - blank or overlong label
    /// * `DbError::UniqueViolation` - label already in use
    pub async fn create(&self, label: &str) -> DbResult<Table> {
        let label = validate_name("label", label).map_err(CoreError::from)?;

        let table = Table {
            id: new_id(),
            label,
            status: TableStatus::Free,
            created_at: self.clock.now(),
        };

        sqlx::query(
            "INSERT INTO dining_tables (id, label, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&table.id)
        .bind(&table.label)
        .bind(table.status)
        .bind(table.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_on("dining_tables.label") => {
                DbError::duplicate("label", table.label.clone())
            }
            err => err,
        })?;

        info!(table_id = %table.id, label = %table.label, "Table created");
        Ok(table)
    }

    /// Gets a table by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Table>> {
        let mut conn = self.pool.acquire().await?;
        self.find_in(&mut conn, id).await
    }

    pub(crate) async fn find_in(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Table>> {
        let sql = format!("SELECT {TABLE_COLUMNS} FROM dining_tables WHERE id = ?1");
        let table = sqlx::query_as::<_, Table>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(table)
    }

    /// All tables, ordered by label.
    ///
    /// Numeric labels sort numerically ("2" before "10").
    pub async fn list(&self) -> DbResult<Vec<Table>> {
        let sql = format!(
            "SELECT {TABLE_COLUMNS} FROM dining_tables \
             ORDER BY CAST(label AS INTEGER) = 0, CAST(label AS INTEGER), label"
        );
        let tables = sqlx::query_as::<_, Table>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(tables)
    }

    /// Tables currently FREE.
    pub async fn list_free(&self) -> DbResult<Vec<Table>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.status == TableStatus::Free)
            .collect())
    }

    /// Manual status override (e.g. AWAITING_PAYMENT when the bill is asked).
    pub async fn set_status(&self, id: &str, status: TableStatus) -> DbResult<Table> {
        let result = sqlx::query("UPDATE dining_tables SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::TableNotFound(id.to_string()).into());
        }

        debug!(table_id = %id, status = %status, "Table status set");
        self.get(id)
            .await?
            .ok_or_else(|| CoreError::TableNotFound(id.to_string()).into())
    }

    /// Changes a table's label.
    pub async fn rename(&self, id: &str, label: &str) -> DbResult<Table> {
        let label = validate_name("label", label).map_err(CoreError::from)?;

        let result = sqlx::query("UPDATE dining_tables SET label = ?2 WHERE id = ?1")
            .bind(id)
            .bind(&label)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                err if err.is_unique_on("dining_tables.label") => {
                    DbError::duplicate("label", label.clone())
                }
                err => err,
            })?;

        if result.rows_affected() == 0 {
            return Err(CoreError::TableNotFound(id.to_string()).into());
        }

        self.get(id)
            .await?
            .ok_or_else(|| CoreError::TableNotFound(id.to_string()).into())
    }

    /// Counts tables (for seeding and diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dining_tables")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // In-transaction transitions
    // =========================================================================

    /// FREE → OCCUPIED inside the caller's transaction.
    ///
    /// ## Errors
    /// * `TableNotFound`
    /// * `TableNotAvailable` - the table is not FREE
    pub async fn assign(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE dining_tables SET status = 'OCCUPIED' WHERE id = ?1 AND status = 'FREE'",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.find_in(conn, id).await? {
                None => CoreError::TableNotFound(id.to_string()),
                Some(table) => CoreError::TableNotAvailable {
                    table_id: id.to_string(),
                    status: table.status,
                },
            }
            .into());
        }

        debug!(table_id = %id, "Table assigned");
        Ok(())
    }

    /// Sets the table FREE inside the caller's transaction. Idempotent.
    ///
    /// ## Errors
    /// * `TableNotFound`
    pub async fn release(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE dining_tables SET status = 'FREE' WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::TableNotFound(id.to_string()).into());
        }

        debug!(table_id = %id, "Table released");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_list_in_numeric_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tables = db.tables();

        for label in ["10", "2", "Varanda", "1"] {
            tables.create(label).await.unwrap();
        }

        let labels: Vec<String> = tables
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.label)
            .collect();
        assert_eq!(labels, vec!["1", "2", "10", "Varanda"]);
        assert_eq!(tables.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_duplicate_label() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.tables().create("1").await.unwrap();

        let err = db.tables().create("1").await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let err = db.tables().create("   ").await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_assign_is_compare_and_set() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tables = db.tables();
        let table = tables.create("5").await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        tables.assign(&mut conn, &table.id).await.unwrap();

        let err = tables.assign(&mut conn, &table.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::TableNotAvailable {
                status: TableStatus::Occupied,
                ..
            })
        ));

        let err = tables.assign(&mut conn, "nope").await.unwrap_err();
        assert_eq!(err.code(), "TABLE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tables = db.tables();
        let table = tables.create("7").await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        tables.assign(&mut conn, &table.id).await.unwrap();
        tables.release(&mut conn, &table.id).await.unwrap();
        tables.release(&mut conn, &table.id).await.unwrap();
        drop(conn);

        let table = tables.get(&table.id).await.unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Free);
    }

    #[tokio::test]
    async fn test_manual_status_and_rename() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tables = db.tables();
        let table = tables.create("3").await.unwrap();

        let table = tables
            .set_status(&table.id, TableStatus::AwaitingPayment)
            .await
            .unwrap();
        assert_eq!(table.status, TableStatus::AwaitingPayment);
        assert!(tables.list_free().await.unwrap().is_empty());

        let table = tables.rename(&table.id, "Varanda 3").await.unwrap();
        assert_eq!(table.label, "Varanda 3");

        let err = tables.set_status("nope", TableStatus::Free).await.unwrap_err();
        assert_eq!(err.code(), "TABLE_NOT_FOUND");
    }
}
