//! # Audit Repository
//!
//! Append-only audit trail. Rows are only ever inserted, and always on the
//! connection of the transaction whose effect they describe: if that
//! transaction rolls back, the audit row goes with it.

use std::sync::Arc;

use barpos_core::{new_id, AuditAction, AuditLogEntry, Clock};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const AUDIT_COLUMNS: &str = "id, actor_id, register_id, action, details_json, created_at";

/// Repository for audit log rows.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        AuditRepository { pool, clock }
    }

    /// Appends an audit row inside the caller's transaction.
    pub async fn record(
        &self,
        conn: &mut SqliteConnection,
        actor_id: Option<&str>,
        register_id: Option<&str>,
        action: AuditAction,
        details: Option<Value>,
    ) -> DbResult<AuditLogEntry> {
        let entry = AuditLogEntry {
            id: new_id(),
            actor_id: actor_id.map(str::to_string),
            register_id: register_id.map(str::to_string),
            action,
            details_json: details.map(|d| d.to_string()),
            created_at: self.clock.now(),
        };

        debug!(action = ?entry.action, register_id = ?entry.register_id, "Recording audit entry");

        sqlx::query(
            r#"
            INSERT INTO audit_log (id, actor_id, register_id, action, details_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.actor_id)
        .bind(&entry.register_id)
        .bind(entry.action)
        .bind(&entry.details_json)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(entry)
    }

    /// Most recent entries first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<AuditLogEntry>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        );
        let entries = sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Entries attributed to one register shift, oldest first.
    pub async fn for_register(&self, register_id: &str) -> DbResult<Vec<AuditLogEntry>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE register_id = ?1 ORDER BY created_at, rowid"
        );
        let entries = sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(register_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Entries of one action kind, oldest first.
    pub async fn by_action(&self, action: AuditAction) -> DbResult<Vec<AuditLogEntry>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE action = ?1 ORDER BY created_at, rowid"
        );
        let entries = sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(action)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let audit = db.audit();

        let mut tx = db.pool().begin().await.unwrap();
        audit
            .record(
                &mut tx,
                Some("user-1"),
                None,
                AuditAction::StockAdjustment,
                Some(json!({ "productId": "p1", "quantity": 5 })),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let entries = audit.recent(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::StockAdjustment);
        assert_eq!(entries[0].actor_id.as_deref(), Some("user-1"));

        let details: Value = serde_json::from_str(entries[0].details_json.as_deref().unwrap()).unwrap();
        assert_eq!(details["quantity"], 5);

        assert_eq!(audit.by_action(AuditAction::StockAdjustment).await.unwrap().len(), 1);
        assert!(audit.by_action(AuditAction::OrderClosed).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rolled_back_entry_disappears() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let audit = db.audit();

        let mut tx = db.pool().begin().await.unwrap();
        audit
            .record(&mut tx, Some("user-1"), None, AuditAction::ItemCanceled, None)
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(audit.recent(10).await.unwrap().is_empty());
    }
}
