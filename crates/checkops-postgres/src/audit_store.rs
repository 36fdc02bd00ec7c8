use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use checkops_types::audit::{AuditAction, AuditLog};
use checkops_types::check_item::Page;
use checkops_types::ports::{AuditStore, Result};

use crate::rowmap::AuditLogRow;

/// Per-tenant chain lock, held from `lock_tenant_chain` until the next
/// `append` for that tenant. This serializes `lock -> latest_hash ->
/// append` within one process; it does not span multiple server
/// processes, since the port trait has no transaction-scoped handle to
/// pin a single connection across those three calls. A multi-replica
/// deployment would need `ports::AuditStore` reshaped around a
/// transaction guard type to close that gap.
pub struct PgAuditStore {
    pool: PgPool,
    per_tenant: AsyncMutex<HashMap<Option<Uuid>, Arc<AsyncMutex<()>>>>,
    held: std::sync::Mutex<HashMap<Option<Uuid>, OwnedMutexGuard<()>>>,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, per_tenant: AsyncMutex::new(HashMap::new()), held: std::sync::Mutex::new(HashMap::new()) }
    }

    async fn tenant_mutex(&self, tenant_id: Option<Uuid>) -> Arc<AsyncMutex<()>> {
        let mut map = self.per_tenant.lock().await;
        map.entry(tenant_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    fn release(&self, tenant_id: Option<Uuid>) {
        self.held.lock().unwrap().remove(&tenant_id);
    }
}

const AUDIT_COLUMNS: &str = "id, tenant_id, timestamp, user_id, username, ip_address, user_agent, action, \
    resource_type, resource_id, description, before_value, after_value, extra_data, session_id, previous_hash, \
    integrity_hash";

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn latest_hash(&self, tenant_id: Option<Uuid>) -> Result<Option<String>> {
        let hash: Option<String> = sqlx::query_scalar(
            "SELECT integrity_hash FROM audit_logs WHERE tenant_id IS NOT DISTINCT FROM $1 ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();
        Ok(hash)
    }

    async fn append(&self, record: AuditLog) -> Result<AuditLog> {
        let row = sqlx::query_as::<_, AuditLogRow>(&format!(
            "INSERT INTO audit_logs \
             (id, tenant_id, timestamp, user_id, username, ip_address, user_agent, action, resource_type, \
              resource_id, description, before_value, after_value, extra_data, session_id, previous_hash, integrity_hash) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17) RETURNING {AUDIT_COLUMNS}"
        ))
        .bind(record.id)
        .bind(record.tenant_id)
        .bind(record.timestamp)
        .bind(record.user_id)
        .bind(&record.username)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(record.action.to_string())
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(&record.description)
        .bind(&record.before_value)
        .bind(&record.after_value)
        .bind(&record.extra_data)
        .bind(record.session_id)
        .bind(&record.previous_hash)
        .bind(&record.integrity_hash)
        .fetch_one(&self.pool)
        .await?;
        self.release(record.tenant_id);
        row.try_into()
    }

    async fn list(&self, tenant_id: Uuid, action: Option<AuditAction>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>, page: &Page) -> Result<(Vec<AuditLog>, i64)> {
        let action_str = action.map(|a| a.to_string());
        let rows = sqlx::query_as::<_, AuditLogRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs \
             WHERE tenant_id = $1 AND ($2::text IS NULL OR action = $2) \
               AND ($3::timestamptz IS NULL OR timestamp >= $3) AND ($4::timestamptz IS NULL OR timestamp <= $4) \
             ORDER BY timestamp DESC LIMIT $5 OFFSET $6"
        ))
        .bind(tenant_id)
        .bind(&action_str)
        .bind(from)
        .bind(to)
        .bind(page.page_size.max(1))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM audit_logs WHERE tenant_id = $1 AND ($2::text IS NULL OR action = $2) \
               AND ($3::timestamptz IS NULL OR timestamp >= $3) AND ($4::timestamptz IS NULL OR timestamp <= $4)",
        )
        .bind(tenant_id)
        .bind(&action_str)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        let logs = rows.into_iter().map(TryInto::try_into).collect::<Result<Vec<_>>>()?;
        Ok((logs, total))
    }

    async fn for_resource(&self, tenant_id: Uuid, resource_type: &str, resource_id: &str) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditLogRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3 ORDER BY timestamp ASC"
        ))
        .bind(tenant_id)
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn lock_tenant_chain(&self, tenant_id: Option<Uuid>) -> Result<()> {
        let mutex = self.tenant_mutex(tenant_id).await;
        let guard = mutex.lock_owned().await;
        self.held.lock().unwrap().insert(tenant_id, guard);
        Ok(())
    }
}
