use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use checkops_types::ports::{QueueStore, Result};
use checkops_types::queue::{Queue, QueueAssignment};

use crate::rowmap::{QueueAssignmentRow, QueueRow};

pub struct PgQueueStore {
    pool: PgPool,
}

impl PgQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn list(&self, tenant_id: Uuid) -> Result<Vec<Queue>> {
        let rows = sqlx::query_as::<_, QueueRow>(
            "SELECT id, tenant_id, name, description, is_active, created_at FROM queues WHERE tenant_id = $1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn assignments_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<QueueAssignment>> {
        let rows = sqlx::query_as::<_, QueueAssignmentRow>(
            "SELECT id, tenant_id, queue_id, user_id, can_review, can_approve, max_concurrent_items \
             FROM queue_assignments WHERE tenant_id = $1 AND user_id = $2",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
