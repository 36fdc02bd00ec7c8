use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use checkops_types::check_item::{CheckHistory, CheckImage, CheckItem, CheckItemFilter, Page};
use checkops_types::ports::{CheckItemStore, Result};

use crate::rowmap::{CheckHistoryRow, CheckImageRow, CheckItemRow};

pub struct PgCheckItemStore {
    pool: PgPool,
}

impl PgCheckItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const ITEM_COLUMNS: &str = "id, tenant_id, external_item_id, source_system, amount, currency, account_id, \
    account_number_masked, account_type, routing_number, check_number, payee_name, memo, presented_date, \
    check_date, process_date, micr_line, micr_account, micr_routing, micr_check_number, item_type, status, \
    risk_level, priority, context, advisory, assigned_reviewer_id, assigned_approver_id, queue_id, sla_due_at, \
    sla_breached, requires_dual_control, pending_dual_control_decision_id, dual_control_reason, \
    policy_version_id, created_at, updated_at";

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, tenant_id: Uuid, filter: &'a CheckItemFilter) {
    qb.push(" WHERE tenant_id = ").push_bind(tenant_id);
    if let Some(status) = &filter.status {
        let as_strings: Vec<String> = status.iter().map(|s| s.to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(as_strings).push(")");
    }
    if let Some(levels) = &filter.risk_level {
        let as_strings: Vec<String> = levels.iter().map(|l| l.to_string()).collect();
        qb.push(" AND risk_level = ANY(").push_bind(as_strings).push(")");
    }
    if let Some(min) = filter.amount_min {
        qb.push(" AND amount >= ").push_bind(min);
    }
    if let Some(max) = filter.amount_max {
        qb.push(" AND amount <= ").push_bind(max);
    }
    if let Some(queue_id) = filter.queue_id {
        qb.push(" AND queue_id = ").push_bind(queue_id);
    }
    if let Some(reviewer_id) = filter.assigned_reviewer_id {
        qb.push(" AND assigned_reviewer_id = ").push_bind(reviewer_id);
    }
    if let Some(approver_id) = filter.assigned_approver_id {
        qb.push(" AND assigned_approver_id = ").push_bind(approver_id);
    }
    if let Some(has_flags) = filter.has_ai_flags {
        qb.push(" AND (advisory->>'has_ai_flags')::boolean = ").push_bind(has_flags);
    }
    if let Some(breached) = filter.sla_breached {
        qb.push(" AND sla_breached = ").push_bind(breached);
    }
    if let Some(from) = filter.presented_date_from {
        qb.push(" AND presented_date >= ").push_bind(from);
    }
    if let Some(to) = filter.presented_date_to {
        qb.push(" AND presented_date <= ").push_bind(to);
    }
}

#[async_trait]
impl CheckItemStore for PgCheckItemStore {
    async fn upsert_from_provider(&self, item: CheckItem) -> Result<CheckItem> {
        let row = sqlx::query_as::<_, CheckItemRow>(&format!(
            "INSERT INTO check_items \
             (id, tenant_id, external_item_id, source_system, amount, currency, account_id, account_number_masked, \
              account_type, routing_number, check_number, payee_name, memo, presented_date, check_date, process_date, \
              micr_line, micr_account, micr_routing, micr_check_number, item_type, status, risk_level, priority, \
              context, advisory, assigned_reviewer_id, assigned_approver_id, queue_id, sla_due_at, sla_breached, \
              requires_dual_control, pending_dual_control_decision_id, dual_control_reason, policy_version_id, \
              created_at, updated_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24,$25,$26, \
                     $27,$28,$29,$30,$31,$32,$33,$34,$35,$36,$37) \
             ON CONFLICT (tenant_id, source_system, external_item_id) DO UPDATE SET \
               amount = EXCLUDED.amount, context = EXCLUDED.context, advisory = EXCLUDED.advisory, \
               updated_at = EXCLUDED.updated_at \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item.id)
        .bind(item.tenant_id)
        .bind(&item.external_item_id)
        .bind(&item.source_system)
        .bind(item.amount)
        .bind(&item.currency)
        .bind(&item.account_id)
        .bind(&item.account_number_masked)
        .bind(item.account_type.to_string())
        .bind(&item.routing_number)
        .bind(&item.check_number)
        .bind(&item.payee_name)
        .bind(&item.memo)
        .bind(item.presented_date)
        .bind(item.check_date)
        .bind(item.process_date)
        .bind(&item.micr_line)
        .bind(&item.micr_account)
        .bind(&item.micr_routing)
        .bind(&item.micr_check_number)
        .bind(item.item_type.to_string())
        .bind(item.status.to_string())
        .bind(item.risk_level.to_string())
        .bind(item.priority)
        .bind(serde_json::to_value(&item.context).unwrap_or_default())
        .bind(serde_json::to_value(&item.advisory).unwrap_or_default())
        .bind(item.assigned_reviewer_id)
        .bind(item.assigned_approver_id)
        .bind(item.queue_id)
        .bind(item.sla_due_at)
        .bind(item.sla_breached)
        .bind(item.requires_dual_control)
        .bind(item.pending_dual_control_decision_id)
        .bind(&item.dual_control_reason)
        .bind(item.policy_version_id)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get(&self, tenant_id: Uuid, item_id: Uuid) -> Result<Option<CheckItem>> {
        let row = sqlx::query_as::<_, CheckItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM check_items WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_for_update(&self, tenant_id: Uuid, item_id: Uuid) -> Result<Option<CheckItem>> {
        let row = sqlx::query_as::<_, CheckItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM check_items WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, tenant_id: Uuid, filter: &CheckItemFilter, page: &Page) -> Result<(Vec<CheckItem>, i64)> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM check_items"));
        push_filter(&mut qb, tenant_id, filter);
        qb.push(" ORDER BY priority DESC, presented_date ASC, id ASC");
        qb.push(" LIMIT ").push_bind(page.page_size.max(1));
        qb.push(" OFFSET ").push_bind(page.offset());
        let rows: Vec<CheckItemRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut count_qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT count(*) FROM check_items");
        push_filter(&mut count_qb, tenant_id, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let items = rows.into_iter().map(TryInto::try_into).collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn adjacent(&self, tenant_id: Uuid, item_id: Uuid, filter: &CheckItemFilter) -> Result<(Option<Uuid>, Option<Uuid>)> {
        let mut ids_qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT id FROM check_items");
        push_filter(&mut ids_qb, tenant_id, filter);
        ids_qb.push(" ORDER BY priority DESC, presented_date ASC, id ASC");
        let ids: Vec<Uuid> = ids_qb.build_query_scalar().fetch_all(&self.pool).await?;

        let Some(pos) = ids.iter().position(|id| *id == item_id) else {
            return Ok((None, None));
        };
        let prev = pos.checked_sub(1).and_then(|i| ids.get(i)).copied();
        let next = ids.get(pos + 1).copied();
        Ok((prev, next))
    }

    async fn assign(&self, tenant_id: Uuid, item_id: Uuid, reviewer_id: Option<Uuid>, approver_id: Option<Uuid>, queue_id: Option<Uuid>) -> Result<CheckItem> {
        let row = sqlx::query_as::<_, CheckItemRow>(&format!(
            "UPDATE check_items SET assigned_reviewer_id = $3, assigned_approver_id = $4, queue_id = $5, updated_at = now() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(item_id)
        .bind(reviewer_id)
        .bind(approver_id)
        .bind(queue_id)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn set_status(&self, tenant_id: Uuid, item_id: Uuid, new_status: checkops_types::check_item::CheckStatus) -> Result<CheckItem> {
        let row = sqlx::query_as::<_, CheckItemRow>(&format!(
            "UPDATE check_items SET status = $3, updated_at = now() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(item_id)
        .bind(new_status.to_string())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn images_for_item(&self, tenant_id: Uuid, item_id: Uuid) -> Result<Vec<CheckImage>> {
        let rows = sqlx::query_as::<_, CheckImageRow>(
            "SELECT id, tenant_id, check_item_id, image_type, external_image_id, storage_path, content_type, \
             width, height, dpi, thumbnail_path, created_at FROM check_images WHERE tenant_id = $1 AND check_item_id = $2",
        )
        .bind(tenant_id)
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn history_for_account(&self, tenant_id: Uuid, account_id: &str, limit: i64) -> Result<Vec<CheckHistory>> {
        let rows = sqlx::query_as::<_, CheckHistoryRow>(
            "SELECT id, tenant_id, account_id, check_number, amount, cleared_date, signature_hash, check_stock_hash, created_at \
             FROM check_history WHERE tenant_id = $1 AND account_id = $2 ORDER BY cleared_date DESC NULLS LAST LIMIT $3",
        )
        .bind(tenant_id)
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
