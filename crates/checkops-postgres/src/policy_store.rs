use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use checkops_types::check_item::AccountType;
use checkops_types::policy::{Policy, PolicyRule, PolicyVersion};
use checkops_types::ports::{PolicyStore, Result};

use crate::rowmap::{policy_version_from_row, PolicyRow, PolicyRuleRow, PolicyVersionRow};

pub struct PgPolicyStore {
    pool: PgPool,
}

impl PgPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn rules_for_version(&self, version_id: Uuid) -> Result<Vec<PolicyRule>> {
        let rows = sqlx::query_as::<_, PolicyRuleRow>(
            "SELECT id, name, rule_type, priority, is_enabled, conditions, actions, amount_threshold, created_at \
             FROM policy_rules WHERE policy_version_id = $1",
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn get_active_policy_version(&self, tenant_id: Uuid, account_type: AccountType, now: DateTime<Utc>) -> Result<Option<(Policy, PolicyVersion)>> {
        let account_type_str = account_type.to_string();
        let policy_row = sqlx::query_as::<_, PolicyRow>(
            "SELECT p.id, p.tenant_id, p.name, p.status, p.is_default, p.applies_to_account_types \
             FROM policies p \
             JOIN policy_versions pv ON pv.policy_id = p.id AND pv.is_current \
             WHERE p.tenant_id = $1 AND p.status = 'active' AND pv.effective_date <= $3 \
               AND (p.applies_to_account_types IS NULL OR $2 = ANY(p.applies_to_account_types)) \
             ORDER BY p.is_default ASC, pv.effective_date DESC \
             LIMIT 1",
        )
        .bind(tenant_id)
        .bind(&account_type_str)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        let Some(policy_row) = policy_row else {
            return Ok(None);
        };
        let version_row = sqlx::query_as::<_, PolicyVersionRow>(
            "SELECT id, policy_id, effective_date, is_current FROM policy_versions WHERE policy_id = $1 AND is_current LIMIT 1",
        )
        .bind(policy_row.id)
        .fetch_one(&self.pool)
        .await?;
        let rules = self.rules_for_version(version_row.id).await?;
        let policy: Policy = policy_row.try_into()?;
        let version = policy_version_from_row(version_row, rules);
        Ok(Some((policy, version)))
    }

    async fn get_policy(&self, tenant_id: Uuid, policy_id: Uuid) -> Result<Option<Policy>> {
        let row = sqlx::query_as::<_, PolicyRow>(
            "SELECT id, tenant_id, name, status, is_default, applies_to_account_types FROM policies WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(policy_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_policies(&self, tenant_id: Uuid) -> Result<Vec<Policy>> {
        let rows = sqlx::query_as::<_, PolicyRow>(
            "SELECT id, tenant_id, name, status, is_default, applies_to_account_types FROM policies WHERE tenant_id = $1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_policy(&self, policy: Policy, initial_version: PolicyVersion) -> Result<(Policy, PolicyVersion)> {
        let applies_to: Option<Vec<String>> = policy.applies_to_account_types.as_ref().map(|types| types.iter().map(|t| t.to_string()).collect());
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO policies (id, tenant_id, name, status, is_default, applies_to_account_types) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(policy.id)
        .bind(policy.tenant_id)
        .bind(&policy.name)
        .bind(policy.status.to_string())
        .bind(policy.is_default)
        .bind(&applies_to)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO policy_versions (id, policy_id, effective_date, is_current) VALUES ($1, $2, $3, $4)",
        )
        .bind(initial_version.id)
        .bind(initial_version.policy_id)
        .bind(initial_version.effective_date)
        .bind(initial_version.is_current)
        .execute(&mut *tx)
        .await?;

        for rule in &initial_version.rules {
            sqlx::query(
                "INSERT INTO policy_rules (id, policy_version_id, name, rule_type, priority, is_enabled, conditions, \
                 actions, amount_threshold, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(rule.id)
            .bind(initial_version.id)
            .bind(&rule.name)
            .bind(rule.rule_type.to_string())
            .bind(rule.priority)
            .bind(rule.is_enabled)
            .bind(serde_json::to_value(&rule.conditions).unwrap_or_default())
            .bind(serde_json::to_value(&rule.actions).unwrap_or_default())
            .bind(rule.amount_threshold)
            .bind(rule.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((policy, initial_version))
    }

    async fn activate_policy(&self, tenant_id: Uuid, policy_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE policies SET status = 'active' WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(policy_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
