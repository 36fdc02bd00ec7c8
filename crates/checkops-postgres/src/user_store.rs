use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use checkops_types::ports::{Result, UserStore};
use checkops_types::user::{Role, User};

use crate::rowmap::{user_from_row, UserRow};

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn role_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT role_id FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username_or_email(&self, tenant_id: Uuid, identifier: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, tenant_id, username, email, password_hash, is_active, is_superuser, mfa_enabled, mfa_secret, \
             failed_login_attempts, locked_until, allowed_ips, last_login, created_at, updated_at \
             FROM users WHERE tenant_id = $1 AND (username = $2 OR email = $2)",
        )
        .bind(tenant_id)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let role_ids = self.role_ids_for_user(row.id).await?;
                Ok(Some(user_from_row(row, role_ids)))
            }
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, tenant_id, username, email, password_hash, is_active, is_superuser, mfa_enabled, mfa_secret, \
             failed_login_attempts, locked_until, allowed_ips, last_login, created_at, updated_at \
             FROM users WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let role_ids = self.role_ids_for_user(row.id).await?;
                Ok(Some(user_from_row(row, role_ids)))
            }
            None => Ok(None),
        }
    }

    async fn record_login_success(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE users SET last_login = $2, failed_login_attempts = 0, locked_until = NULL, updated_at = $2 WHERE id = $1",
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_login_failure(&self, user_id: Uuid, locked_until: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query(
            "UPDATE users SET failed_login_attempts = failed_login_attempts + 1, locked_until = $2, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(locked_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT r.id, r.name FROM roles r JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id, name)| Role { id, name }).collect())
    }

    async fn permissions_for_roles(&self, role_ids: &[Uuid]) -> Result<Vec<String>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT resource, action FROM role_permissions WHERE role_id = ANY($1)",
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(resource, action)| format!("{resource}:{action}")).collect())
    }
}
