use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use checkops_types::ports::{Result, SessionStore};
use checkops_types::user::UserSession;

use crate::rowmap::UserSessionRow;

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: UserSession) -> Result<UserSession> {
        let row = sqlx::query_as::<_, UserSessionRow>(
            "INSERT INTO user_sessions (id, tenant_id, user_id, refresh_token_hash, device_fingerprint, ip_address, \
             user_agent, created_at, expires_at, is_active, revoked_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id, tenant_id, user_id, refresh_token_hash, device_fingerprint, ip_address, user_agent, \
             created_at, expires_at, is_active, revoked_at",
        )
        .bind(session.id)
        .bind(session.tenant_id)
        .bind(session.user_id)
        .bind(&session.refresh_token_hash)
        .bind(&session.device_fingerprint)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.is_active)
        .bind(session.revoked_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_by_refresh_hash(&self, refresh_token_hash: &str) -> Result<Option<UserSession>> {
        let row = sqlx::query_as::<_, UserSessionRow>(
            "SELECT id, tenant_id, user_id, refresh_token_hash, device_fingerprint, ip_address, user_agent, \
             created_at, expires_at, is_active, revoked_at FROM user_sessions WHERE refresh_token_hash = $1",
        )
        .bind(refresh_token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn revoke(&self, session_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE user_sessions SET is_active = false, revoked_at = $2 WHERE id = $1")
            .bind(session_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("UPDATE user_sessions SET is_active = false, revoked_at = $2 WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
