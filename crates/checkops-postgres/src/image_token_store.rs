use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use checkops_types::image_token::ImageAccessToken;
use checkops_types::ports::{ImageTokenStore, Result};

use crate::rowmap::ImageTokenRow;

pub struct PgImageTokenStore {
    pool: PgPool,
}

impl PgImageTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str =
    "id, tenant_id, image_id, created_by_user_id, created_at, expires_at, used_at, used_by_ip, used_by_user_agent";

#[async_trait]
impl ImageTokenStore for PgImageTokenStore {
    async fn mint(&self, token: ImageAccessToken) -> Result<ImageAccessToken> {
        let row = sqlx::query_as::<_, ImageTokenRow>(&format!(
            "INSERT INTO image_access_tokens (id, tenant_id, image_id, created_by_user_id, created_at, expires_at, \
             used_at, used_by_ip, used_by_user_agent) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {COLUMNS}"
        ))
        .bind(token.id)
        .bind(token.tenant_id)
        .bind(token.image_id)
        .bind(token.created_by_user_id)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(&token.used_by_ip)
        .bind(&token.used_by_user_agent)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn mint_batch(&self, tokens: Vec<ImageAccessToken>) -> Result<Vec<ImageAccessToken>> {
        let mut tx = self.pool.begin().await?;
        let mut minted = Vec::with_capacity(tokens.len());
        for token in tokens {
            let row = sqlx::query_as::<_, ImageTokenRow>(&format!(
                "INSERT INTO image_access_tokens (id, tenant_id, image_id, created_by_user_id, created_at, \
                 expires_at, used_at, used_by_ip, used_by_user_agent) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 RETURNING {COLUMNS}"
            ))
            .bind(token.id)
            .bind(token.tenant_id)
            .bind(token.image_id)
            .bind(token.created_by_user_id)
            .bind(token.created_at)
            .bind(token.expires_at)
            .bind(token.used_at)
            .bind(&token.used_by_ip)
            .bind(&token.used_by_user_agent)
            .fetch_one(&mut *tx)
            .await?;
            minted.push(row.into());
        }
        tx.commit().await?;
        Ok(minted)
    }

    async fn try_consume(&self, token_id: Uuid, used_by_ip: Option<String>, used_by_user_agent: Option<String>, now: DateTime<Utc>) -> Result<Option<ImageAccessToken>> {
        let row = sqlx::query_as::<_, ImageTokenRow>(&format!(
            "UPDATE image_access_tokens SET used_at = $2, used_by_ip = $3, used_by_user_agent = $4 \
             WHERE id = $1 AND used_at IS NULL RETURNING {COLUMNS}"
        ))
        .bind(token_id)
        .bind(now)
        .bind(used_by_ip)
        .bind(used_by_user_agent)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get(&self, token_id: Uuid) -> Result<Option<ImageAccessToken>> {
        let row = sqlx::query_as::<_, ImageTokenRow>(&format!("SELECT {COLUMNS} FROM image_access_tokens WHERE id = $1"))
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }
}
