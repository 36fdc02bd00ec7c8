use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A one-time-use image access token. The token's `id` IS the bearer
/// value presented in the URL; consuming it is a single conditional
/// `UPDATE ... WHERE used_at IS NULL` round-trip (see checkops-postgres).
#[derive(Debug, Clone)]
pub struct ImageAccessToken {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub image_id: Uuid,
    pub created_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_ip: Option<String>,
    pub used_by_user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Served,
    AlreadyUsed,
    Expired,
    NotFound,
}

impl ImageAccessToken {
    /// Pure check mirroring the database-level conditional update: given
    /// the row as read, what outcome would a consume attempt produce.
    /// The actual state transition happens atomically in the adapter;
    /// this is used for pre-flight validation and tests.
    pub fn consume_outcome(&self, now: DateTime<Utc>) -> ConsumeOutcome {
        if self.used_at.is_some() {
            ConsumeOutcome::AlreadyUsed
        } else if self.expires_at < now {
            ConsumeOutcome::Expired
        } else {
            ConsumeOutcome::Served
        }
    }
}

pub const DEFAULT_BATCH_MINT_LIMIT: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base(now: DateTime<Utc>) -> ImageAccessToken {
        ImageAccessToken {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            image_id: Uuid::new_v4(),
            created_by_user_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + Duration::seconds(90),
            used_at: None,
            used_by_ip: None,
            used_by_user_agent: None,
        }
    }

    #[test]
    fn fresh_token_is_servable() {
        let now = Utc::now();
        assert_eq!(base(now).consume_outcome(now), ConsumeOutcome::Served);
    }

    #[test]
    fn used_token_rejected() {
        let now = Utc::now();
        let mut t = base(now);
        t.used_at = Some(now);
        assert_eq!(t.consume_outcome(now), ConsumeOutcome::AlreadyUsed);
    }

    #[test]
    fn expired_token_rejected_one_second_after_expiry() {
        let now = Utc::now();
        let t = base(now);
        let after_expiry = t.expires_at + Duration::seconds(1);
        assert_eq!(t.consume_outcome(after_expiry), ConsumeOutcome::Expired);
    }
}
