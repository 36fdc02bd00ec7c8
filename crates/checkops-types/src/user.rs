use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub mfa_enabled: bool,
    pub mfa_secret: Option<String>,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub allowed_ips: Option<Vec<String>>,
    pub last_login: Option<DateTime<Utc>>,
    pub role_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until > now)
    }

    /// Whether `ip` is permitted, given the configured allowlist. Entries
    /// may be an exact address or a CIDR block (IPv4 or IPv6); an empty
    /// or absent allowlist means no restriction.
    pub fn ip_allowed(&self, ip: IpAddr) -> bool {
        let Some(entries) = &self.allowed_ips else { return true };
        if entries.is_empty() {
            return true;
        }
        entries.iter().any(|entry| ip_matches_entry(ip, entry))
    }
}

fn ip_matches_entry(ip: IpAddr, entry: &str) -> bool {
    if let Ok(net) = entry.parse::<IpNetwork>() {
        return net.contains(ip);
    }
    entry.parse::<IpAddr>().map(|exact| exact == ip).unwrap_or(false)
}

pub const MAX_FAILED_LOGIN_ATTEMPTS: i32 = 5;
pub const LOCKOUT_DURATION_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Permission {
    pub resource: String,
    pub action: String,
}

impl Permission {
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}

/// A live refresh-token handle. The refresh token itself is never stored
/// — only its SHA-256 hash — so a leaked database backup cannot be used
/// to mint sessions.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub refresh_token_hash: String,
    pub device_fingerprint: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl UserSession {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_and_exact_allowlist_entries_match() {
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            username: "u".into(),
            email: "u@example.com".into(),
            password_hash: String::new(),
            is_active: true,
            is_superuser: false,
            mfa_enabled: false,
            mfa_secret: None,
            failed_login_attempts: 0,
            locked_until: None,
            allowed_ips: Some(vec!["10.0.0.0/8".into(), "203.0.113.5".into()]),
            last_login: None,
            role_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(user.ip_allowed("10.1.2.3".parse().unwrap()));
        assert!(user.ip_allowed("203.0.113.5".parse().unwrap()));
        assert!(!user.ip_allowed("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn empty_allowlist_permits_any_ip() {
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            username: "u".into(),
            email: "u@example.com".into(),
            password_hash: String::new(),
            is_active: true,
            is_superuser: false,
            mfa_enabled: false,
            mfa_secret: None,
            failed_login_attempts: 0,
            locked_until: None,
            allowed_ips: None,
            last_login: None,
            role_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(user.ip_allowed("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn lockout_after_fifth_failure_blocks_sixth_attempt() {
        let now = Utc::now();
        let mut user_attempts = 0;
        for _ in 0..5 {
            user_attempts += 1;
        }
        assert_eq!(user_attempts, MAX_FAILED_LOGIN_ATTEMPTS);
        let locked_until = now + chrono::Duration::minutes(LOCKOUT_DURATION_MINUTES);
        assert!(locked_until > now);
    }
}
