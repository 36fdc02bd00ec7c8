//! Startup configuration, read once from the environment.
//!
//! Required secrets use `std::env::var(...).expect(...)` (the teacher's
//! `main.rs` idiom); optional ones fall back via `.unwrap_or_else`. Outside
//! `development`, weak or placeholder secrets abort startup rather than
//! silently running with them.

use std::time::Duration;

const WEAK_SECRET_DENYLIST: &[&str] = &["changeme", "secret", "password", "dev-pepper-not-for-production-use", "insecure", "test"];

#[derive(Clone)]
pub struct AppConfig {
    pub environment: String,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub secret_key: String,
    pub image_signing_key: String,
    pub csrf_secret_key: String,
    pub network_pepper: String,
    pub network_pepper_version: i32,
    pub network_pepper_prior: Option<String>,
    pub network_pepper_prior_version: i32,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    pub image_signed_url_ttl_seconds: i64,
    pub dual_control_threshold: rust_decimal::Decimal,
    pub default_sla_hours: i64,
    pub fraud_privacy_threshold: i32,
    pub trusted_proxy_ips: Vec<String>,
    pub cors_origins: Vec<String>,
    pub cookie_secure: bool,
    pub cookie_samesite: String,
    pub cookie_domain: Option<String>,
    pub bind_addr: String,
    pub image_storage_root: String,
    pub external_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let is_dev = environment == "development";

        let secret_key = std::env::var("SECRET_KEY").expect("SECRET_KEY must be set");
        let image_signing_key = std::env::var("IMAGE_SIGNING_KEY").expect("IMAGE_SIGNING_KEY must be set");
        let csrf_secret_key = std::env::var("CSRF_SECRET_KEY").expect("CSRF_SECRET_KEY must be set");
        let network_pepper = std::env::var("NETWORK_PEPPER").expect("NETWORK_PEPPER must be set");

        if !is_dev {
            for (name, value) in [
                ("SECRET_KEY", &secret_key),
                ("IMAGE_SIGNING_KEY", &image_signing_key),
                ("CSRF_SECRET_KEY", &csrf_secret_key),
                ("NETWORK_PEPPER", &network_pepper),
            ] {
                require_strong_secret(name, value);
            }
        }

        Self {
            environment,
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            redis_url: std::env::var("REDIS_URL").ok(),
            secret_key,
            image_signing_key,
            csrf_secret_key,
            network_pepper,
            network_pepper_version: env_parse("NETWORK_PEPPER_VERSION", 1),
            network_pepper_prior: std::env::var("NETWORK_PEPPER_PRIOR").ok(),
            network_pepper_prior_version: env_parse("NETWORK_PEPPER_PRIOR_VERSION", 0),
            access_token_expire_minutes: env_parse("ACCESS_TOKEN_EXPIRE_MINUTES", 15),
            refresh_token_expire_days: env_parse("REFRESH_TOKEN_EXPIRE_DAYS", 7),
            image_signed_url_ttl_seconds: env_parse("IMAGE_SIGNED_URL_TTL_SECONDS", 90),
            dual_control_threshold: std::env::var("DUAL_CONTROL_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| rust_decimal::Decimal::new(5000, 0)),
            default_sla_hours: env_parse("DEFAULT_SLA_HOURS", 4),
            fraud_privacy_threshold: env_parse("FRAUD_PRIVACY_THRESHOLD", 3),
            trusted_proxy_ips: env_list("TRUSTED_PROXY_IPS"),
            cors_origins: env_list("CORS_ORIGINS"),
            cookie_secure: std::env::var("COOKIE_SECURE").map(|v| v != "false").unwrap_or(!is_dev),
            cookie_samesite: std::env::var("COOKIE_SAMESITE").unwrap_or_else(|_| "Lax".into()),
            cookie_domain: std::env::var("COOKIE_DOMAIN").ok(),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            image_storage_root: std::env::var("IMAGE_STORAGE_ROOT").unwrap_or_else(|_| "./data/images".into()),
            external_timeout: Duration::from_secs(30),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn require_strong_secret(name: &str, value: &str) {
    if value.len() < 32 {
        panic!("{name} must be at least 32 characters outside development");
    }
    let lower = value.to_ascii_lowercase();
    if WEAK_SECRET_DENYLIST.iter().any(|bad| lower.contains(bad)) {
        panic!("{name} looks like a placeholder value — set a real secret outside development");
    }
}
