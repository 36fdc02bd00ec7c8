//! Password hashing, TOTP MFA, and JWT issuance/verification.
//!
//! Pure functions only — no storage, no axum. `checkops-server`'s
//! `middleware::jwt` decodes access tokens using [`decode_access_token`] and
//! builds a `CallerContext` from the result; `checkops-postgres` calls
//! [`hash_password`]/[`verify_password`] at the user-store boundary.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::{Digest, Sha256};
use totp_rs::{Secret, TOTP};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::principal::{AccessTokenClaims, ImageUrlClaims, RefreshTokenClaims};

/// Hashes a plaintext password with a fresh random salt (Argon2id, default
/// params). Replaces the source's `passlib`+`bcrypt` scheme; the interface
/// is unchanged, only the algorithm.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hash failed: {e}")))
}

/// Constant-time verification against a stored Argon2 hash. Any parse or
/// hash-mismatch error collapses to `false` — never surfaces whether the
/// hash itself was malformed.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Generates a new base32-encoded TOTP secret for MFA enrollment.
pub fn generate_totp_secret() -> String {
    Secret::generate_secret().to_encoded().to_string()
}

/// Verifies a 6-digit TOTP code against `secret` at `now`, with a ±1 step
/// (±30s) window per RFC 6238.
pub fn verify_totp(secret: &str, code: &str, now: DateTime<Utc>) -> bool {
    let Ok(bytes) = Secret::Encoded(secret.to_string()).to_bytes() else {
        return false;
    };
    let Ok(totp) = TOTP::new(totp_rs::Algorithm::SHA1, 6, 1, 30, bytes) else {
        return false;
    };
    totp.check(code, now.timestamp() as u64)
}

/// 32 random bytes, hex-encoded, for CSRF token pairing.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hex digest of a refresh token, the only form ever persisted in
/// `UserSession.refresh_token_hash`.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct AccessTokenInput {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub role_ids: Vec<Uuid>,
    pub permissions: Vec<String>,
    pub is_superuser: bool,
}

/// HS256-signs an access token good for `ttl`. Mirrors the teacher's
/// `JwtConfig` key-material split: this key is never shared with the
/// image-URL signer.
pub fn issue_access_token(key: &EncodingKey, input: AccessTokenInput, now: DateTime<Utc>, ttl: Duration) -> AppResult<String> {
    let claims = AccessTokenClaims {
        sub: input.user_id,
        tenant_id: input.tenant_id,
        username: input.username,
        roles: input.roles,
        role_ids: input.role_ids,
        permissions: input.permissions,
        is_superuser: input.is_superuser,
        token_type: "access".to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("access token signing failed: {e}")))
}

pub fn issue_refresh_token(key: &EncodingKey, user_id: Uuid, tenant_id: Uuid, session_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> AppResult<String> {
    let claims = RefreshTokenClaims {
        sub: user_id,
        tenant_id,
        session_id,
        token_type: "refresh".to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("refresh token signing failed: {e}")))
}

fn decoding_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.required_spec_claims.clear();
    validation
}

/// Decodes and validates an access token, rejecting anything whose
/// `type` isn't `"access"`. Expiry is strictly enforced (unlike the
/// teacher's dev-relaxed middleware).
pub fn decode_access_token(key: &DecodingKey, token: &str) -> AppResult<AccessTokenClaims> {
    let data = decode::<AccessTokenClaims>(token, key, &decoding_validation()).map_err(classify_jwt_error)?;
    if data.claims.token_type != "access" {
        return Err(AppError::TokenInvalid);
    }
    Ok(data.claims)
}

pub fn decode_refresh_token(key: &DecodingKey, token: &str) -> AppResult<RefreshTokenClaims> {
    let data = decode::<RefreshTokenClaims>(token, key, &decoding_validation()).map_err(classify_jwt_error)?;
    if data.claims.token_type != "refresh" {
        return Err(AppError::TokenInvalid);
    }
    Ok(data.claims)
}

/// Signs a bearer image-access URL token with a key dedicated to image
/// URLs, distinct from the access/refresh signing key.
pub fn sign_image_url_token(key: &EncodingKey, resource: Uuid, user_id: Uuid, tenant_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> AppResult<String> {
    let claims = ImageUrlClaims {
        resource,
        sub: user_id,
        tid: tenant_id,
        jti: Uuid::new_v4().to_string(),
        token_type: "image_url".to_string(),
        exp: (now + ttl).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("image url signing failed: {e}")))
}

/// Verifies an image-URL token, rejecting the legacy `"signed_url"` type
/// alias the source carried — only `"image_url"` is accepted.
pub fn verify_image_url_token(key: &DecodingKey, token: &str) -> AppResult<ImageUrlClaims> {
    let data = decode::<ImageUrlClaims>(token, key, &decoding_validation()).map_err(classify_jwt_error)?;
    if data.claims.token_type != "image_url" {
        return Err(AppError::TokenInvalid);
    }
    Ok(data.claims)
}

fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> AppError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::TokenInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn totp_round_trips_within_skew() {
        let secret = generate_totp_secret();
        let now = Utc::now();
        let bytes = Secret::Encoded(secret.clone()).to_bytes().unwrap();
        let totp = TOTP::new(totp_rs::Algorithm::SHA1, 6, 1, 30, bytes).unwrap();
        let code = totp.generate(now.timestamp() as u64);
        assert!(verify_totp(&secret, &code, now));
        assert!(!verify_totp(&secret, "000000", now) || code == "000000");
    }

    #[test]
    fn access_token_round_trips_and_rejects_wrong_type() {
        let key = EncodingKey::from_secret(b"test-secret-key-at-least-32-bytes!!");
        let dec_key = DecodingKey::from_secret(b"test-secret-key-at-least-32-bytes!!");
        let now = Utc::now();
        let input = AccessTokenInput {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            username: "alice".into(),
            roles: vec!["reviewer".into()],
            role_ids: vec![],
            permissions: vec!["check_item:review".into()],
            is_superuser: false,
        };
        let token = issue_access_token(&key, input, now, Duration::minutes(15)).unwrap();
        let claims = decode_access_token(&dec_key, &token).unwrap();
        assert_eq!(claims.username, "alice");

        let refresh = issue_refresh_token(&key, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), now, Duration::days(7)).unwrap();
        assert!(matches!(decode_access_token(&dec_key, &refresh), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn expired_access_token_reports_expired_not_invalid() {
        let key = EncodingKey::from_secret(b"test-secret-key-at-least-32-bytes!!");
        let dec_key = DecodingKey::from_secret(b"test-secret-key-at-least-32-bytes!!");
        let now = Utc::now();
        let input = AccessTokenInput {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            username: "bob".into(),
            roles: vec![],
            role_ids: vec![],
            permissions: vec![],
            is_superuser: false,
        };
        let token = issue_access_token(&key, input, now - Duration::hours(1), Duration::minutes(15)).unwrap();
        assert!(matches!(decode_access_token(&dec_key, &token), Err(AppError::TokenExpired)));
    }

    #[test]
    fn image_url_token_rejects_legacy_type_alias() {
        let key = EncodingKey::from_secret(b"image-secret-key-at-least-32-bytes!");
        let dec_key = DecodingKey::from_secret(b"image-secret-key-at-least-32-bytes!");
        let now = Utc::now();
        let claims = ImageUrlClaims {
            resource: Uuid::new_v4(),
            sub: Uuid::new_v4(),
            tid: Uuid::new_v4(),
            jti: Uuid::new_v4().to_string(),
            token_type: "signed_url".to_string(),
            exp: (now + Duration::seconds(90)).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &key).unwrap();
        assert!(matches!(verify_image_url_token(&dec_key, &token), Err(AppError::TokenInvalid)));
    }
}
