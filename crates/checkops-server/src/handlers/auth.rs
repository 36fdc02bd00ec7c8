//! Login, refresh, logout, change-password, and the authenticated-caller
//! identity endpoint. `UserStore`/`SessionStore` sit outside
//! `CheckOpsService` (§6's auth surface doesn't route through the
//! check-review service), so these handlers hold their own port handles
//! via `AppState` rather than `Extension<Arc<dyn CheckOpsService>>`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::{Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkops_types::audit::{build_audit_entry, AuditAction, AuditEntryInput, GENESIS_HASH};
use checkops_types::auth::{
    hash_refresh_token, issue_access_token, issue_refresh_token, verify_password, verify_totp, AccessTokenInput,
};
use checkops_types::error::AppError as DomainError;
use checkops_types::principal::CallerContext;
use checkops_types::user::{User, UserSession, MAX_FAILED_LOGIN_ATTEMPTS};

use crate::error::ApiError;
use crate::state::AppState;

/// Resolves the caller's real address, honoring `X-Forwarded-For` only
/// when the connecting peer is itself a configured trusted proxy —
/// otherwise the header is attacker-controlled and the socket address is
/// the only address worth trusting.
fn client_ip(state: &AppState, addr: SocketAddr, headers: &axum::http::HeaderMap) -> IpAddr {
    let peer = addr.ip();
    let peer_is_trusted = state.config.trusted_proxy_ips.iter().any(|trusted| trusted.parse::<IpAddr>().map(|ip| ip == peer).unwrap_or(false));
    if !peer_is_trusted {
        return peer;
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .unwrap_or(peer)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub tenant_id: Uuid,
    pub username: String,
    pub password: String,
    pub mfa_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

async fn append_audit(state: &AppState, tenant_id: Option<Uuid>, action: AuditAction, user_id: Option<Uuid>, resource_id: Option<String>, description: Option<String>) {
    let previous_hash = state.audit.latest_hash(tenant_id).await.ok().flatten().unwrap_or_else(|| GENESIS_HASH.to_string());
    let record = build_audit_entry(action, "user", previous_hash, Utc::now(), AuditEntryInput { tenant_id, user_id, resource_id, description, ..Default::default() });
    let _ = state.audit.append(record).await;
}

async fn permissions_for(state: &AppState, user: &User) -> Vec<String> {
    state.users.permissions_for_roles(&user.role_ids).await.unwrap_or_default()
}

async fn role_names_for(state: &AppState, user: &User) -> Vec<String> {
    state.users.roles_for_user(user.id).await.unwrap_or_default().into_iter().map(|r| r.name).collect()
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let now = Utc::now();
    let ip = client_ip(&state, addr, &headers);
    let user = state
        .users
        .find_by_username_or_email(body.tenant_id, &body.username)
        .await?
        .ok_or(DomainError::InvalidCredentials)?;

    if user.is_locked(now) {
        return Err(DomainError::AccountLocked { unlock_at: user.locked_until.unwrap() }.into());
    }
    if !user.is_active {
        return Err(DomainError::AccountInactive.into());
    }

    if !user.ip_allowed(ip) {
        append_audit(&state, Some(user.tenant_id), AuditAction::AuthIpDenied, Some(user.id), Some(user.id.to_string()), Some(ip.to_string())).await;
        return Err(DomainError::PermissionDenied("ip_not_allowed".into()).into());
    }

    if !verify_password(&body.password, &user.password_hash) {
        let attempts = user.failed_login_attempts + 1;
        let locked_until = if attempts >= MAX_FAILED_LOGIN_ATTEMPTS { Some(now + Duration::minutes(checkops_types::user::LOCKOUT_DURATION_MINUTES)) } else { None };
        state.users.record_login_failure(user.id, locked_until).await?;
        append_audit(&state, Some(user.tenant_id), AuditAction::LoginFailed, Some(user.id), Some(user.id.to_string()), None).await;
        return Err(DomainError::InvalidCredentials.into());
    }

    if user.mfa_enabled {
        let code = body.mfa_code.as_deref().ok_or(DomainError::MfaRequired)?;
        let secret = user.mfa_secret.as_deref().ok_or(DomainError::MfaRequired)?;
        if !verify_totp(secret, code, now) {
            return Err(DomainError::MfaInvalid.into());
        }
    }

    state.users.record_login_success(user.id, now).await?;
    append_audit(&state, Some(user.tenant_id), AuditAction::Login, Some(user.id), Some(user.id.to_string()), None).await;

    let roles = role_names_for(&state, &user).await;
    let permissions = permissions_for(&state, &user).await;

    let user_agent = headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(|s| s.to_string());

    let access_ttl = Duration::minutes(state.config.access_token_expire_minutes);
    let access_token = issue_access_token(
        &state.jwt.access_encoding,
        AccessTokenInput { user_id: user.id, tenant_id: user.tenant_id, username: user.username.clone(), roles, role_ids: user.role_ids.clone(), permissions, is_superuser: user.is_superuser },
        now,
        access_ttl,
    )?;

    let refresh_ttl = Duration::days(state.config.refresh_token_expire_days);
    let session_id = Uuid::new_v4();
    let refresh_token = issue_refresh_token(&state.jwt.access_encoding, user.id, user.tenant_id, session_id, now, refresh_ttl)?;
    let refresh_hash = hash_refresh_token(&refresh_token);

    state
        .sessions
        .create(UserSession {
            id: session_id,
            tenant_id: user.tenant_id,
            user_id: user.id,
            refresh_token_hash: refresh_hash,
            device_fingerprint: None,
            ip_address: Some(ip.to_string()),
            user_agent: user_agent.clone(),
            created_at: now,
            expires_at: now + refresh_ttl,
            is_active: true,
            revoked_at: None,
        })
        .await?;

    let csrf_token = checkops_types::auth::generate_csrf_token();

    let refresh_cookie = build_cookie(&state, "refresh_token", refresh_token, refresh_ttl, true);
    let csrf_cookie = build_cookie(&state, "csrf_token", csrf_token, refresh_ttl, false);
    let jar = jar.add(refresh_cookie).add(csrf_cookie);

    Ok((jar, Json(LoginResponse { access_token, token_type: "Bearer", expires_in: access_ttl.num_seconds() })))
}

fn build_cookie<'a>(state: &AppState, name: &'a str, value: String, ttl: Duration, http_only: bool) -> Cookie<'a> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(http_only);
    cookie.set_secure(state.config.cookie_secure);
    cookie.set_same_site(match state.config.cookie_samesite.as_str() {
        "Strict" => SameSite::Strict,
        "None" => SameSite::None,
        _ => SameSite::Lax,
    });
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(ttl.num_seconds()));
    if let Some(domain) = state.config.cookie_domain.clone() {
        cookie.set_domain(domain);
    }
    cookie
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
) -> Result<(CookieJar, Json<RefreshResponse>), ApiError> {
    let refresh_token = jar.get("refresh_token").map(|c| c.value().to_string()).ok_or(DomainError::SessionExpired)?;
    let csrf_cookie = jar.get("csrf_token").map(|c| c.value().to_string()).ok_or(DomainError::CsrfFailed)?;
    let csrf_header = headers.get("x-csrf-token").and_then(|v| v.to_str().ok()).ok_or(DomainError::CsrfFailed)?;
    if !constant_time_eq(csrf_cookie.as_bytes(), csrf_header.as_bytes()) {
        return Err(DomainError::CsrfFailed.into());
    }

    let claims = checkops_types::auth::decode_refresh_token(&state.jwt.access_decoding, &refresh_token)?;
    let hash = hash_refresh_token(&refresh_token);
    let session = state.sessions.find_by_refresh_hash(&hash).await?.ok_or(DomainError::SessionExpired)?;
    let now = Utc::now();
    if !session.is_usable(now) || session.id != claims.session_id {
        return Err(DomainError::SessionExpired.into());
    }

    let user = state.users.get_by_id(claims.tenant_id, claims.sub).await?.ok_or(DomainError::InvalidCredentials)?;
    if !user.is_active || user.is_locked(now) {
        return Err(DomainError::AccountInactive.into());
    }

    let ip = client_ip(&state, addr, &headers);
    if !user.ip_allowed(ip) {
        append_audit(&state, Some(user.tenant_id), AuditAction::AuthIpDenied, Some(user.id), Some(user.id.to_string()), Some(ip.to_string())).await;
        return Err(DomainError::PermissionDenied("ip_not_allowed".into()).into());
    }

    // Rotation per §4.2: the presented refresh token is single-use — the
    // session it names is revoked here regardless of what follows, so a
    // stolen-and-replayed token can mint at most one further pair.
    state.sessions.revoke(session.id, now).await?;

    let roles = role_names_for(&state, &user).await;
    let permissions = permissions_for(&state, &user).await;
    let access_ttl = Duration::minutes(state.config.access_token_expire_minutes);
    let access_token = issue_access_token(
        &state.jwt.access_encoding,
        AccessTokenInput { user_id: user.id, tenant_id: user.tenant_id, username: user.username.clone(), roles, role_ids: user.role_ids.clone(), permissions, is_superuser: user.is_superuser },
        now,
        access_ttl,
    )?;

    let user_agent = headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let refresh_ttl = Duration::days(state.config.refresh_token_expire_days);
    let new_session_id = Uuid::new_v4();
    let new_refresh_token = issue_refresh_token(&state.jwt.access_encoding, user.id, user.tenant_id, new_session_id, now, refresh_ttl)?;
    let new_refresh_hash = hash_refresh_token(&new_refresh_token);

    state
        .sessions
        .create(UserSession {
            id: new_session_id,
            tenant_id: user.tenant_id,
            user_id: user.id,
            refresh_token_hash: new_refresh_hash,
            device_fingerprint: session.device_fingerprint.clone(),
            ip_address: Some(ip.to_string()),
            user_agent,
            created_at: now,
            expires_at: now + refresh_ttl,
            is_active: true,
            revoked_at: None,
        })
        .await?;

    let new_csrf_token = checkops_types::auth::generate_csrf_token();
    let refresh_cookie = build_cookie(&state, "refresh_token", new_refresh_token, refresh_ttl, true);
    let csrf_cookie_out = build_cookie(&state, "csrf_token", new_csrf_token, refresh_ttl, false);
    let jar = jar.add(refresh_cookie).add(csrf_cookie_out);

    append_audit(&state, Some(user.tenant_id), AuditAction::TokenRefreshed, Some(user.id), Some(user.id.to_string()), None).await;

    Ok((jar, Json(RefreshResponse { access_token, token_type: "Bearer", expires_in: access_ttl.num_seconds() })))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn logout(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, jar: CookieJar) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    let now = Utc::now();
    state.sessions.revoke_all_for_user(caller.user_id, now).await?;
    append_audit(&state, Some(caller.tenant_id), AuditAction::Logout, Some(caller.user_id), Some(caller.user_id.to_string()), None).await;

    let jar = jar.remove(Cookie::from("refresh_token")).remove(Cookie::from("csrf_token"));
    Ok((jar, Json(serde_json::json!({"status": "logged_out"}))))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Json(body): Json<ChangePasswordRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.users.get_by_id(caller.tenant_id, caller.user_id).await?.ok_or(DomainError::NotFound("user".into()))?;
    if !verify_password(&body.current_password, &user.password_hash) {
        return Err(DomainError::InvalidCredentials.into());
    }
    let new_hash = checkops_types::auth::hash_password(&body.new_password)?;
    state.users.set_password_hash(user.id, &new_hash).await?;
    state.sessions.revoke_all_for_user(user.id, Utc::now()).await?;
    append_audit(&state, Some(caller.tenant_id), AuditAction::PasswordChange, Some(caller.user_id), Some(caller.user_id.to_string()), None).await;
    Ok(Json(serde_json::json!({"status": "password_changed"})))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub is_superuser: bool,
}

pub async fn me(Extension(caller): Extension<CallerContext>) -> Json<MeResponse> {
    Json(MeResponse { user_id: caller.user_id, tenant_id: caller.tenant_id, username: caller.username, roles: caller.roles, is_superuser: caller.is_superuser })
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;

    #[test]
    fn constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"csrf-token-value", b"csrf-token-value"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_content() {
        assert!(!constant_time_eq(b"csrf-token-value", b"csrf-token-other"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_length() {
        assert!(!constant_time_eq(b"short", b"much-longer-value"));
    }
}
