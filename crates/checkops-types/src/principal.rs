use std::collections::HashSet;

use uuid::Uuid;

use crate::error::AppError;

/// The authenticated caller, resolved once by the JWT middleware and
/// threaded explicitly through every service call from that point on.
/// No implicit or thread-local identity exists anywhere in this codebase.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub role_ids: Vec<Uuid>,
    pub permissions: HashSet<String>,
    pub is_superuser: bool,
}

impl CallerContext {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// A permission is `resource:action`. Superusers hold every permission.
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        if self.is_superuser {
            return true;
        }
        self.permissions.contains(&format!("{resource}:{action}"))
    }

    pub fn require_permission(&self, resource: &str, action: &str) -> Result<(), AppError> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!("{resource}:{action}")))
        }
    }

    /// Explicit constructor for in-process / test callers. Production
    /// code builds this only from validated JWT claims (see
    /// checkops-server::middleware::jwt).
    pub fn in_process(user_id: Uuid, tenant_id: Uuid, username: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            user_id,
            tenant_id,
            username: username.into(),
            roles,
            role_ids: Vec::new(),
            permissions: HashSet::new(),
            is_superuser: false,
        }
    }
}

/// Claims carried by an access token. Deserialized by the JWT middleware;
/// domain/service code never reads raw tokens, only a `CallerContext`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
    pub permissions: Vec<String>,
    pub is_superuser: bool,
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

/// Claims for the dedicated image bearer URL, signed with a separate key
/// from access/refresh tokens. `sub` is carried for audit only — it is
/// never used for access control (anyone holding the URL can fetch the
/// image until it expires).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ImageUrlClaims {
    pub resource: Uuid,
    pub sub: Uuid,
    pub tid: Uuid,
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: i64,
}
