//! Maps `checkops_types::AppError` to HTTP status codes and the
//! `{error, code, message, timestamp}` JSON body every endpoint returns on
//! failure. `NotFound` covers both genuine absence and cross-tenant access
//! (`TenantContext::check` converts the latter to `NotFound` before this
//! layer ever sees it) — `is_resource_absence` exists on the domain error
//! but every variant this layer maps to 404 already IS `NotFound`, so no
//! extra disclosure decision is needed here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;

use checkops_types::error::AppError as DomainError;

pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

fn status_for(err: &DomainError) -> StatusCode {
    use DomainError::*;
    match err {
        InvalidCredentials | TokenExpired | TokenInvalid | MfaRequired | MfaInvalid | AccountLocked { .. } | AccountInactive | SessionExpired | CsrfFailed => StatusCode::UNAUTHORIZED,

        PermissionDenied(_) | InsufficientRole(_) | EntitlementDenied(_) | DualControlRequired | SelfApprovalDenied => StatusCode::FORBIDDEN,

        ValidationError { .. } | InvalidInput(_) | MissingField(_) | InvalidFormat { .. } | OutOfRange { .. } => StatusCode::BAD_REQUEST,
        DuplicateEntry { .. } => StatusCode::CONFLICT,

        NotFound(_) => StatusCode::NOT_FOUND,
        AlreadyExists(_) => StatusCode::CONFLICT,
        Locked(_) => StatusCode::LOCKED,
        Expired(_) => StatusCode::GONE,
        Conflict(_) => StatusCode::CONFLICT,

        InvalidStateTransition { .. } | PolicyViolation(_) | AiFlagsNotAcknowledged | WorkflowError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,

        Internal(_) | Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ExternalService(_) => StatusCode::BAD_GATEWAY,
        RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, code = self.0.code(), "internal error");
        }
        let body = json!({
            "error": status.canonical_reason().unwrap_or("error"),
            "code": self.0.code(),
            "message": self.0.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_auth_and_authz_variants() {
        assert_eq!(status_for(&DomainError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&DomainError::CsrfFailed), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&DomainError::PermissionDenied("check_item:review".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&DomainError::DualControlRequired), StatusCode::FORBIDDEN);
    }

    #[test]
    fn maps_resource_and_business_variants() {
        assert_eq!(status_for(&DomainError::NotFound("check_item".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&DomainError::Locked("check_item".into())), StatusCode::LOCKED);
        assert_eq!(status_for(&DomainError::Expired("image_token".into())), StatusCode::GONE);
        assert_eq!(status_for(&DomainError::AiFlagsNotAcknowledged), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(&DomainError::RateLimitExceeded { retry_after_secs: 60 }), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn body_carries_code_and_message() {
        let resp = ApiError(DomainError::NotFound("check_item".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
