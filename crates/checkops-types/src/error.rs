use thiserror::Error;

/// Closed error taxonomy shared by every component. Each variant maps to
/// exactly one hierarchical code in the Auth/Authz/Validation/Resource/
/// Business/System categories; the HTTP mapping lives in checkops-server.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Auth (1xxx) ---
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("mfa code required")]
    MfaRequired,
    #[error("mfa code invalid")]
    MfaInvalid,
    #[error("account locked until {unlock_at}")]
    AccountLocked { unlock_at: chrono::DateTime<chrono::Utc> },
    #[error("account inactive")]
    AccountInactive,
    #[error("session expired")]
    SessionExpired,
    #[error("csrf validation failed")]
    CsrfFailed,

    // --- Authz (2xxx) ---
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("insufficient role: {0}")]
    InsufficientRole(String),
    #[error("entitlement denied: {0}")]
    EntitlementDenied(String),
    #[error("dual control required")]
    DualControlRequired,
    #[error("self-approval is not permitted")]
    SelfApprovalDenied,

    // --- Validation (3xxx) ---
    #[error("validation failed on {field}: {message}")]
    ValidationError { field: String, message: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid format for {field}")]
    InvalidFormat { field: String },
    #[error("value out of range for {field}")]
    OutOfRange { field: String },
    #[error("duplicate entry for {field}")]
    DuplicateEntry { field: String },

    // --- Resource (4xxx) ---
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("resource locked: {0}")]
    Locked(String),
    #[error("resource expired: {0}")]
    Expired(String),
    #[error("conflict: {0}")]
    Conflict(String),

    // --- Business (5xxx) ---
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
    #[error("policy violation: {0}")]
    PolicyViolation(String),
    #[error("AI-assisted flags were not acknowledged")]
    AiFlagsNotAcknowledged,
    #[error("workflow error: {0}")]
    WorkflowError(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    // --- System (6xxx) ---
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("external service error: {0}")]
    ExternalService(String),
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Hierarchical error code per the closed taxonomy (e.g. "AUTH_1001").
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "AUTH_1001",
            Self::TokenExpired => "AUTH_1002",
            Self::TokenInvalid => "AUTH_1003",
            Self::MfaRequired => "AUTH_1004",
            Self::MfaInvalid => "AUTH_1005",
            Self::AccountLocked { .. } => "AUTH_1006",
            Self::AccountInactive => "AUTH_1007",
            Self::SessionExpired => "AUTH_1008",
            Self::CsrfFailed => "AUTH_1009",

            Self::PermissionDenied(_) => "AUTHZ_2001",
            Self::InsufficientRole(_) => "AUTHZ_2002",
            Self::EntitlementDenied(_) => "AUTHZ_2003",
            Self::DualControlRequired => "AUTHZ_2004",
            Self::SelfApprovalDenied => "AUTHZ_2005",

            Self::ValidationError { .. } => "VALIDATION_3001",
            Self::InvalidInput(_) => "VALIDATION_3002",
            Self::MissingField(_) => "VALIDATION_3003",
            Self::InvalidFormat { .. } => "VALIDATION_3004",
            Self::OutOfRange { .. } => "VALIDATION_3005",
            Self::DuplicateEntry { .. } => "VALIDATION_3006",

            Self::NotFound(_) => "RESOURCE_4001",
            Self::AlreadyExists(_) => "RESOURCE_4002",
            Self::Locked(_) => "RESOURCE_4003",
            Self::Expired(_) => "RESOURCE_4004",
            Self::Conflict(_) => "RESOURCE_4005",

            Self::InvalidStateTransition { .. } => "BUSINESS_5001",
            Self::PolicyViolation(_) => "BUSINESS_5002",
            Self::AiFlagsNotAcknowledged => "BUSINESS_5003",
            Self::WorkflowError(_) => "BUSINESS_5004",
            Self::LimitExceeded(_) => "BUSINESS_5005",

            Self::Internal(_) => "SYSTEM_6001",
            Self::Database(_) => "SYSTEM_6002",
            Self::ExternalService(_) => "SYSTEM_6003",
            Self::RateLimitExceeded { .. } => "SYSTEM_6004",
            Self::ServiceUnavailable(_) => "SYSTEM_6005",
        }
    }

    /// Whether this error represents a tenant-boundary or existence probe
    /// that should be disclosed to the caller as 404 rather than its
    /// "natural" status, so cross-tenant access cannot be confirmed.
    pub fn is_resource_absence(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
