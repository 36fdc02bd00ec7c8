use uuid::Uuid;

use crate::error::AppError;

/// Carries the current tenant through every operation. Never derived from
/// a thread-local or ambient global — callers construct one explicitly
/// from the authenticated caller's claims and pass it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid) -> Self {
        Self { tenant_id }
    }

    /// Compares a row's tenant against this context. A mismatch MUST be
    /// treated as "not found", never surfaced as a distinct error, so a
    /// cross-tenant probe cannot be distinguished from a typo'd id.
    pub fn check(&self, row_tenant_id: Uuid) -> Result<(), TenantIsolationError> {
        if row_tenant_id == self.tenant_id {
            Ok(())
        } else {
            Err(TenantIsolationError {
                expected: self.tenant_id,
                found: row_tenant_id,
            })
        }
    }
}

/// Raised when a query result or direct lookup returns a row belonging to
/// a different tenant than the caller's context. This is a security
/// incident, not an ordinary bug: it is logged to the `security` tracing
/// target and always collapses to a 404 at the HTTP boundary regardless
/// of environment.
#[derive(Debug, thiserror::Error)]
#[error("tenant isolation violation: expected {expected}, found {found}")]
pub struct TenantIsolationError {
    pub expected: Uuid,
    pub found: Uuid,
}

impl From<TenantIsolationError> for AppError {
    fn from(e: TenantIsolationError) -> Self {
        tracing::error!(target: "security", expected = %e.expected, found = %e.found, "tenant isolation violation");
        AppError::NotFound("resource".into())
    }
}

/// Structural marker trait for stores that must be tenant-scoped. Having
/// port traits extend this (rather than relying on naming convention)
/// means every adapter method signature carries a `&TenantContext`
/// parameter the compiler can check is actually present.
pub trait TenantScoped {
    fn tenant_context(&self) -> &TenantContext;
}
