use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use checkops_types::check_item::CheckImage;
use checkops_types::error::AppError;
use checkops_types::ports::{ImageStore, Result};

/// Filesystem-backed `ImageStore`: `storage_path` on a `CheckImage` is
/// resolved relative to `root`. Tenant isolation is enforced by checking
/// the image's `tenant_id` against the caller-supplied one before any
/// disk access — the same check `TenantContext::check` makes elsewhere,
/// repeated here because this adapter sits below the tenant-context layer.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, storage_path: &str) -> Result<PathBuf> {
        let candidate = self.root.join(storage_path);
        if !candidate.starts_with(&self.root) {
            return Err(AppError::InvalidInput("storage_path escapes storage root".into()));
        }
        Ok(candidate)
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn fetch_bytes(&self, tenant_id: Uuid, image: &CheckImage) -> Result<Vec<u8>> {
        if image.tenant_id != tenant_id {
            return Err(AppError::NotFound("image".into()));
        }
        let path = self.resolve(&image.storage_path)?;
        tokio::fs::read(&path).await.map_err(|e| AppError::ExternalService(format!("image store read failed: {e}")))
    }
}
