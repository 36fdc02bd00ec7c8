//! PostgreSQL adapter for checkops-types's storage ports. Every adapter is
//! a thin newtype over `PgPool`; row shapes and enum-as-text conversions
//! live in `rowmap`, kept separate so no other module needs to think about
//! column layout.

pub mod audit_store;
pub mod check_item_store;
pub mod decision_store;
pub mod entitlement_store;
pub mod fraud_store;
pub mod image_fs_store;
pub mod image_token_store;
pub mod policy_store;
pub mod queue_store;
pub mod rowmap;
pub mod session_store;
pub mod user_store;

pub use audit_store::PgAuditStore;
pub use check_item_store::PgCheckItemStore;
pub use decision_store::PgDecisionStore;
pub use entitlement_store::PgEntitlementStore;
pub use fraud_store::PgFraudStore;
pub use image_fs_store::FsImageStore;
pub use image_token_store::PgImageTokenStore;
pub use policy_store::PgPolicyStore;
pub use queue_store::PgQueueStore;
pub use session_store::PgSessionStore;
pub use user_store::PgUserStore;

use std::path::PathBuf;

use sqlx::PgPool;

/// One Postgres-backed implementation per storage port, all sharing a
/// single connection pool, plus the filesystem-backed `ImageStore`.
pub struct PgStores {
    pub users: PgUserStore,
    pub sessions: PgSessionStore,
    pub image_tokens: PgImageTokenStore,
    pub policies: PgPolicyStore,
    pub entitlements: PgEntitlementStore,
    pub check_items: PgCheckItemStore,
    pub decisions: PgDecisionStore,
    pub audit: PgAuditStore,
    pub fraud: PgFraudStore,
    pub queues: PgQueueStore,
    pub images: FsImageStore,
}

impl PgStores {
    pub fn new(pool: PgPool, image_root: impl Into<PathBuf>) -> Self {
        Self {
            users: PgUserStore::new(pool.clone()),
            sessions: PgSessionStore::new(pool.clone()),
            image_tokens: PgImageTokenStore::new(pool.clone()),
            policies: PgPolicyStore::new(pool.clone()),
            entitlements: PgEntitlementStore::new(pool.clone()),
            check_items: PgCheckItemStore::new(pool.clone()),
            decisions: PgDecisionStore::new(pool.clone()),
            audit: PgAuditStore::new(pool.clone()),
            fraud: PgFraudStore::new(pool.clone()),
            queues: PgQueueStore::new(pool),
            images: FsImageStore::new(image_root),
        }
    }
}
