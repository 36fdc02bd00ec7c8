//! Shared application state. The teacher's handlers took a single
//! `Extension<Arc<dyn CoreService>>` because one trait covered the whole
//! API; here `CheckOpsService` only routes the check/decision/image
//! surface, so auth, policy, user, fraud, and queue handlers need their
//! own port handles alongside it. Bundling them in one `AppState` behind
//! `axum::extract::State` keeps each handler's signature to one extractor
//! instead of half a dozen `Extension<Arc<dyn _>>` parameters.

use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey};

use checkops_types::ports::{AuditStore, CheckItemStore, EntitlementStore, FraudStore, PolicyStore, QueueStore, SessionStore, UserStore};
use checkops_types::service::CheckOpsService;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn CheckOpsService>,
    pub check_items: Arc<dyn CheckItemStore>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub policies: Arc<dyn PolicyStore>,
    pub entitlements: Arc<dyn EntitlementStore>,
    pub fraud: Arc<dyn FraudStore>,
    pub queues: Arc<dyn QueueStore>,
    pub audit: Arc<dyn AuditStore>,
    pub jwt: Arc<JwtKeys>,
    pub config: Arc<AppConfig>,
}

/// Access/refresh and image-URL signing keys, split exactly as
/// `checkops_types::auth` expects — a leaked image-URL key can't be used
/// to forge an access token and vice versa.
pub struct JwtKeys {
    pub access_encoding: EncodingKey,
    pub access_decoding: DecodingKey,
    pub image_encoding: EncodingKey,
    pub image_decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.secret_key.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.secret_key.as_bytes()),
            image_encoding: EncodingKey::from_secret(config.image_signing_key.as_bytes()),
            image_decoding: DecodingKey::from_secret(config.image_signing_key.as_bytes()),
        }
    }
}
