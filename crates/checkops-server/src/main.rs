//! checkops-server — multi-tenant check-item review/decision/audit REST API.
//!
//! Reads config from env vars (see `config::AppConfig`); the required
//! secrets are `DATABASE_URL`, `SECRET_KEY`, `IMAGE_SIGNING_KEY`,
//! `CSRF_SECRET_KEY`, `NETWORK_PEPPER`.

use std::net::SocketAddr;
use std::sync::Arc;

use checkops_postgres::PgStores;
use checkops_server::config::AppConfig;
use checkops_server::router::build_router;
use checkops_server::state::{AppState, JwtKeys};
use checkops_types::ports::{
    AuditStore, CheckItemStore, DecisionStore, EntitlementStore, FraudStore, ImageStore,
    ImageTokenStore, PolicyStore, QueueStore, SessionStore, UserStore,
};
use checkops_types::service::{CheckOpsService, CheckOpsServiceImpl};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,checkops_server=debug".into()),
        )
        .init();

    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    let dual_control_threshold = config.dual_control_threshold;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("connected to database");

    let stores = PgStores::new(pool, config.image_storage_root.clone());

    // Ports shared between the service and handlers that bypass it get one
    // Arc each, cloned where both need a handle — cloning an `Arc<dyn _>`
    // shares the trait object, it doesn't duplicate the underlying store.
    let check_items: Arc<dyn CheckItemStore> = Arc::new(stores.check_items);
    let decisions: Arc<dyn DecisionStore> = Arc::new(stores.decisions);
    let audit: Arc<dyn AuditStore> = Arc::new(stores.audit);
    let policies: Arc<dyn PolicyStore> = Arc::new(stores.policies);
    let entitlements: Arc<dyn EntitlementStore> = Arc::new(stores.entitlements);
    let images: Arc<dyn ImageStore> = Arc::new(stores.images);
    let image_tokens: Arc<dyn ImageTokenStore> = Arc::new(stores.image_tokens);
    let users: Arc<dyn UserStore> = Arc::new(stores.users);
    let sessions: Arc<dyn SessionStore> = Arc::new(stores.sessions);
    let fraud: Arc<dyn FraudStore> = Arc::new(stores.fraud);
    let queues: Arc<dyn QueueStore> = Arc::new(stores.queues);

    let service: Arc<dyn CheckOpsService> = Arc::new(CheckOpsServiceImpl::new(
        check_items.clone(),
        decisions,
        audit.clone(),
        policies.clone(),
        entitlements.clone(),
        images,
        image_tokens,
        dual_control_threshold,
    ));

    let state = Arc::new(AppState {
        service,
        check_items,
        users,
        sessions,
        policies,
        entitlements,
        fraud,
        queues,
        audit,
        jwt: Arc::new(JwtKeys::from_config(&config)),
        config: Arc::new(config),
    });

    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));
    tracing::info!("checkops-server listening on {bind_addr}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server error");
}
