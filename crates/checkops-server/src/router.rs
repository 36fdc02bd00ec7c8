//! Router construction. Protected routes run the JWT-auth middleware and
//! carry `CallerContext` in request extensions; `/auth/login` and
//! `/healthz` are the only unauthenticated routes, with login additionally
//! rate-limited per-IP.

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{middleware as axum_mw, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::jwt::jwt_auth;
use crate::middleware::rate_limit::{per_ip_limiter, rate_limit};
use crate::middleware::security_headers::SecurityHeadersLayer;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let config = state.config.clone();

    let login_limiter = per_ip_limiter(5);
    let auth_public = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(axum_mw::from_fn_with_state(login_limiter, rate_limit))
        .with_state(state.clone());

    let public = Router::new().route("/healthz", get(handlers::health::healthz)).merge(auth_public);

    let protected = Router::new()
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/change-password", post(handlers::auth::change_password))
        .route("/auth/me", get(handlers::auth::me))
        .route("/checks", get(handlers::checks::list_items))
        .route("/checks/:id", get(handlers::checks::get_item))
        .route("/checks/:id/adjacent", get(handlers::checks::adjacent_items))
        .route("/checks/:id/analyze", post(handlers::checks::analyze_item))
        .route("/checks/:id/assign", post(handlers::checks::assign_item))
        .route("/checks/:id/status", post(handlers::checks::set_status))
        .route("/decisions", post(handlers::decisions::make_decision))
        .route("/decisions/:id/approve-dual-control", post(handlers::decisions::approve_dual_control))
        .route("/decisions/:id/override", post(handlers::decisions::override_decision))
        .route("/images/tokens", post(handlers::images::mint_tokens))
        .route("/audit", get(handlers::audit::list_audit))
        .route("/audit/chain-status", get(handlers::audit::chain_status))
        .route("/audit/checks/:id", get(handlers::audit::item_trail))
        .route("/audit/packet", post(handlers::audit::generate_packet))
        .route("/fraud/events", post(handlers::fraud::report_event))
        .route("/fraud/alerts", get(handlers::fraud::list_alerts))
        .route("/fraud/alerts/:id/dismiss", post(handlers::fraud::dismiss_alert))
        .route("/policies", get(handlers::policies::list_policies).post(handlers::policies::create_policy))
        .route("/policies/:id", get(handlers::policies::get_policy))
        .route("/policies/:id/activate", post(handlers::policies::activate_policy))
        .route("/users/:id", get(handlers::users::get_user))
        .layer(axum_mw::from_fn_with_state(state.clone(), jwt_auth))
        .with_state(state.clone());

    // Image consumption is bearer-token-in-path, not JWT — it belongs
    // with the protected feature set but outside the JWT middleware.
    let image_fetch = Router::new().route("/images/secure/:token", get(handlers::images::consume_token)).with_state(state.clone());

    public
        .merge(protected)
        .merge(image_fetch)
        .layer(cors_layer(&config))
        .layer(SecurityHeadersLayer { hsts: config.environment != "development" })
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = config.cors_origins.clone();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::exact("http://localhost:3000".parse().unwrap())
    } else {
        AllowOrigin::list(origins.into_iter().filter_map(|o| o.parse().ok()))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::HeaderName::from_static("x-csrf-token")])
}
