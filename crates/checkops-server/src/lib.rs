//! checkops-server — REST API for multi-tenant check-item review.
//!
//! JWT-authenticated endpoints under `/api/v1`, backed by
//! `checkops_types::CheckOpsService` plus the storage ports that service
//! doesn't route directly (auth, sessions, policy/user/fraud/queue admin).
//! See `router::build_router` for the full route table.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
