//! # s3gc-admin
//!
//! Thin axum adapter over the GC runtime: inspect state, trigger runs,
//! restore objects. Every route sits behind bearer-token auth.

mod auth;
mod error;
mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};

use s3gc_engine::GcRuntime;

pub use error::ApiError;

#[derive(Clone)]
pub struct AdminState {
    pub runtime: Arc<GcRuntime>,
    pub api_key: Arc<str>,
}

/// Build the admin router. The API key comes from the config snapshot.
pub fn router(runtime: Arc<GcRuntime>) -> Router {
    let state = AdminState {
        api_key: runtime.config().admin_api_key.as_str().into(),
        runtime,
    };

    Router::new()
        .route("/admin/s3gc/health", get(handlers::health))
        .route("/admin/s3gc/status", get(handlers::status))
        .route("/admin/s3gc/metrics", get(handlers::metrics))
        .route("/admin/s3gc/config", get(handlers::config))
        .route("/admin/s3gc/run", post(handlers::run))
        .route("/admin/s3gc/operations", get(handlers::operations))
        .route("/admin/s3gc/rebuild", post(handlers::rebuild))
        .route(
            "/admin/s3gc/restore/:operation_id",
            post(handlers::restore_operation),
        )
        .route("/admin/s3gc/restore-key", post(handlers::restore_key))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .with_state(state)
}
