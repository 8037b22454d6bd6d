//! Axum router wiring.
//!
//! `POST /:service/:method` carries every RPC; the remaining routes are the
//! operational endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .route("/:service/:method", post(transport::http::call))
        .with_state(state)
}
