//! Recovery HTTP Routes
//!
//! - `POST /v1/cloud_storage/automated_recovery` starts a recovery
//! - `GET /v1/cloud_storage/automated_recovery` reports its progress
//! - `GET /health` liveness

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::debug;

use crate::recovery::TopicRecoveryService;

pub const AUTOMATED_RECOVERY_PATH: &str = "/v1/cloud_storage/automated_recovery";

#[derive(Debug, Serialize)]
pub struct InitRecoveryResponse {
    pub status_code: u16,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub fn recovery_routes(service: TopicRecoveryService) -> Router {
    Router::new()
        .route(
            AUTOMATED_RECOVERY_PATH,
            get(recovery_status_handler).post(start_recovery_handler),
        )
        .with_state(service)
}

pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

async fn start_recovery_handler(
    State(service): State<TopicRecoveryService>,
    body: Bytes,
) -> impl IntoResponse {
    debug!(body_len = body.len(), "automated recovery requested");
    let result = service.start_recovery(&body);

    let code = result.status_code.http_status();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(InitRecoveryResponse {
            status_code: code,
            message: result.message,
        }),
    )
}

async fn recovery_status_handler(
    State(service): State<TopicRecoveryService>,
) -> impl IntoResponse {
    (StatusCode::OK, Json(service.current_status().await))
}

async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
