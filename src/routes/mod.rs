use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::StoreError;

pub mod health;
pub mod metrics;
pub mod stamps;

/// Build the API router.
pub fn router(state: AppState, prometheus: Arc<PrometheusHandle>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/stamps/{id}", get(stamps::get_stamp))
        .route("/api/v1/stamps/{id}/ocr", post(stamps::enqueue_extraction))
        .route(
            "/api/v1/stamps/{id}/extraction",
            put(stamps::review_extraction),
        )
        .route("/api/v1/jobs/{id}", get(stamps::get_job))
        .with_state(state)
        .route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(prometheus),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Invalid extraction review: {0}")]
    Validation(#[from] garde::Report),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            ApiError::Validation(report) => {
                let fields: Vec<_> = report
                    .iter()
                    .map(|(path, error)| {
                        json!({ "field": path.to_string(), "message": error.message() })
                    })
                    .collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "error": "validation failed", "fields": fields })),
                )
                    .into_response()
            }
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Store error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}
