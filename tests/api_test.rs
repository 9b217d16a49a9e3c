//! HTTP surface driven in-process against the in-memory store.

mod helpers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use helpers::*;
use stamp_ocr::app_state::AppState;
use stamp_ocr::db::memory::MemoryStore;
use stamp_ocr::db::{JobStore, StampStore};
use stamp_ocr::models::extraction::{StampColor, Theme};
use stamp_ocr::models::job::JobStatus;
use stamp_ocr::routes;

fn app(store: &MemoryStore) -> Router {
    let store = Arc::new(store.clone());
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    routes::router(AppState::new(store.clone(), store), Arc::new(prometheus))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_reports_queue_depth() {
    let store = MemoryStore::new();
    let stamp = seed_stamp(&store, "/uploads/a.png").await;
    store.insert(stamp.id).await.unwrap();

    let (status, body) = send(app(&store), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["queue"]["pending_jobs"], 1);
}

#[tokio::test]
async fn test_enqueue_then_poll_job() {
    let store = MemoryStore::new();
    let stamp = seed_stamp(&store, "/uploads/a.png").await;

    let uri = format!("/api/v1/stamps/{}/ocr", stamp.id);
    let (status, body) = send(app(&store), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");

    let job_id: Uuid = body["job_id"].as_str().unwrap().parse().unwrap();
    let (status, body) = send(app(&store), "GET", &format!("/api/v1/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stamp_id"], stamp.id.to_string());
    assert_eq!(body["status"], "pending");
    assert!(body["completed_at"].is_null());

    let job = store.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_enqueue_unknown_stamp_is_404() {
    let store = MemoryStore::new();
    let uri = format!("/api/v1/stamps/{}/ocr", Uuid::new_v4());
    let (status, _) = send(app(&store), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_job_and_stamp_are_404() {
    let store = MemoryStore::new();
    let (status, _) = send(app(&store), "GET", &format!("/api/v1/jobs/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        send(app(&store), "GET", &format!("/api/v1/stamps/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_stores_trusted_fields() {
    let store = MemoryStore::new();
    let stamp = seed_stamp(&store, "/uploads/a.png").await;

    let uri = format!("/api/v1/stamps/{}/extraction", stamp.id);
    let review = json!({
        "scott_number": " c76 ",
        "face_value": "forever",
        "theme": "SPACE",
        "dominant_colors": ["BLUE", "GOLD"]
    });
    let (status, body) = send(app(&store), "PUT", &uri, Some(review)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scott_number"], "C76");
    assert_eq!(body["face_value"], "78c");

    let stamp = store.find_by_id(stamp.id).await.unwrap().unwrap();
    assert_eq!(stamp.theme, Some(Theme::Space));
    assert_eq!(stamp.theme_confidence, 1.0);
    assert_eq!(stamp.dominant_colors, vec![StampColor::Blue, StampColor::Gold]);
    assert!(!stamp.needs_review);
}

#[tokio::test]
async fn test_invalid_review_is_rejected_and_not_stored() {
    let store = MemoryStore::new();
    let stamp = seed_stamp(&store, "/uploads/a.png").await;

    let uri = format!("/api/v1/stamps/{}/extraction", stamp.id);
    let review = json!({
        "scott_number": "not a catalog number!",
        "dominant_colors": ["RED", "RED"]
    });
    let (status, body) = send(app(&store), "PUT", &uri, Some(review)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"].as_array().unwrap().len() >= 2);

    let stamp = store.find_by_id(stamp.id).await.unwrap().unwrap();
    assert!(stamp.scott_number.is_none());
    assert!(stamp.needs_review);
    assert_eq!(store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let store = MemoryStore::new();
    let response = app(&store)
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
