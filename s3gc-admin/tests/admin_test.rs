//! Admin surface tests: auth gate, JSON bodies, status codes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use s3gc_core::config::GcConfig;
use s3gc_core::models::{GcMode, WatchedColumn, WatchedSet};
use s3gc_engine::GcRuntime;
use s3gc_store::{MemoryObjectStore, MemoryVerifier};

async fn test_app() -> (tempfile::TempDir, axum::Router, Arc<MemoryObjectStore>) {
    let dir = tempfile::tempdir().unwrap();
    let config = GcConfig {
        bucket: "media".into(),
        region: "us-east-1".into(),
        mode: GcMode::DryRun,
        tables: WatchedSet::new(vec![WatchedColumn::new("users", "avatar_url")]),
        retention_days: 7,
        exclude_prefixes: vec![],
        vault_path: dir.path().join("vault"),
        cdc_backend: None,
        cdc_connection_url: Some("postgres://user:pw@localhost/app".into()),
        schedule: None,
        admin_api_key: "test-key".into(),
    };
    let store = Arc::new(MemoryObjectStore::new());
    let verifier = Arc::new(MemoryVerifier::new());
    let runtime = GcRuntime::initialize(config, store.clone(), verifier, None)
        .await
        .unwrap();
    (dir, s3gc_admin::router(runtime), store)
}

fn authed(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", "Bearer test-key")
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_or_wrong_token_is_401() {
    let (_dir, app, _) = test_app().await;

    let bare = Request::builder()
        .uri("/admin/s3gc/health")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app.clone().oneshot(bare).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );

    let wrong = Request::builder()
        .uri("/admin/s3gc/status")
        .header("Authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app.oneshot(wrong).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn health_and_status_respond() {
    let (_dir, app, _) = test_app().await;

    let response = app
        .clone()
        .oneshot(authed("GET", "/admin/s3gc/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["vault_accessible"], true);
    assert_eq!(body["cdc_connected"], false);

    let response = app
        .oneshot(authed("GET", "/admin/s3gc/status"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total_runs"], 0);
    assert_eq!(body["mode"], "dry_run");
}

#[tokio::test]
async fn config_is_redacted() {
    let (_dir, app, _) = test_app().await;
    let response = app
        .oneshot(authed("GET", "/admin/s3gc/config"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["bucket"], "media");
    assert_eq!(body["cdc_connection_url"], "***");
    assert_eq!(body["admin_api_key"], "***");
}

#[tokio::test]
async fn run_returns_a_cycle_report() {
    let (_dir, app, store) = test_app().await;
    store.put_with_mtime(
        "orphan.bin",
        b"x".to_vec(),
        chrono_days_ago(30),
    );

    let response = app
        .clone()
        .oneshot(authed("POST", "/admin/s3gc/run"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["counters"]["verified_orphans"], 1);
    assert_eq!(body["mode"], "dry_run");

    // The run shows up in the operations listing.
    let response = app
        .oneshot(authed("GET", "/admin/s3gc/operations?limit=10"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn unknown_restore_targets_are_404() {
    let (_dir, app, _) = test_app().await;

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/admin/s3gc/restore/01ARZ3NDEKTSV4RRFFQ69G5FAV",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["kind"], "RestoreError");

    let response = app
        .oneshot(authed(
            "POST",
            "/admin/s3gc/restore-key?s3_key=never-seen&dry_run=false",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rebuild_reports_keys_written() {
    let (_dir, app, _) = test_app().await;
    let response = app
        .oneshot(authed("POST", "/admin/s3gc/rebuild"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["keys_written"], 0);
}

fn chrono_days_ago(days: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now() - chrono::Duration::days(days)
}
