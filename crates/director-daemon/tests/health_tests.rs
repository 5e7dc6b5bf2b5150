//! Health and work-item lifecycle tests for the daemon, mirroring the
//! integration-test style used against `build_app` directly via `tower`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use director_capability::LeaseRegistry;
use director_core::{RiskTier, WorkItem, WorkItemStatus};
use director_daemon::{build_app, AppState};
use director_eventlog::{EventLog, MemoryEventLog};
use director_policy::{default_profiles, VerifierAllowlist, VerifierAllowlistEntry};
use director_projection::Projector;
use director_runtime::Director;
use director_sandbox::MockSandbox;
use director_verifier::{MemoryAttestationStore, VerifierRunner};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn allowlist() -> VerifierAllowlist {
    VerifierAllowlist::new(vec![VerifierAllowlistEntry {
        id: "v1".into(),
        verifier_type: "lint".into(),
        command_template: "echo ok".into(),
        required_capabilities: vec!["exec".into()],
        declared_independent: false,
        priority: 1,
        path_globs: vec!["**".into()],
    }])
}

fn test_state() -> Arc<AppState> {
    let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
    let projector = Arc::new(Projector::new(log.clone()));
    let leases = Arc::new(LeaseRegistry::new());
    let sandbox: Arc<dyn director_sandbox::Sandbox> = Arc::new(MockSandbox::new());
    let artifacts: Arc<dyn director_artifact::ArtifactStore> = Arc::new(director_artifact::MemoryArtifactStore::new());
    let verifier = VerifierRunner::new(sandbox.clone(), artifacts, Arc::new(MemoryAttestationStore::default()));

    let director = Arc::new(Director::new(
        log.clone(),
        projector.clone(),
        leases,
        default_profiles(),
        allowlist(),
        "v1",
        sandbox.clone(),
        verifier,
    ));

    Arc::new(AppState { director, log, projector, sandbox })
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, json)
}

#[tokio::test]
async fn health_endpoint_reports_contract_version() {
    let app = build_app(test_state());
    let (status, body) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["contract_version"].is_string());
}

#[tokio::test]
async fn posted_work_item_is_visible_in_projection_via_appended_event() {
    let state = test_state();
    let app = build_app(state.clone());

    let work_item = WorkItem {
        work_item_id: Uuid::new_v4(),
        description: "seed".into(),
        acceptance_criteria: "accepted".into(),
        required_verifiers: vec![],
        risk_tier: RiskTier::Low,
        dependencies: vec![],
        status: WorkItemStatus::Open,
    };
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/work_item")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&work_item).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    assert_eq!(state.log.last_seq().await, 1);
    let snapshot = state.projector.snapshot().await;
    assert!(snapshot.tables.work_items.contains_key(&work_item.work_item_id));
}

#[tokio::test]
async fn ahdb_state_starts_empty() {
    let app = build_app(test_state());
    let (status, body) = get_json(app, "/state/ahdb").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assert"], serde_json::json!([]));
}

#[tokio::test]
async fn unknown_receipt_returns_not_found() {
    let app = build_app(test_state());
    let (status, _) = get_json(app, &format!("/receipts/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
