//! Axum routes for the Supervisor API (spec §6.2).

use std::sync::Arc;

use axum::{
    extract::{Path as AxPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use director_core::{AhdbState, Event, EventPayload, EventSource, Receipt, WorkItem};
use director_eventlog::EventLog;
use director_mood::{MoodContext, MoodSignals};
use director_policy::Decision;
use director_projection::Projector;
use director_runtime::Director;
use director_sandbox::{ExecOutcome, Patch, Sandbox as SandboxProvider, SandboxPolicy};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Shared state every Supervisor API handler runs against.
#[derive(Clone)]
pub struct AppState {
    /// The run orchestrator.
    pub director: Arc<Director>,
    /// The event log, for endpoints that append directly (notes).
    pub log: Arc<dyn EventLog>,
    /// The projection store, for read endpoints.
    pub projector: Arc<Projector>,
    /// The sandbox provider, for lifecycle calls made outside a run.
    pub sandbox: Arc<dyn SandboxProvider>,
}

/// A structured API error, rendered as a JSON body with the matching status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    fn from_director(err: director_core::DirectorError) -> Self {
        use director_core::DirectorError as E;
        let status = match &err {
            E::ContractViolation(_) => StatusCode::BAD_REQUEST,
            E::ProjectionInconsistency { .. } => StatusCode::CONFLICT,
            E::SandboxUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            E::BudgetExhausted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            E::PolicyRefused { .. } => StatusCode::FORBIDDEN,
            E::CapabilityDenied { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Builds the axum router with every Supervisor API route (spec §6.2) plus
/// the ambient `GET /health` diagnostics surface.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/work_item", post(create_work_item))
        .route("/run", post(create_run))
        .route("/run/{id}/note", post(append_note))
        .route("/run/{id}/verify", post(request_verify))
        .route("/run/{id}/commit_request", post(commit_request))
        .route("/state/ahdb", get(state_ahdb))
        .route("/receipts/{id}", get(get_receipt))
        .route("/sandbox/create", post(sandbox_create))
        .route("/sandbox/exec", post(sandbox_exec))
        .route("/sandbox/write", post(sandbox_write))
        .route("/sandbox/checkpoint", post(sandbox_checkpoint))
        .route("/sandbox/restore", post(sandbox_restore))
        .route("/sandbox/destroy", post(sandbox_destroy))
        .route("/sandbox/proxy", post(sandbox_proxy))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "contract_version": director_core::CONTRACT_VERSION,
        "time": Utc::now().to_rfc3339(),
    }))
}

async fn create_work_item(
    State(state): State<Arc<AppState>>,
    Json(work_item): Json<WorkItem>,
) -> Result<impl IntoResponse, ApiError> {
    let id = work_item.work_item_id;
    let payload = EventPayload::WorkItemCreate { work_item };
    let event = Event::new(Uuid::new_v4(), Utc::now(), "system".to_string(), EventSource::System, payload);
    state.log.append(event).await.map_err(ApiError::from_director)?;
    state.projector.apply_next().await.map_err(ApiError::from_director)?;
    Ok((StatusCode::CREATED, Json(json!({ "work_item_id": id }))))
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    work_item_id: Uuid,
    user_id: String,
    #[serde(default)]
    signals: MoodSignals,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    run_id: Uuid,
}

async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let run_id = state
        .director
        .plan(req.work_item_id, req.user_id, MoodContext::default(), req.signals)
        .await
        .map_err(ApiError::from_director)?;
    Ok(Json(RunResponse { run_id }))
}

/// A typed note event, mirroring the `note.*` canonical types (spec §6.1)
/// this endpoint is permitted to append on a run's behalf.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum NoteRequest {
    Observation { text: String },
    Hypothesis { text: String },
    Hyperthesis { text: String, mitigation: String },
    Conjecture { text: String },
    RequestHelp { text: String },
}

#[derive(Debug, Deserialize)]
struct NoteBody {
    user_id: String,
    #[serde(flatten)]
    note: NoteRequest,
}

async fn append_note(
    AxPath(run_id): AxPath<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<NoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let _ = run_id;
    let payload = match body.note {
        NoteRequest::Observation { text } => EventPayload::NoteObservation { text },
        NoteRequest::Hypothesis { text } => EventPayload::NoteHypothesis { text },
        NoteRequest::Hyperthesis { text, mitigation } => EventPayload::NoteHyperthesis { text, mitigation },
        NoteRequest::Conjecture { text } => EventPayload::NoteConjecture { text },
        NoteRequest::RequestHelp { text } => EventPayload::NoteRequestHelp { text },
    };
    let event = Event::new(Uuid::new_v4(), Utc::now(), body.user_id, EventSource::User, payload);
    let seq = state.log.append(event).await.map_err(ApiError::from_director)?;
    state.projector.apply_next().await.map_err(ApiError::from_director)?;
    Ok(Json(json!({ "seq": seq })))
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    user_id: String,
    touched_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
struct VerifierOutcomeDto {
    result: director_core::VerifierResult,
    confidence: f64,
    mandatory: bool,
}

async fn request_verify(
    AxPath(run_id): AxPath<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Vec<VerifierOutcomeDto>>, ApiError> {
    let outcomes = state
        .director
        .request_verify(run_id, req.user_id, req.touched_paths)
        .await
        .map_err(ApiError::from_director)?;
    Ok(Json(
        outcomes
            .into_iter()
            .map(|o| VerifierOutcomeDto { result: o.result, confidence: o.confidence, mandatory: o.mandatory })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct CommitRequestBody {
    user_id: String,
    outcomes: Vec<VerifierOutcomeDtoIn>,
}

#[derive(Debug, Deserialize)]
struct VerifierOutcomeDtoIn {
    result: director_core::VerifierResult,
    confidence: f64,
    mandatory: bool,
}

async fn commit_request(
    AxPath(run_id): AxPath<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommitRequestBody>,
) -> Result<Json<Decision>, ApiError> {
    let outcomes: Vec<director_policy::VerifierOutcome> = req
        .outcomes
        .into_iter()
        .map(|o| director_policy::VerifierOutcome { result: o.result, confidence: o.confidence, mandatory: o.mandatory })
        .collect();
    let decision = state.director.commit(run_id, req.user_id, &outcomes).await.map_err(ApiError::from_director)?;
    Ok(Json(decision))
}

async fn state_ahdb(State(state): State<Arc<AppState>>) -> Json<AhdbState> {
    Json(state.projector.snapshot().await.tables.ahdb)
}

async fn get_receipt(
    AxPath(id): AxPath<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Receipt>, ApiError> {
    state
        .projector
        .snapshot()
        .await
        .tables
        .receipts_index
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "receipt not found"))
}

#[derive(Debug, Deserialize)]
struct SandboxCreateRequest {
    #[serde(default)]
    policy: SandboxPolicy,
}

async fn sandbox_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SandboxCreateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sandbox_id = state
        .sandbox
        .create(Uuid::new_v4(), req.policy)
        .await
        .map_err(ApiError::from_director)?;
    Ok(Json(json!({ "sandbox_id": sandbox_id })))
}

#[derive(Debug, Deserialize)]
struct SandboxExecRequest {
    sandbox_id: Uuid,
    command: String,
}

async fn sandbox_exec(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SandboxExecRequest>,
) -> Result<Json<ExecOutcome>, ApiError> {
    let outcome = state
        .sandbox
        .exec(req.sandbox_id, Uuid::new_v4(), &req.command)
        .await
        .map_err(ApiError::from_director)?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct SandboxWriteRequest {
    sandbox_id: Uuid,
    patch: Patch,
}

async fn sandbox_write(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SandboxWriteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let diff_hash = state
        .sandbox
        .write_files(req.sandbox_id, Uuid::new_v4(), &req.patch)
        .await
        .map_err(ApiError::from_director)?;
    Ok(Json(json!({ "diff_hash": diff_hash })))
}

#[derive(Debug, Deserialize)]
struct SandboxIdRequest {
    sandbox_id: Uuid,
}

async fn sandbox_checkpoint(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SandboxIdRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let checkpoint_ref =
        state.sandbox.checkpoint(req.sandbox_id, Uuid::new_v4()).await.map_err(ApiError::from_director)?;
    Ok(Json(json!({ "checkpoint_ref": checkpoint_ref })))
}

#[derive(Debug, Deserialize)]
struct SandboxRestoreRequest {
    sandbox_id: Uuid,
    checkpoint_ref: String,
}

async fn sandbox_restore(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SandboxRestoreRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .sandbox
        .restore(req.sandbox_id, Uuid::new_v4(), &req.checkpoint_ref)
        .await
        .map_err(ApiError::from_director)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sandbox_destroy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SandboxIdRequest>,
) -> Result<StatusCode, ApiError> {
    state.sandbox.destroy(req.sandbox_id, Uuid::new_v4()).await.map_err(ApiError::from_director)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SandboxProxyRequest {
    sandbox_id: Uuid,
    port: u16,
}

async fn sandbox_proxy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SandboxProxyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let url = state.sandbox.proxy(req.sandbox_id, req.port).await.map_err(ApiError::from_director)?;
    Ok(Json(json!({ "url": url })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use director_capability::LeaseRegistry;
    use director_core::{RiskTier, WorkItemStatus};
    use director_eventlog::MemoryEventLog;
    use director_policy::default_profiles;
    use director_sandbox::MockSandbox;
    use director_verifier::{MemoryAttestationStore, VerifierRunner};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn allowlist() -> director_policy::VerifierAllowlist {
        director_policy::VerifierAllowlist::new(vec![director_policy::VerifierAllowlistEntry {
            id: "v1".into(),
            verifier_type: "lint".into(),
            command_template: "echo ok".into(),
            required_capabilities: vec!["exec".into()],
            declared_independent: false,
            priority: 1,
            path_globs: vec!["**".into()],
        }])
    }

    async fn test_state() -> (Arc<AppState>, Uuid) {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        let projector = Arc::new(Projector::new(log.clone()));
        let leases = Arc::new(LeaseRegistry::new());
        let sandbox: Arc<dyn SandboxProvider> = Arc::new(MockSandbox::new());
        let artifacts: Arc<dyn director_artifact::ArtifactStore> = Arc::new(director_artifact::MemoryArtifactStore::new());
        let verifier = VerifierRunner::new(sandbox.clone(), artifacts, Arc::new(MemoryAttestationStore::default()));

        let work_item_id = Uuid::new_v4();
        projector
            .seed_work_item(WorkItem {
                work_item_id,
                description: "demo".into(),
                acceptance_criteria: "works".into(),
                required_verifiers: vec![],
                risk_tier: RiskTier::Low,
                dependencies: vec![],
                status: WorkItemStatus::Open,
            })
            .await;

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

        (Arc::new(AppState { director, log, projector, sandbox }), work_item_id)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (state, _) = test_state().await;
        let app = build_app(state);
        let response = app
            .oneshot(axum::http::Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn run_lifecycle_reaches_commit() {
        let (state, work_item_id) = test_state().await;
        let app = build_app(state.clone());

        let run_body = json!({ "work_item_id": work_item_id, "user_id": "u1" });
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/run")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(run_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let run: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let run_id = run["run_id"].as_str().unwrap();

        let verify_body = json!({ "user_id": "u1", "touched_paths": ["src/lib.rs"] });
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri(format!("/run/{run_id}/verify"))
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(verify_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let outcomes: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(outcomes.as_array().unwrap().is_empty());

        let commit_body = json!({ "user_id": "u1", "outcomes": [] });
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri(format!("/run/{run_id}/commit_request"))
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(commit_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let decision: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(decision["allowed"], true);
    }

    #[tokio::test]
    async fn get_receipt_missing_is_not_found() {
        let (state, _) = test_state().await;
        let app = build_app(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(format!("/receipts/{}", Uuid::new_v4()))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
