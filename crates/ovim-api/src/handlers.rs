//! Spoke-facing handlers.
//!
//! Accepted-but-asynchronous work (status reports, results) always
//! answers 200. Only malformed requests and unknown IDs fail.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use ovim_reconcile::reconciler::DEFAULT_OPERATION_TIMEOUT_SECS;
use ovim_spoke::new_operation;
use ovim_state::*;

use crate::auth::SpokeIdentity;
use crate::ApiState;

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

// ── Status ─────────────────────────────────────────────────────

/// POST /spoke/status
pub async fn report_status(
    State(state): State<ApiState>,
    Extension(identity): Extension<SpokeIdentity>,
    body: Result<Json<AgentStatusReport>, JsonRejection>,
) -> impl IntoResponse {
    let Json(report) = match body {
        Ok(body) => body,
        Err(e) => return error_response(&e.body_text(), StatusCode::BAD_REQUEST).into_response(),
    };
    if report.agent_id != identity.agent_id {
        debug!(
            header_agent = %identity.agent_id,
            body_agent = %report.agent_id,
            "status report agent differs from header identity"
        );
    }

    let agent_id = report.agent_id.clone();
    match state.hub.record_status(report).await {
        Ok(()) => Json(json!({ "status": "received", "agent_id": agent_id })).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}

/// GET /spoke/agents
pub async fn list_agents(State(state): State<ApiState>) -> impl IntoResponse {
    let agents = state.hub.registry().list_agents().await;
    Json(json!({ "total": agents.len(), "agents": agents }))
}

// ── Operations ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub agent_id: Option<String>,
}

/// GET /spoke/operations?agent_id=X
pub async fn poll_operations(
    State(state): State<ApiState>,
    Query(query): Query<PollQuery>,
) -> impl IntoResponse {
    let Some(agent_id) = query.agent_id.filter(|id| !id.is_empty()) else {
        return error_response("agent_id is required", StatusCode::BAD_REQUEST).into_response();
    };

    let operations = state.hub.dispatcher().drain(&agent_id).await;
    if operations.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    debug!(%agent_id, count = operations.len(), "operations delivered by poll");
    Json(operations).into_response()
}

/// Body of a direct enqueue request.
#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    pub agent_id: String,
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub payload: JsonObject,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// POST /spoke/operations/queue
pub async fn queue_operation(
    State(state): State<ApiState>,
    body: Result<Json<QueueRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match body {
        Ok(body) => body,
        Err(e) => return error_response(&e.body_text(), StatusCode::BAD_REQUEST).into_response(),
    };
    if req.agent_id.is_empty() || req.op_type.is_empty() {
        return error_response("agent_id and type are required", StatusCode::BAD_REQUEST)
            .into_response();
    }

    let operation = new_operation(
        OperationType::from(req.op_type),
        req.payload,
        req.timeout_seconds.unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS),
    );
    let operation_id = operation.id.clone();
    state.hub.dispatcher().enqueue(&req.agent_id, operation).await;

    Json(json!({
        "status": "queued",
        "agent_id": req.agent_id,
        "operation_id": operation_id,
    }))
    .into_response()
}

// ── Results ────────────────────────────────────────────────────

/// POST /spoke/operations/{id}/result
pub async fn submit_result(
    State(state): State<ApiState>,
    Path(operation_id): Path<String>,
    body: Result<Json<OperationResult>, JsonRejection>,
) -> impl IntoResponse {
    let Json(mut result) = match body {
        Ok(body) => body,
        Err(e) => return error_response(&e.body_text(), StatusCode::BAD_REQUEST).into_response(),
    };
    if !result.operation_id.is_empty() && result.operation_id != operation_id {
        debug!(
            %operation_id,
            body_operation_id = %result.operation_id,
            "result body names another operation; path wins"
        );
    }
    result.operation_id = operation_id.clone();

    info!(%operation_id, status = %result.status, "operation result received");
    state.hub.processor().submit(result).await;

    Json(json!({ "status": "accepted", "operation_id": operation_id })).into_response()
}

/// GET /spoke/operations/{id}/result
pub async fn get_result(
    State(state): State<ApiState>,
    Path(operation_id): Path<String>,
) -> impl IntoResponse {
    match state.hub.registry().get_result(&operation_id).await {
        Some(result) => Json(result).into_response(),
        None => error_response("operation result not found", StatusCode::NOT_FOUND).into_response(),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovim_spoke::{SpokeConfig, SpokeHub};

    fn test_state() -> ApiState {
        let hub = SpokeHub::start(SpokeRegistry::new(), SpokeConfig::default()).unwrap();
        ApiState { hub }
    }

    fn identity() -> SpokeIdentity {
        SpokeIdentity {
            agent_id: "a1".to_string(),
            cluster_id: "c1".to_string(),
            zone_id: "z1".to_string(),
            version: Some("1.0.0".to_string()),
        }
    }

    fn report(agent_id: &str) -> AgentStatusReport {
        AgentStatusReport {
            agent_id: agent_id.to_string(),
            cluster_id: "c1".to_string(),
            zone_id: "z1".to_string(),
            status: STATUS_ACTIVE.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn status_report_accepted() {
        let state = test_state();
        let resp = report_status(
            State(state.clone()),
            Extension(identity()),
            Ok(Json(report("a1"))),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.hub.registry().get_agent("a1").await.is_some());
    }

    #[tokio::test]
    async fn status_report_missing_zone_rejected() {
        let state = test_state();
        let mut r = report("a1");
        r.zone_id.clear();
        let resp = report_status(State(state.clone()), Extension(identity()), Ok(Json(r)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.hub.registry().get_agent("a1").await.is_none());
    }

    #[tokio::test]
    async fn poll_requires_agent_id() {
        let state = test_state();
        let resp = poll_operations(State(state), Query(PollQuery { agent_id: None }))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn poll_empty_queue_is_no_content() {
        let state = test_state();
        let resp = poll_operations(
            State(state),
            Query(PollQuery {
                agent_id: Some("a1".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn queue_then_poll() {
        let state = test_state();
        let req = QueueRequest {
            agent_id: "a1".to_string(),
            op_type: "create_resource_quota".to_string(),
            payload: JsonObject::new(),
            timeout_seconds: None,
        };
        let resp = queue_operation(State(state.clone()), Ok(Json(req)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.hub.registry().queue_len("a1").await, 1);

        let resp = poll_operations(
            State(state.clone()),
            Query(PollQuery {
                agent_id: Some("a1".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.hub.registry().queue_len("a1").await, 0);
    }

    #[tokio::test]
    async fn queue_requires_type() {
        let state = test_state();
        let req = QueueRequest {
            agent_id: "a1".to_string(),
            op_type: String::new(),
            payload: JsonObject::new(),
            timeout_seconds: None,
        };
        let resp = queue_operation(State(state), Ok(Json(req))).await.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submitted_result_uses_path_id() {
        let state = test_state();
        let result = OperationResult {
            operation_id: "other".to_string(),
            status: "completed".to_string(),
            ..Default::default()
        };
        let resp = submit_result(State(state.clone()), Path("op-1".to_string()), Ok(Json(result)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let stored = state.hub.registry().get_result("op-1").await.unwrap();
        assert_eq!(stored.operation_id, "op-1");
        assert!(state.hub.registry().get_result("other").await.is_none());
        state.hub.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_result_is_not_found() {
        let state = test_state();
        let resp = get_result(State(state), Path("nope".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn agents_listed() {
        let state = test_state();
        state.hub.record_status(report("a2")).await.unwrap();
        state.hub.record_status(report("a1")).await.unwrap();
        let resp = list_agents(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
