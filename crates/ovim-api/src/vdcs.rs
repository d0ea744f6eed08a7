//! Desired-state VDC endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::{info, warn};

use ovim_reconcile::VdcStore;
use ovim_spoke::DeletionComplete;

use crate::handlers::error_response;

#[derive(Clone)]
pub struct VdcState<S: VdcStore> {
    pub store: S,
}

/// POST /api/v1/vdcs/{name}/deletion-complete
///
/// Called by the result processor once a spoke reports the VDC gone.
/// Removes the VDC object from the store.
pub async fn deletion_complete<S: VdcStore>(
    State(state): State<VdcState<S>>,
    Path(name): Path<String>,
    body: Result<Json<DeletionComplete>, JsonRejection>,
) -> impl IntoResponse {
    let Json(report) = match body {
        Ok(body) => body,
        Err(e) => return error_response(&e.body_text(), StatusCode::BAD_REQUEST).into_response(),
    };
    if !report.warnings.is_empty() {
        warn!(vdc = %name, warnings = ?report.warnings, "spoke deletion finished with warnings");
    }

    match state.store.delete(&name).await {
        Ok(true) => {
            info!(vdc = %name, status = %report.status, "vdc deletion finalized");
            Json(json!({ "status": "deleted", "vdc": name })).into_response()
        }
        Ok(false) => error_response("vdc not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}
