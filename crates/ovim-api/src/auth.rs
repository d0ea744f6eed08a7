//! Spoke authentication gate.
//!
//! Agents identify themselves with `X-Agent-ID`, `X-Cluster-ID`,
//! `X-Zone-ID` and `X-Agent-Version`, and present one shared bearer
//! token. This is a placeholder gate, not a security boundary: the
//! token is a single fixed value and identities are not verified.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

pub const HEADER_AGENT_ID: &str = "x-agent-id";
pub const HEADER_CLUSTER_ID: &str = "x-cluster-id";
pub const HEADER_ZONE_ID: &str = "x-zone-id";
pub const HEADER_AGENT_VERSION: &str = "x-agent-version";

pub const DEFAULT_SPOKE_TOKEN: &str = "ovim-spoke-agent-token";

/// Identity headers of an authenticated spoke request.
///
/// Inserted as a request extension for downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokeIdentity {
    pub agent_id: String,
    pub cluster_id: String,
    pub zone_id: String,
    pub version: Option<String>,
}

/// Shared-secret configuration for the gate.
#[derive(Clone)]
pub struct SpokeAuth {
    token: Arc<str>,
}

impl SpokeAuth {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }

    fn accepts(&self, headers: &HeaderMap) -> bool {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|t| t == &*self.token)
    }
}

impl Default for SpokeAuth {
    fn default() -> Self {
        Self::new(DEFAULT_SPOKE_TOKEN)
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Extract the identity headers; `None` if agent, cluster or zone is missing.
pub fn identity_from_headers(headers: &HeaderMap) -> Option<SpokeIdentity> {
    Some(SpokeIdentity {
        agent_id: header(headers, HEADER_AGENT_ID)?,
        cluster_id: header(headers, HEADER_CLUSTER_ID)?,
        zone_id: header(headers, HEADER_ZONE_ID)?,
        version: header(headers, HEADER_AGENT_VERSION),
    })
}

fn unauthorized(msg: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": msg })),
    )
        .into_response()
}

/// Middleware guarding the `/spoke` routes.
pub async fn require_spoke_identity(
    State(auth): State<SpokeAuth>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(identity) = identity_from_headers(request.headers()) else {
        debug!(path = %request.uri().path(), "spoke request missing identity headers");
        return unauthorized("missing spoke agent identity headers");
    };
    if !auth.accepts(request.headers()) {
        debug!(agent_id = %identity.agent_id, "spoke request with invalid token");
        return unauthorized("invalid spoke agent token");
    }

    request.extensions_mut().insert(identity);
    next.run(request).await
}
