//! ovim-api — REST API for the OVIM hub.
//!
//! Spoke agents talk to the `/spoke` group, which sits behind the
//! shared-token gate in [`auth`]. The desired-state `deletion-complete`
//! endpoint is what the result processor calls back into once a spoke
//! reports a VDC deleted.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/spoke/status` | Record an agent status report |
//! | GET | `/spoke/operations?agent_id=X` | Drain an agent's queue (204 if empty) |
//! | POST | `/spoke/operations/queue` | Enqueue an operation, bypassing push |
//! | POST | `/spoke/operations/{id}/result` | Submit an operation result |
//! | GET | `/spoke/operations/{id}/result` | Fetch a stored result |
//! | GET | `/spoke/agents` | List agents with staleness |
//! | POST | `/api/v1/vdcs/{name}/deletion-complete` | Finalize a VDC deletion |
//! | GET | `/healthz` | Liveness (unauthenticated) |

pub mod auth;
pub mod handlers;
pub mod vdcs;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use ovim_reconcile::VdcStore;
use ovim_spoke::SpokeHub;

pub use auth::{SpokeAuth, SpokeIdentity, DEFAULT_SPOKE_TOKEN};

/// Shared state for spoke handlers.
#[derive(Clone)]
pub struct ApiState {
    pub hub: SpokeHub,
}

/// Build the complete hub router.
pub fn build_router<S: VdcStore>(hub: SpokeHub, vdc_store: S, auth: SpokeAuth) -> Router {
    let api_state = ApiState { hub };

    let spoke_routes = Router::new()
        .route("/status", post(handlers::report_status))
        .route("/operations", get(handlers::poll_operations))
        .route("/operations/queue", post(handlers::queue_operation))
        .route(
            "/operations/{id}/result",
            get(handlers::get_result).post(handlers::submit_result),
        )
        .route("/agents", get(handlers::list_agents))
        .route_layer(middleware::from_fn_with_state(auth, auth::require_spoke_identity))
        .with_state(api_state);

    let vdc_routes = Router::new()
        .route(
            "/vdcs/{name}/deletion-complete",
            post(vdcs::deletion_complete::<S>),
        )
        .with_state(vdcs::VdcState { store: vdc_store });

    Router::new()
        .nest("/spoke", spoke_routes)
        .nest("/api/v1", vdc_routes)
        .route("/healthz", get(handlers::healthz))
}
