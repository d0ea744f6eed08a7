//! ovim-reconcile — drives VDC objects through spoke provisioning.
//!
//! A periodic reconciler scans every VDC in the desired-state store and
//! turns replication/deletion annotations into operations for the spoke
//! agent serving the VDC's zone.
//!
//! # Architecture
//!
//! ```text
//! Reconciler<S: VdcStore>  (tick every 30s)
//!   for each VDC:
//!     ReplicationState::of(annotations)
//!     agent = registry.find_by_zone(zone)
//!     plan(state, observation) ─▶ Action
//!       Replicate ─▶ metadata + dispatch create_vdc ─▶ annotations updated
//!       Delete    ─▶ metadata + dispatch delete_vdc
//!       Wait / AssumeClean / Nothing ─▶ logged
//! ```
//!
//! Completion of a create is never written back; `Replicating` is
//! terminal from the reconciler's point of view. Deletions finish when
//! the result processor calls back into the hub's deletion-complete
//! endpoint.

pub mod error;
pub mod payload;
pub mod reconciler;
pub mod state;
pub mod vdc;

pub use error::{ReconcileError, ReconcileResult};
pub use payload::{create_vdc_payload, delete_vdc_payload};
pub use reconciler::{
    queue_vdc_creation, queue_vdc_deletion, Reconciler, ReconcilerConfig, TickSummary,
};
pub use state::{plan, Action, Observation, ReplicationState, WaitReason};
pub use vdc::{InMemoryVdcStore, Vdc, VdcLimitRange, VdcQuota, VdcStore};
