//! Replication reconciler — periodic full scan of VDC objects.
//!
//! Every tick lists all VDCs, derives each one's [`ReplicationState`],
//! and issues create/delete operations through the spoke dispatcher.
//! Cost is linear in the number of VDCs. The reconciler never surfaces
//! errors to users; it advances or stalls, and logs either way.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use ovim_spoke::{new_operation, SpokeHub};
use ovim_state::*;

use crate::error::{ReconcileError, ReconcileResult};
use crate::payload::{create_vdc_payload, delete_vdc_payload};
use crate::state::{mark_replicating, plan, Action, Observation, ReplicationState};
use crate::vdc::{Vdc, VdcStore};

/// Default timeout carried by VDC lifecycle operations.
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub interval: Duration,
    /// Agents whose last report is older than this are not used.
    pub stale_after: Duration,
    pub operation_timeout_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            stale_after: Duration::from_secs(120),
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        }
    }
}

/// Counts from one reconciler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub scanned: usize,
    pub replications_started: usize,
    pub deletions_issued: usize,
    pub waiting: usize,
    pub assumed_clean: usize,
    pub errors: usize,
}

#[derive(Clone)]
pub struct Reconciler<S: VdcStore> {
    hub: SpokeHub,
    store: S,
    config: ReconcilerConfig,
}

impl<S: VdcStore> Reconciler<S> {
    pub fn new(hub: SpokeHub, store: S, config: ReconcilerConfig) -> Self {
        Self { hub, store, config }
    }

    /// Tick until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.interval);
        info!(interval = ?self.config.interval, "replication reconciler started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(summary) => {
                            if summary.replications_started + summary.deletions_issued > 0 {
                                info!(?summary, "reconciler tick issued operations");
                            } else {
                                debug!(?summary, "reconciler tick");
                            }
                        }
                        Err(e) => warn!(error = %e, "reconciler tick failed"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("replication reconciler stopped");
    }

    pub async fn tick(&self) -> ReconcileResult<TickSummary> {
        self.tick_at(epoch_secs()).await
    }

    /// One full pass over all VDCs, judging agent freshness against `now`.
    pub async fn tick_at(&self, now: u64) -> ReconcileResult<TickSummary> {
        let vdcs = self.store.list().await?;
        let mut summary = TickSummary {
            scanned: vdcs.len(),
            ..Default::default()
        };

        for vdc in vdcs {
            match self.reconcile_vdc(vdc, now).await {
                Ok(Action::Replicate { .. }) => summary.replications_started += 1,
                Ok(Action::Delete { .. }) => summary.deletions_issued += 1,
                Ok(Action::Wait(_)) => summary.waiting += 1,
                Ok(Action::AssumeClean) => summary.assumed_clean += 1,
                Ok(Action::Nothing) => {}
                Err(e) => {
                    warn!(error = %e, "vdc reconcile failed");
                    summary.errors += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn reconcile_vdc(&self, vdc: Vdc, now: u64) -> ReconcileResult<Action> {
        let state = ReplicationState::of(&vdc);
        if matches!(state, ReplicationState::Done | ReplicationState::Replicating) {
            return Ok(Action::Nothing);
        }

        let registry = self.hub.registry();
        let agent = registry.find_by_zone(&vdc.zone_id).await;
        let deletion_outstanding = state == ReplicationState::Deleting
            && registry
                .find_metadata_for_vdc(&vdc.name, &OperationType::DeleteVdc)
                .await
                .is_some();

        let action = plan(
            state,
            Observation {
                agent: agent.as_ref(),
                now,
                stale_after_secs: self.config.stale_after.as_secs(),
                deletion_outstanding,
            },
        );

        match &action {
            Action::Wait(reason) => {
                debug!(vdc = %vdc.name, zone = %vdc.zone_id, ?reason, "vdc waiting");
            }
            Action::Replicate { agent_id } => {
                let operation_id = queue_vdc_creation(
                    &self.hub,
                    &vdc,
                    agent_id,
                    self.config.operation_timeout_secs,
                )
                .await;

                // Re-read so annotations written since the scan survive.
                let mut current = self
                    .store
                    .get(&vdc.name)
                    .await?
                    .ok_or_else(|| ReconcileError::NotFound(vdc.name.clone()))?;
                current.annotations = mark_replicating(&current.annotations, agent_id, now);
                self.store.update(current).await?;
                info!(vdc = %vdc.name, %agent_id, %operation_id, "spoke replication started");
            }
            Action::Delete { agent_id } => {
                let operation_id = queue_vdc_deletion(
                    &self.hub,
                    &vdc,
                    agent_id,
                    self.config.operation_timeout_secs,
                )
                .await;
                info!(vdc = %vdc.name, %agent_id, %operation_id, "spoke deletion issued");
            }
            Action::AssumeClean => {
                info!(
                    vdc = %vdc.name,
                    zone = %vdc.zone_id,
                    "no agent for zone; spoke side assumed clean"
                );
            }
            Action::Nothing => {}
        }
        Ok(action)
    }
}

/// Issue a `create_vdc` operation for a VDC to an agent.
///
/// Records correlation metadata before dispatching.
pub async fn queue_vdc_creation(
    hub: &SpokeHub,
    vdc: &Vdc,
    agent_id: &str,
    timeout_seconds: u64,
) -> OperationId {
    issue(
        hub,
        vdc,
        agent_id,
        OperationType::CreateVdc,
        create_vdc_payload(vdc),
        timeout_seconds,
    )
    .await
}

/// Issue a `delete_vdc` operation for a VDC to an agent.
///
/// The metadata written here is what lets the result processor finalize
/// the VDC once the agent reports the deletion.
pub async fn queue_vdc_deletion(
    hub: &SpokeHub,
    vdc: &Vdc,
    agent_id: &str,
    timeout_seconds: u64,
) -> OperationId {
    issue(
        hub,
        vdc,
        agent_id,
        OperationType::DeleteVdc,
        delete_vdc_payload(vdc),
        timeout_seconds,
    )
    .await
}

async fn issue(
    hub: &SpokeHub,
    vdc: &Vdc,
    agent_id: &str,
    op_type: OperationType,
    payload: JsonObject,
    timeout_seconds: u64,
) -> OperationId {
    let operation = new_operation(op_type.clone(), payload, timeout_seconds);
    let operation_id = operation.id.clone();

    hub.registry()
        .put_metadata(OperationMetadata {
            operation_id: operation_id.clone(),
            op_type,
            vdc_name: vdc.name.clone(),
            agent_id: agent_id.to_string(),
            created_at: operation.timestamp,
        })
        .await;
    hub.dispatcher().dispatch(agent_id, operation).await;
    operation_id
}
