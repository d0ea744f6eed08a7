//! Replication state machine.
//!
//! A VDC's spoke replication state is stored as annotations on the VDC
//! object. This module reads those annotations into a typed state and
//! decides, without side effects, what a reconciler tick should do.
//!
//! ```text
//!   replication-required=true ──healthy agent──▶ Replicating (terminal)
//!        │  ▲
//!        └──┘ no agent / inactive / stale
//!
//!   deletion-required=true ──agent──▶ delete issued ──result──▶ finalized
//!        │
//!        └── no agent ──▶ assumed clean (no-op)
//! ```

use std::collections::BTreeMap;

use ovim_state::AgentStatusReport;

use crate::vdc::*;

/// Spoke replication state of one VDC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationState {
    /// Replication requested, not started.
    Pending,
    /// Create operation issued; completion is not written back.
    Replicating,
    /// Spoke-side deletion requested.
    Deleting,
    /// Nothing for the reconciler to do.
    Done,
}

impl ReplicationState {
    /// Derive the state from a VDC's annotations.
    ///
    /// A deletion request takes precedence over everything else.
    pub fn of(vdc: &Vdc) -> Self {
        if vdc.flag(ANNOTATION_DELETION_REQUIRED) {
            Self::Deleting
        } else if vdc.flag(ANNOTATION_REPLICATION_IN_PROGRESS) {
            Self::Replicating
        } else if vdc.flag(ANNOTATION_REPLICATION_REQUIRED) {
            Self::Pending
        } else {
            Self::Done
        }
    }
}

/// Why a pending VDC stays pending this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitReason {
    NoAgent,
    AgentInactive { agent_id: String, status: String },
    AgentStale { agent_id: String, age_secs: u64 },
    /// A delete for this VDC is already outstanding.
    DeletionInFlight,
}

/// What a tick should do with a VDC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Wait(WaitReason),
    Replicate { agent_id: String },
    Delete { agent_id: String },
    /// No agent serves the zone; treat the spoke side as already gone.
    AssumeClean,
    Nothing,
}

/// Inputs observed by the reconciler for one VDC.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub agent: Option<&'a AgentStatusReport>,
    pub now: u64,
    /// Reports older than this make an agent ineligible.
    pub stale_after_secs: u64,
    pub deletion_outstanding: bool,
}

/// Pure transition function.
pub fn plan(state: ReplicationState, obs: Observation<'_>) -> Action {
    match state {
        ReplicationState::Replicating | ReplicationState::Done => Action::Nothing,

        ReplicationState::Pending => {
            let Some(agent) = obs.agent else {
                return Action::Wait(WaitReason::NoAgent);
            };
            if !agent.is_active() {
                return Action::Wait(WaitReason::AgentInactive {
                    agent_id: agent.agent_id.clone(),
                    status: agent.status.clone(),
                });
            }
            let age_secs = agent.age_secs(obs.now);
            if age_secs > obs.stale_after_secs {
                return Action::Wait(WaitReason::AgentStale {
                    agent_id: agent.agent_id.clone(),
                    age_secs,
                });
            }
            Action::Replicate {
                agent_id: agent.agent_id.clone(),
            }
        }

        ReplicationState::Deleting => {
            if obs.deletion_outstanding {
                return Action::Wait(WaitReason::DeletionInFlight);
            }
            match obs.agent {
                Some(agent) => Action::Delete {
                    agent_id: agent.agent_id.clone(),
                },
                None => Action::AssumeClean,
            }
        }
    }
}

/// Annotations after a create operation has been issued.
pub fn mark_replicating(
    annotations: &BTreeMap<String, String>,
    agent_id: &str,
    now: u64,
) -> BTreeMap<String, String> {
    let mut next = annotations.clone();
    next.insert(ANNOTATION_REPLICATION_REQUIRED.to_string(), "false".to_string());
    next.insert(ANNOTATION_REPLICATION_IN_PROGRESS.to_string(), "true".to_string());
    next.insert(ANNOTATION_AGENT_ID.to_string(), agent_id.to_string());
    next.insert(ANNOTATION_REPLICATION_STARTED.to_string(), now.to_string());
    next
}
