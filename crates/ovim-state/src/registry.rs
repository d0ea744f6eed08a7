//! SpokeRegistry — the hub's process-wide spoke state.
//!
//! Constructed once at startup and shared by handle with the API
//! handlers, dispatcher, result processor and reconciler. Tests build
//! their own instance.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StateResult;
use crate::types::*;

#[derive(Default)]
struct Maps {
    agents: RwLock<HashMap<AgentId, AgentStatusReport>>,
    endpoints: RwLock<HashMap<AgentId, String>>,
    queues: RwLock<HashMap<AgentId, VecDeque<Operation>>>,
    results: RwLock<HashMap<OperationId, OperationResult>>,
    metadata: RwLock<HashMap<OperationId, OperationMetadata>>,
}

/// Thread-safe in-memory registry of agents, queues, results and metadata.
///
/// Cheap to clone; all clones share the same maps.
#[derive(Clone)]
pub struct SpokeRegistry {
    maps: Arc<Maps>,
    /// Age after which an agent is displayed as stale.
    stale_after: Duration,
}

impl Default for SpokeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SpokeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            maps: Arc::new(Maps::default()),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
        }
    }

    /// Set the display staleness threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    // ── Agents ─────────────────────────────────────────────────────

    /// Record a status report received now.
    ///
    /// `resolved_callback` is the report's callback URL after address
    /// resolution; it is kept apart from the raw report.
    pub async fn record_status(
        &self,
        report: AgentStatusReport,
        resolved_callback: Option<String>,
    ) -> StateResult<()> {
        self.record_status_at(report, resolved_callback, epoch_secs())
            .await
    }

    /// Record a status report as if received at `now`.
    pub async fn record_status_at(
        &self,
        mut report: AgentStatusReport,
        resolved_callback: Option<String>,
        now: u64,
    ) -> StateResult<()> {
        report.validate()?;
        report.report_time = now;
        report.last_hub_contact = now;

        let agent_id = report.agent_id.clone();
        let previous = self
            .maps
            .agents
            .write()
            .await
            .insert(agent_id.clone(), report);

        if previous.is_none() {
            info!(%agent_id, "spoke agent registered");
        } else {
            debug!(%agent_id, "spoke agent status updated");
        }

        let mut endpoints = self.maps.endpoints.write().await;
        match resolved_callback {
            Some(endpoint) => {
                endpoints.insert(agent_id, endpoint);
            }
            None => {
                if endpoints.remove(&agent_id).is_some() {
                    debug!(%agent_id, "callback endpoint withdrawn");
                }
            }
        }
        Ok(())
    }

    /// Latest report for an agent.
    pub async fn get_agent(&self, agent_id: &str) -> Option<AgentStatusReport> {
        self.maps.agents.read().await.get(agent_id).cloned()
    }

    /// First agent found for a zone.
    ///
    /// When several agents claim the same zone the pick is arbitrary.
    pub async fn find_by_zone(&self, zone_id: &str) -> Option<AgentStatusReport> {
        self.maps
            .agents
            .read()
            .await
            .values()
            .find(|a| a.zone_id == zone_id)
            .cloned()
    }

    /// Snapshot of all agents with derived staleness and counts.
    pub async fn list_agents(&self) -> Vec<AgentSummary> {
        self.list_agents_at(epoch_secs()).await
    }

    /// Snapshot of all agents, computing staleness against `now`.
    pub async fn list_agents_at(&self, now: u64) -> Vec<AgentSummary> {
        let reports: Vec<AgentStatusReport> =
            self.maps.agents.read().await.values().cloned().collect();
        let endpoints = self.maps.endpoints.read().await.clone();
        let threshold = self.stale_after.as_secs();

        let mut summaries: Vec<AgentSummary> = reports
            .into_iter()
            .map(|r| {
                let is_stale = r.age_secs(now) > threshold;
                AgentSummary {
                    status: if is_stale {
                        STATUS_STALE.to_string()
                    } else {
                        r.status.clone()
                    },
                    is_stale,
                    vdc_count: r.vdcs.len(),
                    vm_count: r.vms.len(),
                    error_count: r.errors.len(),
                    callback_url: endpoints.get(&r.agent_id).cloned(),
                    agent_id: r.agent_id,
                    cluster_id: r.cluster_id,
                    zone_id: r.zone_id,
                    reported_status: r.status,
                    version: r.version,
                    report_time: r.report_time,
                    last_hub_contact: r.last_hub_contact,
                }
            })
            .collect();

        summaries.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        summaries
    }

    /// Resolved push endpoint for an agent, if it reported one.
    pub async fn callback_endpoint(&self, agent_id: &str) -> Option<String> {
        self.maps.endpoints.read().await.get(agent_id).cloned()
    }

    // ── Queues ─────────────────────────────────────────────────────

    /// Append an operation to the tail of an agent's queue.
    pub async fn enqueue(&self, agent_id: &str, operation: Operation) {
        let mut queues = self.maps.queues.write().await;
        let queue = queues.entry(agent_id.to_string()).or_default();
        debug!(
            %agent_id,
            operation_id = %operation.id,
            op_type = %operation.op_type,
            depth = queue.len() + 1,
            "operation queued"
        );
        queue.push_back(operation);
    }

    /// Remove and return an agent's entire queue in FIFO order.
    pub async fn drain(&self, agent_id: &str) -> Vec<Operation> {
        self.maps
            .queues
            .write()
            .await
            .remove(agent_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of operations waiting for an agent.
    pub async fn queue_len(&self, agent_id: &str) -> usize {
        self.maps
            .queues
            .read()
            .await
            .get(agent_id)
            .map_or(0, VecDeque::len)
    }

    /// Scan every queue for an operation that has not been delivered yet.
    pub async fn find_queued(&self, operation_id: &str) -> Option<Operation> {
        self.maps
            .queues
            .read()
            .await
            .values()
            .flat_map(|q| q.iter())
            .find(|op| op.id == operation_id)
            .cloned()
    }

    // ── Results ────────────────────────────────────────────────────

    /// Store a result, replacing any earlier one for the same operation.
    pub async fn store_result(&self, result: OperationResult) -> Option<OperationResult> {
        self.maps
            .results
            .write()
            .await
            .insert(result.operation_id.clone(), result)
    }

    pub async fn get_result(&self, operation_id: &str) -> Option<OperationResult> {
        self.maps.results.read().await.get(operation_id).cloned()
    }

    // ── Metadata ───────────────────────────────────────────────────

    pub async fn put_metadata(&self, metadata: OperationMetadata) {
        self.maps
            .metadata
            .write()
            .await
            .insert(metadata.operation_id.clone(), metadata);
    }

    pub async fn get_metadata(&self, operation_id: &str) -> Option<OperationMetadata> {
        self.maps.metadata.read().await.get(operation_id).cloned()
    }

    pub async fn remove_metadata(&self, operation_id: &str) -> Option<OperationMetadata> {
        self.maps.metadata.write().await.remove(operation_id)
    }

    /// Outstanding metadata of a given type for a VDC.
    pub async fn find_metadata_for_vdc(
        &self,
        vdc_name: &str,
        op_type: &OperationType,
    ) -> Option<OperationMetadata> {
        self.maps
            .metadata
            .read()
            .await
            .values()
            .find(|m| m.vdc_name == vdc_name && &m.op_type == op_type)
            .cloned()
    }

    pub async fn metadata_len(&self) -> usize {
        self.maps.metadata.read().await.len()
    }
}
