//! Operation dispatcher — push delivery with queue fallback.
//!
//! `dispatch` never blocks the caller on the network. When the agent
//! has a resolved callback endpoint, a push job is handed to the worker
//! pool; if the push fails, times out, or the pool has no room, the
//! operation lands on the agent's FIFO queue to be picked up by its
//! next poll. Delivery is at-least-once: an agent may see an operation
//! both pushed and drained.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use ovim_state::*;

use crate::error::{SpokeError, SpokeResult};
use crate::pool::{Job, WorkerPool};

/// Header carrying the operation ID on push requests.
pub const OPERATION_ID_HEADER: &str = "X-Operation-ID";

/// Default bound on a single push attempt.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(30);

static OPERATION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate a time-derived operation ID, unique within this process.
pub fn new_operation_id() -> OperationId {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = OPERATION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("op-{nanos}-{seq}")
}

/// Build a fresh operation stamped with a new ID and the current time.
pub fn new_operation(
    op_type: OperationType,
    payload: JsonObject,
    timeout_seconds: u64,
) -> Operation {
    Operation {
        id: new_operation_id(),
        op_type,
        payload,
        timestamp: epoch_secs(),
        retry_count: 0,
        timeout_seconds,
    }
}

/// Delivers operations to spoke agents.
#[derive(Clone)]
pub struct Dispatcher {
    registry: SpokeRegistry,
    pool: WorkerPool,
    http: reqwest::Client,
}

impl Dispatcher {
    /// Create a dispatcher whose pushes are bounded by `push_timeout`.
    pub fn new(
        registry: SpokeRegistry,
        pool: WorkerPool,
        push_timeout: Duration,
    ) -> SpokeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(push_timeout)
            .build()
            .map_err(|e| SpokeError::Client(e.to_string()))?;
        Ok(Self {
            registry,
            pool,
            http,
        })
    }

    /// Deliver an operation to an agent, by push if possible.
    ///
    /// Returns as soon as the push is scheduled or the operation queued.
    pub async fn dispatch(&self, agent_id: &str, operation: Operation) {
        let Some(endpoint) = self.registry.callback_endpoint(agent_id).await else {
            debug!(%agent_id, operation_id = %operation.id, "no callback endpoint; queueing");
            self.registry.enqueue(agent_id, operation).await;
            return;
        };

        let job: Job = {
            let this = self.clone();
            let agent_id = agent_id.to_string();
            let operation = operation.clone();
            Box::pin(async move {
                this.deliver(&agent_id, &endpoint, operation).await;
            })
        };

        if let Err(e) = self.pool.try_submit(job).await {
            warn!(
                %agent_id,
                operation_id = %operation.id,
                error = %e,
                "push not scheduled; queueing"
            );
            self.registry.enqueue(agent_id, operation).await;
        }
    }

    /// Push an operation now, queueing it if the push fails.
    ///
    /// Returns `true` when the agent accepted the push.
    pub async fn deliver(&self, agent_id: &str, endpoint: &str, operation: Operation) -> bool {
        match push_operation(&self.http, endpoint, &operation).await {
            Ok(()) => {
                info!(
                    %agent_id,
                    operation_id = %operation.id,
                    op_type = %operation.op_type,
                    "operation pushed"
                );
                true
            }
            Err(e) => {
                warn!(
                    %agent_id,
                    %endpoint,
                    operation_id = %operation.id,
                    error = %e,
                    "push failed; falling back to queue"
                );
                self.registry.enqueue(agent_id, operation).await;
                false
            }
        }
    }

    /// Append directly to the agent's queue, skipping push.
    pub async fn enqueue(&self, agent_id: &str, operation: Operation) {
        self.registry.enqueue(agent_id, operation).await;
    }

    /// Take everything queued for an agent.
    pub async fn drain(&self, agent_id: &str) -> Vec<Operation> {
        let ops = self.registry.drain(agent_id).await;
        if !ops.is_empty() {
            debug!(%agent_id, count = ops.len(), "queue drained");
        }
        ops
    }
}

/// POST an operation to `<endpoint>/operations`.
///
/// Only 200 and 202 count as accepted.
pub async fn push_operation(
    client: &reqwest::Client,
    endpoint: &str,
    operation: &Operation,
) -> SpokeResult<()> {
    let url = format!("{}/operations", endpoint.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .header(OPERATION_ID_HEADER, operation.id.as_str())
        .json(operation)
        .send()
        .await
        .map_err(|e| SpokeError::Transport(e.to_string()))?;

    match resp.status().as_u16() {
        200 | 202 => Ok(()),
        status => Err(SpokeError::Status(status)),
    }
}
