//! SpokeHub — the assembled spoke coordination subsystem.
//!
//! Bundles the registry, address resolver, worker pool, dispatcher and
//! result processor behind one cloneable handle that the API handlers
//! and the reconciler share.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use ovim_state::*;

use crate::completion::CompletionClient;
use crate::dispatcher::{Dispatcher, DEFAULT_PUSH_TIMEOUT};
use crate::error::SpokeResult;
use crate::pool::WorkerPool;
use crate::processor::ResultProcessor;
use crate::resolver::{default_cluster_fqdns, CallbackResolver};

/// Tunables for [`SpokeHub::start`].
#[derive(Debug, Clone)]
pub struct SpokeConfig {
    /// Base URL of the desired-state API for completion callbacks.
    pub local_base_url: String,
    pub push_timeout: Duration,
    pub completion_timeout: Duration,
    pub workers: usize,
    pub queue_capacity: usize,
    pub cluster_fqdns: HashMap<String, String>,
}

impl Default for SpokeConfig {
    fn default() -> Self {
        Self {
            local_base_url: "http://127.0.0.1:8080".to_string(),
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            completion_timeout: Duration::from_secs(30),
            workers: 8,
            queue_capacity: 1024,
            cluster_fqdns: default_cluster_fqdns(),
        }
    }
}

#[derive(Clone)]
pub struct SpokeHub {
    registry: SpokeRegistry,
    resolver: Arc<CallbackResolver>,
    pool: WorkerPool,
    dispatcher: Dispatcher,
    processor: ResultProcessor,
}

impl SpokeHub {
    /// Build the subsystem and start its worker pool.
    pub fn start(registry: SpokeRegistry, config: SpokeConfig) -> SpokeResult<Self> {
        let pool = WorkerPool::start(config.workers, config.queue_capacity);
        let dispatcher = Dispatcher::new(registry.clone(), pool.clone(), config.push_timeout)?;
        let completion = CompletionClient::new(&config.local_base_url, config.completion_timeout)?;
        let processor = ResultProcessor::new(registry.clone(), pool.clone(), completion);

        info!(
            local_base_url = %config.local_base_url,
            mapped_clusters = config.cluster_fqdns.len(),
            "spoke hub started"
        );
        Ok(Self {
            registry,
            resolver: Arc::new(CallbackResolver::new(config.cluster_fqdns)),
            pool,
            dispatcher,
            processor,
        })
    }

    /// Record an agent's status report, resolving its callback address.
    pub async fn record_status(&self, report: AgentStatusReport) -> StateResult<()> {
        let resolved = report
            .callback_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(|url| self.resolver.resolve(&report.cluster_id, url));
        self.registry.record_status(report, resolved).await
    }

    pub fn registry(&self) -> &SpokeRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &CallbackResolver {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn processor(&self) -> &ResultProcessor {
        &self.processor
    }

    /// Stop background work after draining queued jobs.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
