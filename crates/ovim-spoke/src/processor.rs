//! Result processor — correlates operation results and finishes them.
//!
//! `submit` stores the result and returns; classification happens on
//! the worker pool. The operation type is recovered, in order, from:
//!
//! 1. the metadata written when the operation was issued,
//! 2. a scan of operations still sitting in agent queues,
//! 3. the shape of the result payload (`status: deleted*` means a
//!    deletion, a `namespace` key means a creation).
//!
//! Only success/completed and error/failed statuses finish an
//! operation; anything else is treated as progress and leaves the
//! correlation metadata in place.
//!
//! Creation results are terminal here. Successful deletions are
//! finalized through the completion callback; a deletion with no
//! metadata cannot name its VDC and is reported as unresolved.

use tracing::{debug, error, info, warn};

use ovim_state::*;

use crate::completion::{CompletionClient, DeletionComplete};
use crate::error::SpokeError;
use crate::pool::{Job, WorkerPool};

/// What kind of result this is, and how we know.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Creation(Option<OperationMetadata>),
    Deletion(Option<OperationMetadata>),
    Unknown,
}

/// Final disposition of a processed result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    CreationSucceeded,
    CreationFailed,
    DeletionFinalized { vdc_name: String },
    DeletionFailed,
    FinalizationFailed { vdc_name: String },
    /// Deletion succeeded on the spoke but no VDC could be correlated.
    Unresolved,
    /// Non-terminal status; correlation metadata is kept.
    Pending,
    Dropped,
}

#[derive(Clone)]
pub struct ResultProcessor {
    registry: SpokeRegistry,
    pool: WorkerPool,
    completion: CompletionClient,
}

impl ResultProcessor {
    pub fn new(registry: SpokeRegistry, pool: WorkerPool, completion: CompletionClient) -> Self {
        Self {
            registry,
            pool,
            completion,
        }
    }

    /// Store a result and schedule its classification.
    ///
    /// Never waits for pool capacity. When the pool is full the
    /// classification runs on its own task instead.
    pub async fn submit(&self, result: OperationResult) {
        let operation_id = result.operation_id.clone();
        if self.registry.store_result(result.clone()).await.is_some() {
            debug!(%operation_id, "result replaced an earlier one");
        }

        let job: Job = {
            let this = self.clone();
            let result = result.clone();
            Box::pin(async move {
                this.process(&result).await;
            })
        };
        match self.pool.try_submit(job).await {
            Ok(()) => {}
            Err(SpokeError::PoolFull) => {
                debug!(%operation_id, "worker pool full; classifying on a separate task");
                let this = self.clone();
                tokio::spawn(async move {
                    this.process(&result).await;
                });
            }
            Err(e) => {
                warn!(%operation_id, error = %e, "result stored but not classified");
            }
        }
    }

    /// Classify and finish a result. Runs on the worker pool.
    pub async fn process(&self, result: &OperationResult) -> Outcome {
        match self.classify(result).await {
            Classification::Creation(meta) => self.finish_creation(result, meta).await,
            Classification::Deletion(meta) => self.finish_deletion(result, meta).await,
            Classification::Unknown => {
                warn!(
                    operation_id = %result.operation_id,
                    status = %result.status,
                    "unrecognized operation result dropped"
                );
                Outcome::Dropped
            }
        }
    }

    pub async fn classify(&self, result: &OperationResult) -> Classification {
        let id = result.operation_id.as_str();

        if let Some(meta) = self.registry.get_metadata(id).await {
            if meta.op_type.is_deletion() {
                return Classification::Deletion(Some(meta));
            }
            if meta.op_type.is_creation() {
                return Classification::Creation(Some(meta));
            }
        }

        if let Some(op) = self.registry.find_queued(id).await {
            if op.op_type.is_deletion() {
                return Classification::Deletion(None);
            }
            if op.op_type.is_creation() {
                return Classification::Creation(None);
            }
        }

        if result.reports_deletion() {
            Classification::Deletion(None)
        } else if result.reports_creation() {
            Classification::Creation(None)
        } else {
            Classification::Unknown
        }
    }

    async fn finish_creation(
        &self,
        result: &OperationResult,
        meta: Option<OperationMetadata>,
    ) -> Outcome {
        let vdc = meta.as_ref().map(|m| m.vdc_name.as_str()).unwrap_or("");
        if !result.is_success() && !result.is_failure() {
            debug!(
                operation_id = %result.operation_id,
                %vdc,
                status = %result.status,
                "creation still in progress"
            );
            return Outcome::Pending;
        }

        let outcome = if result.is_success() {
            info!(
                operation_id = %result.operation_id,
                %vdc,
                namespace = ?result.result.get("namespace"),
                "spoke creation completed"
            );
            Outcome::CreationSucceeded
        } else {
            error!(
                operation_id = %result.operation_id,
                %vdc,
                status = %result.status,
                error = result.error.as_deref().unwrap_or(""),
                "spoke creation failed"
            );
            Outcome::CreationFailed
        };

        if meta.is_some() {
            self.registry.remove_metadata(&result.operation_id).await;
        }
        outcome
    }

    async fn finish_deletion(
        &self,
        result: &OperationResult,
        meta: Option<OperationMetadata>,
    ) -> Outcome {
        let operation_id = result.operation_id.as_str();

        if result.is_failure() {
            error!(
                %operation_id,
                status = %result.status,
                error = result.error.as_deref().unwrap_or(""),
                "spoke deletion failed"
            );
            // Dropping the metadata lets the reconciler issue the delete again.
            self.registry.remove_metadata(operation_id).await;
            return Outcome::DeletionFailed;
        }
        if !result.is_success() {
            debug!(%operation_id, status = %result.status, "deletion still in progress");
            return Outcome::Pending;
        }

        let Some(meta) = meta else {
            error!(
                %operation_id,
                "spoke deletion succeeded but no metadata names the VDC; cannot finalize"
            );
            return Outcome::Unresolved;
        };

        let body = DeletionComplete {
            status: result.payload_status().unwrap_or("deleted").to_string(),
            warnings: result.warnings(),
        };

        let outcome = match self.completion.complete_deletion(&meta.vdc_name, &body).await {
            Ok(()) => {
                info!(
                    %operation_id,
                    vdc = %meta.vdc_name,
                    agent_id = %meta.agent_id,
                    warnings = body.warnings.len(),
                    "VDC deletion finalized"
                );
                Outcome::DeletionFinalized {
                    vdc_name: meta.vdc_name.clone(),
                }
            }
            Err(e) => {
                error!(
                    %operation_id,
                    vdc = %meta.vdc_name,
                    error = %e,
                    "VDC deletion finalization failed"
                );
                Outcome::FinalizationFailed {
                    vdc_name: meta.vdc_name.clone(),
                }
            }
        };

        self.registry.remove_metadata(operation_id).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::sync::Mutex;

    type Calls = Arc<Mutex<Vec<(String, DeletionComplete)>>>;

    /// Fake desired-state API recording deletion-complete calls.
    async fn fake_api(status: StatusCode) -> (String, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/api/v1/vdcs/{name}/deletion-complete",
                post(
                    move |State(calls): State<Calls>,
                          Path(name): Path<String>,
                          Json(body): Json<DeletionComplete>| async move {
                        calls.lock().await.push((name, body));
                        status
                    },
                ),
            )
            .with_state(calls.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), calls)
    }

    fn processor(registry: &SpokeRegistry, pool: &WorkerPool, base: &str) -> ResultProcessor {
        let completion = CompletionClient::new(base, Duration::from_secs(2)).unwrap();
        ResultProcessor::new(registry.clone(), pool.clone(), completion)
    }

    fn delete_meta(op_id: &str, vdc: &str) -> OperationMetadata {
        OperationMetadata {
            operation_id: op_id.to_string(),
            op_type: OperationType::DeleteVdc,
            vdc_name: vdc.to_string(),
            agent_id: "a1".to_string(),
            created_at: 1000,
        }
    }

    fn result(op_id: &str, status: &str, payload: serde_json::Value) -> OperationResult {
        OperationResult {
            operation_id: op_id.to_string(),
            status: status.to_string(),
            result: payload.as_object().cloned().unwrap_or_default(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn deletion_with_metadata_is_finalized_once() {
        let (base, calls) = fake_api(StatusCode::OK).await;
        let registry = SpokeRegistry::new();
        let pool = WorkerPool::start(2, 8);
        let p = processor(&registry, &pool, &base);

        registry.put_metadata(delete_meta("op-1", "vdc-42")).await;
        p.submit(result(
            "op-1",
            "completed",
            json!({"status": "deleted_with_warnings", "warnings": ["pvc retained"]}),
        ))
        .await;
        pool.shutdown().await;

        let calls = calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "vdc-42");
        assert_eq!(calls[0].1.status, "deleted_with_warnings");
        assert_eq!(calls[0].1.warnings, vec!["pvc retained".to_string()]);
        assert!(registry.get_metadata("op-1").await.is_none());
        assert_eq!(registry.get_result("op-1").await.unwrap().status, "completed");
    }

    #[tokio::test]
    async fn deletion_without_metadata_is_unresolved() {
        let (base, calls) = fake_api(StatusCode::OK).await;
        let registry = SpokeRegistry::new();
        let pool = WorkerPool::start(1, 8);
        let p = processor(&registry, &pool, &base);

        let outcome = p
            .process(&result("op-9", "success", json!({"status": "deleted"})))
            .await;
        assert_eq!(outcome, Outcome::Unresolved);
        assert!(calls.lock().await.is_empty());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn failed_deletion_clears_metadata_without_callback() {
        let (base, calls) = fake_api(StatusCode::OK).await;
        let registry = SpokeRegistry::new();
        let pool = WorkerPool::start(1, 8);
        let p = processor(&registry, &pool, &base);

        registry.put_metadata(delete_meta("op-2", "vdc-7")).await;
        let outcome = p.process(&result("op-2", "failed", json!({}))).await;

        assert_eq!(outcome, Outcome::DeletionFailed);
        assert!(calls.lock().await.is_empty());
        assert_eq!(registry.metadata_len().await, 0);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn finalization_failure_is_reported() {
        let (base, _calls) = fake_api(StatusCode::INTERNAL_SERVER_ERROR).await;
        let registry = SpokeRegistry::new();
        let pool = WorkerPool::start(1, 8);
        let p = processor(&registry, &pool, &base);

        registry.put_metadata(delete_meta("op-3", "vdc-3")).await;
        let outcome = p
            .process(&result("op-3", "success", json!({"status": "deleted"})))
            .await;
        assert_eq!(
            outcome,
            Outcome::FinalizationFailed {
                vdc_name: "vdc-3".to_string()
            }
        );
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn classification_falls_back_to_queue_then_shape() {
        let registry = SpokeRegistry::new();
        let pool = WorkerPool::start(1, 8);
        let p = processor(&registry, &pool, "http://127.0.0.1:1");

        registry
            .enqueue(
                "a1",
                Operation {
                    id: "op-q".to_string(),
                    op_type: OperationType::DeleteVdc,
                    payload: JsonObject::new(),
                    timestamp: 0,
                    retry_count: 0,
                    timeout_seconds: 0,
                },
            )
            .await;

        // Queued type wins over an ambiguous payload.
        let queued = p.classify(&result("op-q", "success", json!({}))).await;
        assert_eq!(queued, Classification::Deletion(None));

        let created = p
            .classify(&result("op-x", "success", json!({"namespace": "vdc-ns"})))
            .await;
        assert_eq!(created, Classification::Creation(None));

        let deleted = p
            .classify(&result("op-y", "success", json!({"status": "deleted", "namespace": "ns"})))
            .await;
        assert_eq!(deleted, Classification::Deletion(None));

        let unknown = p.classify(&result("op-z", "success", json!({"foo": 1}))).await;
        assert_eq!(unknown, Classification::Unknown);
        assert_eq!(
            p.process(&result("op-z", "success", json!({"foo": 1}))).await,
            Outcome::Dropped
        );
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn progress_status_keeps_deletion_metadata() {
        let (base, calls) = fake_api(StatusCode::OK).await;
        let registry = SpokeRegistry::new();
        let pool = WorkerPool::start(1, 8);
        let p = processor(&registry, &pool, &base);

        registry.put_metadata(delete_meta("op-1", "vdc-42")).await;

        let outcome = p.process(&result("op-1", "in_progress", json!({}))).await;
        assert_eq!(outcome, Outcome::Pending);
        assert!(registry.get_metadata("op-1").await.is_some());

        let outcome = p
            .process(&result("op-1", "completed", json!({"status": "deleted"})))
            .await;
        assert_eq!(
            outcome,
            Outcome::DeletionFinalized {
                vdc_name: "vdc-42".to_string()
            }
        );

        let calls = calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "vdc-42");
        assert_eq!(registry.metadata_len().await, 0);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn submit_does_not_wait_for_a_full_pool() {
        let registry = SpokeRegistry::new();
        let pool = WorkerPool::start(1, 1);
        let p = processor(&registry, &pool, "http://127.0.0.1:1");

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        pool.submit(Box::pin(async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
        }))
        .await
        .unwrap();
        started_rx.await.unwrap();
        pool.try_submit(Box::pin(async {})).await.unwrap();

        registry
            .put_metadata(OperationMetadata {
                op_type: OperationType::CreateVdc,
                ..delete_meta("op-f", "vdc-f")
            })
            .await;
        tokio::time::timeout(
            Duration::from_millis(500),
            p.submit(result("op-f", "success", json!({}))),
        )
        .await
        .unwrap();
        assert!(registry.get_result("op-f").await.is_some());

        // Classification still happens off the pool.
        for _ in 0..100 {
            if registry.metadata_len().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.metadata_len().await, 0);

        let _ = release_tx.send(());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn creation_results_are_terminal() {
        let registry = SpokeRegistry::new();
        let pool = WorkerPool::start(1, 8);
        let p = processor(&registry, &pool, "http://127.0.0.1:1");

        registry
            .put_metadata(OperationMetadata {
                op_type: OperationType::CreateVdc,
                ..delete_meta("op-c", "vdc-c")
            })
            .await;

        assert_eq!(
            p.process(&result("op-c", "success", json!({}))).await,
            Outcome::CreationSucceeded
        );
        assert_eq!(registry.metadata_len().await, 0);

        assert_eq!(
            p.process(&result("op-d", "error", json!({"namespace": "x"}))).await,
            Outcome::CreationFailed
        );

        registry
            .put_metadata(OperationMetadata {
                op_type: OperationType::CreateVdc,
                ..delete_meta("op-e", "vdc-e")
            })
            .await;
        assert_eq!(
            p.process(&result("op-e", "running", json!({}))).await,
            Outcome::Pending
        );
        assert!(registry.get_metadata("op-e").await.is_some());
        pool.shutdown().await;
    }
}
