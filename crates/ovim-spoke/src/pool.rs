//! Bounded background worker pool.
//!
//! Push deliveries and result classification run here instead of on
//! the request task. A fixed set of workers pulls boxed futures from a
//! bounded channel; `shutdown` closes the channel and waits for the
//! workers to finish whatever is already queued.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{SpokeError, SpokeResult};

/// A unit of background work.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct PoolInner {
    /// `None` once the pool has been shut down.
    tx: RwLock<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Cloneable handle to a fixed-size worker pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Spawn `workers` tasks consuming a channel of `capacity` jobs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<Job>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let job = rx.lock().await.recv().await;
                        match job {
                            Some(job) => job.await,
                            None => break,
                        }
                    }
                    debug!(worker, "pool worker exiting");
                })
            })
            .collect();

        info!(workers, capacity, "worker pool started");
        Self {
            inner: Arc::new(PoolInner {
                tx: RwLock::new(Some(tx)),
                workers: Mutex::new(handles),
            }),
        }
    }

    /// Queue a job without waiting for capacity.
    pub async fn try_submit(&self, job: Job) -> SpokeResult<()> {
        let guard = self.inner.tx.read().await;
        let tx = guard.as_ref().ok_or(SpokeError::PoolClosed)?;
        tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SpokeError::PoolFull,
            mpsc::error::TrySendError::Closed(_) => SpokeError::PoolClosed,
        })
    }

    /// Queue a job, waiting for capacity if the channel is full.
    pub async fn submit(&self, job: Job) -> SpokeResult<()> {
        let tx = self
            .inner
            .tx
            .read()
            .await
            .clone()
            .ok_or(SpokeError::PoolClosed)?;
        tx.send(job).await.map_err(|_| SpokeError::PoolClosed)
    }

    /// Stop accepting jobs, run everything already queued, then return.
    pub async fn shutdown(&self) {
        let Some(tx) = self.inner.tx.write().await.take() else {
            return;
        };
        drop(tx);

        let handles: Vec<JoinHandle<()>> = self.inner.workers.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        info!("worker pool drained");
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.tx.read().await.is_none()
    }
}
