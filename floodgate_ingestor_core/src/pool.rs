use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use floodgate_core::metrics::{ComponentLabels, WorkerMetrics};
use floodgate_producer::Publisher;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::queue::EnvelopeQueue;
use crate::worker::Worker;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of long-running workers.
    pub workers: usize,
    /// Flush when a worker's local batch reaches this size.
    pub batch_size: usize,
    /// Flush a non-empty batch when this much time has passed.
    pub batch_timeout: Duration,
    /// Wall-clock budget for one batch publish.
    pub flush_timeout: Duration,
    /// Wall-clock budget for one fallback publish.
    pub fallback_publish_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 100,
            batch_timeout: Duration::from_millis(100),
            flush_timeout: Duration::from_secs(10),
            fallback_publish_timeout: Duration::from_secs(5),
        }
    }
}

/// A pool of batching workers consuming the envelope queue.
///
/// A panicking worker is caught at the task boundary, counted, and the pool
/// continues with fewer workers; availability wins over uniformity, and the
/// active worker gauge makes the degradation visible.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the workers. They run until the queue closes and drains or the
    /// token is cancelled; either way each worker flushes its local batch
    /// before exiting.
    pub fn start(
        config: WorkerPoolConfig,
        queue: EnvelopeQueue,
        publisher: Arc<dyn Publisher>,
        metrics: WorkerMetrics,
        ct: CancellationToken,
    ) -> Self {
        let workers = config.workers.max(1);
        tracing::info!(
            workers,
            batch_size = config.batch_size,
            batch_timeout_ms = config.batch_timeout.as_millis() as u64,
            "starting worker pool"
        );

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker::new(
                id,
                config.clone(),
                queue.clone(),
                publisher.clone(),
                metrics.clone(),
            );
            let metrics = metrics.clone();
            let ct = ct.clone();

            handles.push(tokio::spawn(async move {
                metrics.active_workers.inc();
                let outcome = AssertUnwindSafe(worker.run(ct)).catch_unwind().await;
                metrics.active_workers.dec();

                if let Err(panic) = outcome {
                    metrics
                        .panics_recovered
                        .get_or_create(&ComponentLabels::worker())
                        .inc();
                    tracing::error!(
                        worker = id,
                        panic = panic_message(&panic),
                        "worker panicked; pool continues with fewer workers"
                    );
                }
            }));
        }

        Self { handles }
    }

    /// Wait for every worker to exit. Callers bound this with a deadline.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
