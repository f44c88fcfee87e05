use std::sync::Arc;

use floodgate_core::metrics::WorkerMetrics;
use floodgate_core::Envelope;
use floodgate_producer::Publisher;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::pool::WorkerPoolConfig;
use crate::queue::{EnvelopeQueue, Take};

/// One batching worker.
///
/// Accumulates envelopes into a local batch and flushes when the batch
/// reaches `batch_size` or the timer fires, whichever comes first. The batch
/// is worker-local and never shared.
pub(crate) struct Worker {
    id: usize,
    config: WorkerPoolConfig,
    queue: EnvelopeQueue,
    publisher: Arc<dyn Publisher>,
    metrics: WorkerMetrics,
    batch: Vec<Envelope>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        config: WorkerPoolConfig,
        queue: EnvelopeQueue,
        publisher: Arc<dyn Publisher>,
        metrics: WorkerMetrics,
    ) -> Self {
        let batch = Vec::with_capacity(config.batch_size);
        Self {
            id,
            config,
            queue,
            publisher,
            metrics,
            batch,
        }
    }

    pub(crate) async fn run(mut self, ct: CancellationToken) {
        tracing::debug!(worker = self.id, "worker started");

        let timer = tokio::time::sleep(self.config.batch_timeout);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                taken = self.queue.take(&ct) => match taken {
                    Take::Envelope(envelope) => {
                        self.batch.push(envelope);
                        if self.batch.len() >= self.config.batch_size {
                            self.flush().await;
                            timer.as_mut().reset(Instant::now() + self.config.batch_timeout);
                        }
                    }
                    Take::Closed => {
                        self.flush().await;
                        break;
                    }
                    Take::Cancelled => {
                        self.drain().await;
                        break;
                    }
                },
                _ = &mut timer => {
                    if !self.batch.is_empty() {
                        self.flush().await;
                    }
                    timer.as_mut().reset(Instant::now() + self.config.batch_timeout);
                }
            }
        }

        tracing::debug!(worker = self.id, "worker stopped");
    }

    /// Drain whatever the queue still holds, then flush the local batch.
    ///
    /// Runs on cancellation so that envelopes accepted before the queue was
    /// closed are still attempted on the way out.
    async fn drain(&mut self) {
        while let Some(envelope) = self.queue.try_take() {
            self.batch.push(envelope);
            if self.batch.len() >= self.config.batch_size {
                self.flush().await;
            }
        }
        self.flush().await;
    }

    async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.batch);

        // The flush gets its own cancellation scope: shutdown must not
        // interrupt a flush already in flight, only the timeout bounds it.
        let flush_ct = CancellationToken::new();
        let result = tokio::time::timeout(
            self.config.flush_timeout,
            self.publisher.publish_batch(&batch, &flush_ct),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                self.metrics.processed.inc_by(batch.len() as u64);
                self.metrics.batches_flushed.inc();
                tracing::debug!(worker = self.id, batch_size = batch.len(), "batch published");
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    worker = self.id,
                    batch_size = batch.len(),
                    error = %err,
                    "batch publish failed, retrying envelopes individually"
                );
                self.publish_individually(batch).await;
            }
            Err(_) => {
                tracing::warn!(
                    worker = self.id,
                    batch_size = batch.len(),
                    timeout_ms = self.config.flush_timeout.as_millis() as u64,
                    "batch publish timed out, retrying envelopes individually"
                );
                self.publish_individually(batch).await;
            }
        }
    }

    /// A batch failure is often one bad record hiding behind the batch
    /// boundary; retrying individually bounds the damage to the records
    /// that actually fail.
    async fn publish_individually(&self, batch: Vec<Envelope>) {
        self.metrics.fallback_publishes.inc();

        for envelope in batch {
            let publish_ct = CancellationToken::new();
            let result = tokio::time::timeout(
                self.config.fallback_publish_timeout,
                self.publisher.publish(&envelope, &publish_ct),
            )
            .await;

            match result {
                Ok(Ok(())) => {
                    self.metrics.processed.inc();
                }
                Ok(Err(err)) => {
                    tracing::error!(
                        worker = self.id,
                        event_id = %envelope.event.id,
                        tenant_id = %envelope.event.tenant_id,
                        error = %err,
                        "failed to publish envelope"
                    );
                    self.metrics.failed.inc();
                }
                Err(_) => {
                    tracing::error!(
                        worker = self.id,
                        event_id = %envelope.event.id,
                        tenant_id = %envelope.event.tenant_id,
                        "individual publish timed out"
                    );
                    self.metrics.failed.inc();
                }
            }
        }
    }
}
