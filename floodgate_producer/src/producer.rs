//! The pooled, retrying producer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use floodgate_core::metrics::ProducerMetrics;
use floodgate_core::Envelope;
use serde::Serialize;
use snafu::{IntoError, ResultExt};
use tokio_util::sync::CancellationToken;

use crate::client::{BrokerClient, BrokerRecord};
use crate::config::ProducerConfig;
use crate::error::{
    CancelledSnafu, ClosedSnafu, InvalidConfigSnafu, ProducerError, PublishFailedSnafu, Result,
    UnhealthySnafu,
};
use crate::kafka::KafkaClient;
use crate::record::encode_envelope;

/// The publishing contract consumed by the worker pool.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, envelope: &Envelope, ct: &CancellationToken) -> Result<()>;

    async fn publish_batch(&self, envelopes: &[Envelope], ct: &CancellationToken) -> Result<()>;
}

/// Counter snapshot for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProducerStats {
    pub messages_sent: u64,
    pub messages_failed: u64,
    pub bytes_written: u64,
    pub publish_retries: u64,
}

/// Keyed-topic producer with a bounded handle pool and per-call retry.
///
/// `pool_size` handles are created up front and circulate through a bounded
/// channel; each publish borrows one for the duration of the call, so a
/// handle is never shared between concurrent callers.
pub struct LogProducer {
    config: ProducerConfig,
    clients: Vec<Arc<dyn BrokerClient>>,
    pool_tx: async_channel::Sender<Arc<dyn BrokerClient>>,
    pool_rx: async_channel::Receiver<Arc<dyn BrokerClient>>,
    closed: AtomicBool,
    metrics: ProducerMetrics,
}

impl LogProducer {
    /// Connect to the broker, creating `pool_size` writer handles.
    pub fn connect(config: ProducerConfig, metrics: ProducerMetrics) -> Result<Self> {
        config.validate()?;
        let mut clients: Vec<Arc<dyn BrokerClient>> = Vec::with_capacity(config.pool_size);
        for _ in 0..config.pool_size {
            let client =
                KafkaClient::new(&config).map_err(|source| ProducerError::CreateClient { source })?;
            clients.push(Arc::new(client));
        }
        Self::with_clients(config, clients, metrics)
    }

    /// Build a producer over pre-created handles.
    pub fn with_clients(
        config: ProducerConfig,
        clients: Vec<Arc<dyn BrokerClient>>,
        metrics: ProducerMetrics,
    ) -> Result<Self> {
        config.validate()?;
        if clients.is_empty() {
            return InvalidConfigSnafu {
                message: "at least one broker client is required".to_owned(),
            }
            .fail();
        }
        let (pool_tx, pool_rx) = async_channel::bounded(clients.len());
        for client in &clients {
            pool_tx
                .try_send(client.clone())
                .expect("pool has capacity for every handle");
        }
        Ok(Self {
            config,
            clients,
            pool_tx,
            pool_rx,
            closed: AtomicBool::new(false),
            metrics,
        })
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn stats(&self) -> ProducerStats {
        ProducerStats {
            messages_sent: self.metrics.messages_sent.get(),
            messages_failed: self.metrics.messages_failed.get(),
            bytes_written: self.metrics.bytes_written.get(),
            publish_retries: self.metrics.publish_retries.get(),
        }
    }

    /// Probe broker liveness through one pooled handle. Never writes.
    pub async fn health_check(&self, ct: &CancellationToken) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return ClosedSnafu.fail();
        }
        let handle = self.borrow(ct).await?;
        handle
            .client()
            .health_check(self.config.write_timeout)
            .await
            .context(UnhealthySnafu)
    }

    /// Close every handle. Idempotent; later publishes fail with `Closed`.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool_rx.close();
        for client in &self.clients {
            if let Err(err) = client.close().await {
                tracing::warn!(error = %err, "error closing broker client");
            }
        }
    }

    async fn borrow(&self, ct: &CancellationToken) -> Result<PooledClient> {
        tokio::select! {
            // Prefer an available handle over a racing cancellation.
            biased;
            client = self.pool_rx.recv() => match client {
                Ok(client) => Ok(PooledClient {
                    client: Some(client),
                    pool: self.pool_tx.clone(),
                }),
                Err(_) => ClosedSnafu.fail(),
            },
            _ = ct.cancelled() => CancelledSnafu.fail(),
        }
    }

    async fn write_with_retry(
        &self,
        records: Vec<BrokerRecord>,
        ct: &CancellationToken,
    ) -> Result<()> {
        let handle = self.borrow(ct).await?;
        let client = handle.client();

        let mut backoff = self.config.retry_backoff;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let last_err = match client
                .write(records.clone(), self.config.write_timeout)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if attempt > self.config.max_retries {
                return Err(PublishFailedSnafu { attempts: attempt }.into_error(last_err));
            }

            tracing::warn!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %last_err,
                "publish attempt failed, retrying"
            );
            self.metrics.publish_retries.inc();

            tokio::select! {
                biased;
                _ = ct.cancelled() => return CancelledSnafu.fail(),
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff *= 2;
        }
    }
}

#[async_trait]
impl Publisher for LogProducer {
    async fn publish(&self, envelope: &Envelope, ct: &CancellationToken) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return ClosedSnafu.fail();
        }

        let record = match encode_envelope(envelope) {
            Ok(record) => record,
            Err(err) => {
                self.metrics.messages_failed.inc();
                return Err(err);
            }
        };
        let bytes = record.value.len() as u64;

        match self.write_with_retry(vec![record], ct).await {
            Ok(()) => {
                self.metrics.messages_sent.inc();
                self.metrics.bytes_written.inc_by(bytes);
                Ok(())
            }
            Err(err) => {
                self.metrics.messages_failed.inc();
                Err(err)
            }
        }
    }

    async fn publish_batch(&self, envelopes: &[Envelope], ct: &CancellationToken) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return ClosedSnafu.fail();
        }
        if envelopes.is_empty() {
            return Ok(());
        }

        let mut records = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            match encode_envelope(envelope) {
                Ok(record) => records.push(record),
                Err(err) => {
                    // Unencodable envelopes cannot succeed on retry either;
                    // drop them from the batch and charge them now.
                    tracing::error!(
                        event_id = %envelope.event.id,
                        tenant_id = %envelope.event.tenant_id,
                        error = %err,
                        "failed to serialize envelope, dropping from batch"
                    );
                    self.metrics.messages_failed.inc();
                }
            }
        }
        if records.is_empty() {
            return Ok(());
        }

        let count = records.len() as u64;
        let bytes: u64 = records.iter().map(|r| r.value.len() as u64).sum();

        match self.write_with_retry(records, ct).await {
            Ok(()) => {
                self.metrics.messages_sent.inc_by(count);
                self.metrics.bytes_written.inc_by(bytes);
                Ok(())
            }
            Err(err) => {
                self.metrics.messages_failed.inc_by(count);
                Err(err)
            }
        }
    }
}

/// A borrowed handle; returns itself to the pool on drop.
struct PooledClient {
    client: Option<Arc<dyn BrokerClient>>,
    pool: async_channel::Sender<Arc<dyn BrokerClient>>,
}

impl PooledClient {
    fn client(&self) -> &Arc<dyn BrokerClient> {
        self.client.as_ref().expect("client present until drop")
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            // The pool is sized to hold every handle; this only fails after
            // close, when the handle is no longer needed.
            let _ = self.pool.try_send(client);
        }
    }
}
