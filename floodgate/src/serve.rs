use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use floodgate_core::metrics::Metrics;
use floodgate_ingestor_core::{EnvelopeQueue, WorkerPool, WorkerPoolConfig};
use floodgate_ingestor_http::{HttpIngestor, DEFAULT_MAX_BODY_BYTES};
use floodgate_observability::init_observability;
use floodgate_producer::{
    BrokerClient, Compression, LogProducer, MemoryClient, ProducerConfig, RequiredAcks,
};
use floodgate_server_http::HttpServer;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::error::{
    BindSnafu, InvalidConfigurationSnafu, ObservabilitySnafu, ProducerSnafu, Result, ServerSnafu,
};

/// How long in-flight requests get to finish once shutdown begins.
const SERVER_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);
/// How long the workers get to drain the queue and flush their batches.
const WORKER_DRAIN_DEADLINE: Duration = Duration::from_secs(15);
/// Cadence of the periodic stats log line.
const STATS_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port for the HTTP server.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Shared secret required in the X-API-Key header.
    #[arg(long, env = "API_KEY")]
    api_key: Option<String>,

    /// Comma-separated broker addresses.
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    brokers: String,

    /// Destination topic.
    #[arg(long, env = "KAFKA_TOPIC", default_value = "floodgate-events")]
    topic: String,

    /// Records per batch, for both workers and the broker client.
    #[arg(long, env = "KAFKA_BATCH_SIZE", default_value_t = 100)]
    batch_size: usize,

    /// Batch linger in milliseconds.
    #[arg(long, env = "KAFKA_BATCH_TIMEOUT_MS", default_value_t = 100)]
    batch_timeout_ms: u64,

    /// Publish retries beyond the first attempt.
    #[arg(long, env = "KAFKA_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Number of pooled broker writer handles.
    #[arg(long, env = "KAFKA_POOL_SIZE", default_value_t = 4)]
    pool_size: usize,

    /// Compression codec: none, gzip, snappy, lz4, zstd.
    #[arg(long, env = "KAFKA_COMPRESSION", default_value = "none")]
    compression: String,

    /// Acknowledgement durability: none, leader, all.
    #[arg(long, env = "KAFKA_REQUIRED_ACKS", default_value = "all")]
    required_acks: String,

    /// Number of batching workers.
    #[arg(long, env = "INGEST_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Envelope queue capacity.
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 1000)]
    queue_capacity: usize,

    /// Maximum request body size in bytes.
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Identity of this ingest node; defaults to the hostname.
    #[arg(long, env = "INGEST_NODE")]
    ingest_node: Option<String>,

    /// Log level when RUST_LOG is not set.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Use an in-process broker instead of Kafka (local development).
    #[arg(long)]
    memory_broker: bool,
}

impl ServeArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        init_observability(&self.log_level).context(ObservabilitySnafu)?;

        let api_key = self
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                InvalidConfigurationSnafu {
                    message: "API_KEY is required".to_owned(),
                }
                .build()
            })?;
        let producer_config = self.producer_config()?;
        let ingest_node = self.ingest_node.clone().unwrap_or_else(default_node_id);
        let metrics = Arc::new(Metrics::new());

        let producer = if self.memory_broker {
            tracing::warn!("using the in-process memory broker; events are not durable");
            let clients: Vec<Arc<dyn BrokerClient>> = (0..producer_config.pool_size)
                .map(|_| Arc::new(MemoryClient::new()) as Arc<dyn BrokerClient>)
                .collect();
            LogProducer::with_clients(producer_config, clients, metrics.producer.clone())
        } else {
            LogProducer::connect(producer_config, metrics.producer.clone())
        }
        .context(ProducerSnafu)?;
        let producer = Arc::new(producer);
        tracing::info!(
            brokers = %self.brokers,
            topic = %self.topic,
            pool_size = self.pool_size,
            "producer initialized"
        );

        let queue = EnvelopeQueue::bounded(self.queue_capacity);

        let worker_ct = ct.child_token();
        let pool = WorkerPool::start(
            WorkerPoolConfig {
                workers: self.workers,
                batch_size: self.batch_size,
                batch_timeout: Duration::from_millis(self.batch_timeout_ms),
                ..Default::default()
            },
            queue.clone(),
            producer.clone(),
            metrics.worker.clone(),
            worker_ct.clone(),
        );

        let ingestor = HttpIngestor::new(
            queue.clone(),
            ingest_node.clone(),
            api_key,
            metrics.ingest.clone(),
            self.max_body_bytes,
        );
        let server = HttpServer::new(
            producer.clone(),
            queue.clone(),
            metrics.worker.clone(),
            metrics.clone(),
        );
        let app = ingestor.into_router().merge(server.into_router());

        let address = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(address)
            .await
            .context(BindSnafu {
                address: address.to_string(),
            })?;
        tracing::info!(%address, node = %ingest_node, "ingest server listening");

        let shutdown_ct = ct.clone();
        let mut server_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown_ct.cancelled().await })
                .await
        });

        let stats_task = tokio::spawn(report_stats(
            ct.clone(),
            producer.clone(),
            metrics.clone(),
            queue.clone(),
        ));

        // Run until the shutdown signal or a fatal server error.
        let mut early_exit = None;
        tokio::select! {
            _ = ct.cancelled() => {
                tracing::info!("shutdown signal received");
            }
            result = &mut server_task => {
                tracing::error!("server exited unexpectedly, shutting down");
                ct.cancel();
                early_exit = Some(result);
            }
        }

        // 1. Let in-flight requests finish; their offers may still succeed.
        let mut server_error = None;
        match early_exit {
            Some(result) => {
                if let Ok(Err(err)) = result {
                    server_error = Some(err);
                }
            }
            None => match tokio::time::timeout(SERVER_SHUTDOWN_DEADLINE, server_task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(err))) => server_error = Some(err),
                Ok(Err(join_err)) => {
                    tracing::error!(error = %join_err, "server task failed");
                }
                Err(_) => {
                    tracing::warn!("server did not stop within the deadline");
                }
            },
        }

        // 2. No more envelopes can be offered; the backlog stays for takers.
        tracing::info!(buffered = queue.len(), "closing envelope queue");
        queue.close();

        // 3. Drain the workers; on deadline expiry unflushed envelopes are lost.
        worker_ct.cancel();
        match tokio::time::timeout(WORKER_DRAIN_DEADLINE, pool.join()).await {
            Ok(()) => tracing::info!("workers stopped"),
            Err(_) => tracing::warn!(
                deadline_secs = WORKER_DRAIN_DEADLINE.as_secs(),
                "worker drain deadline elapsed, abandoning unflushed envelopes"
            ),
        }

        // 4. Release the broker handles.
        producer.close().await;
        stats_task.abort();

        if let Some(err) = server_error {
            return Err(err).context(ServerSnafu);
        }
        tracing::info!("shutdown complete");
        Ok(())
    }

    fn producer_config(&self) -> Result<ProducerConfig> {
        let brokers: Vec<String> = self
            .brokers
            .split(',')
            .map(str::trim)
            .filter(|broker| !broker.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        let compression: Compression = self.compression.parse().map_err(|err| {
            InvalidConfigurationSnafu {
                message: format!("{err}"),
            }
            .build()
        })?;
        let required_acks: RequiredAcks = self.required_acks.parse().map_err(|err| {
            InvalidConfigurationSnafu {
                message: format!("{err}"),
            }
            .build()
        })?;

        let config = ProducerConfig {
            brokers,
            topic: self.topic.clone(),
            pool_size: self.pool_size,
            batch_size: self.batch_size,
            batch_timeout: Duration::from_millis(self.batch_timeout_ms),
            max_retries: self.max_retries,
            required_acks,
            compression,
            ..Default::default()
        };
        config.validate().map_err(|err| {
            InvalidConfigurationSnafu {
                message: err.to_string(),
            }
            .build()
        })?;
        Ok(config)
    }
}

fn default_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Periodically log a stats line so an operator can follow throughput
/// without scraping the endpoints.
async fn report_stats(
    ct: CancellationToken,
    producer: Arc<LogProducer>,
    metrics: Arc<Metrics>,
    queue: EnvelopeQueue,
) {
    let mut interval = tokio::time::interval(STATS_INTERVAL);
    interval.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            _ = ct.cancelled() => return,
            _ = interval.tick() => {
                let producer_stats = producer.stats();
                tracing::info!(
                    processed = metrics.worker.processed.get(),
                    failed = metrics.worker.failed.get(),
                    sent = producer_stats.messages_sent,
                    send_failures = producer_stats.messages_failed,
                    bytes_written = producer_stats.bytes_written,
                    queued = queue.len(),
                    "pipeline stats"
                );
            }
        }
    }
}
