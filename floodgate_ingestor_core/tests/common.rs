use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use floodgate_core::metrics::{ProducerMetrics, WorkerMetrics};
use floodgate_core::{Envelope, LogEvent};
use floodgate_ingestor_core::{EnvelopeQueue, WorkerPool, WorkerPoolConfig};
use floodgate_producer::{BrokerClient, LogProducer, MemoryClient, ProducerConfig};
use tokio_util::sync::CancellationToken;

pub fn envelope(id: &str, tenant: &str) -> Envelope {
    let event = LogEvent {
        id: id.to_owned(),
        tenant_id: tenant.to_owned(),
        timestamp: "2024-01-15T10:30:00Z".parse().unwrap(),
        severity: "INFO".to_owned(),
        source: "api-gateway".to_owned(),
        message: "hello".to_owned(),
        metadata: BTreeMap::new(),
        trace_id: None,
        span_id: None,
    };
    Envelope::new(event, "node-1").with_batch("batch-1", 0)
}

pub struct Pipeline {
    pub queue: EnvelopeQueue,
    pub pool: WorkerPool,
    pub client: Arc<MemoryClient>,
    pub metrics: WorkerMetrics,
    pub ct: CancellationToken,
}

impl Pipeline {
    /// Close the queue, cancel the workers, and wait for them to exit.
    pub async fn shutdown(self) {
        self.queue.close();
        self.ct.cancel();
        tokio::time::timeout(Duration::from_secs(30), self.pool.join())
            .await
            .expect("workers failed to stop");
    }
}

pub fn start_pipeline(
    workers: usize,
    batch_size: usize,
    batch_timeout: Duration,
    max_retries: u32,
) -> Pipeline {
    let client = Arc::new(MemoryClient::new());
    let producer_config = ProducerConfig {
        max_retries,
        retry_backoff: Duration::from_millis(100),
        ..Default::default()
    };
    let producer = LogProducer::with_clients(
        producer_config,
        vec![client.clone() as Arc<dyn BrokerClient>],
        ProducerMetrics::default(),
    )
    .expect("valid producer config");

    let queue = EnvelopeQueue::bounded(1000);
    let metrics = WorkerMetrics::default();
    let ct = CancellationToken::new();

    let pool = WorkerPool::start(
        WorkerPoolConfig {
            workers,
            batch_size,
            batch_timeout,
            ..Default::default()
        },
        queue.clone(),
        Arc::new(producer),
        metrics.clone(),
        ct.clone(),
    );

    Pipeline {
        queue,
        pool,
        client,
        metrics,
        ct,
    }
}

/// Poll until `condition` holds, advancing the paused clock in small steps.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}
