//! End-to-end: push client -> HTTP ingest -> queue -> workers -> broker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use floodgate_core::metrics::Metrics;
use floodgate_ingestor_core::{EnvelopeQueue, WorkerPool, WorkerPoolConfig};
use floodgate_ingestor_http::{HttpIngestor, LogEventInput};
use floodgate_producer::{BrokerClient, LogProducer, MemoryClient, ProducerConfig};
use floodgate_push_client::{PushClient, PushClientError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const API_KEY: &str = "e2e-secret";

struct TestServer {
    address: SocketAddr,
    queue: EnvelopeQueue,
    client: Arc<MemoryClient>,
    pool: WorkerPool,
    worker_ct: CancellationToken,
    server_ct: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let metrics = Arc::new(Metrics::new());
        let client = Arc::new(MemoryClient::new());
        let producer = Arc::new(
            LogProducer::with_clients(
                ProducerConfig::default(),
                vec![client.clone() as Arc<dyn BrokerClient>],
                metrics.producer.clone(),
            )
            .unwrap(),
        );

        let queue = EnvelopeQueue::bounded(1000);
        let worker_ct = CancellationToken::new();
        let pool = WorkerPool::start(
            WorkerPoolConfig {
                workers: 2,
                batch_size: 10,
                batch_timeout: Duration::from_millis(20),
                ..Default::default()
            },
            queue.clone(),
            producer,
            metrics.worker.clone(),
            worker_ct.clone(),
        );

        let app = HttpIngestor::new(
            queue.clone(),
            "node-e2e",
            API_KEY,
            metrics.ingest.clone(),
            1024 * 1024,
        )
        .into_router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server_ct = CancellationToken::new();
        let shutdown = server_ct.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        Self {
            address,
            queue,
            client,
            pool,
            worker_ct,
            server_ct,
            server,
        }
    }

    fn push_client(&self) -> PushClient {
        PushClient::new(format!("http://{}", self.address), API_KEY)
    }

    /// Shut down in the contractual order: server, queue, workers.
    async fn shutdown(self) {
        self.server_ct.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(10), self.server).await;
        self.queue.close();
        self.worker_ct.cancel();
        tokio::time::timeout(Duration::from_secs(15), self.pool.join())
            .await
            .expect("workers drained in time");
    }
}

fn event(id: &str, tenant: &str) -> LogEventInput {
    LogEventInput {
        id: id.to_owned(),
        tenant_id: tenant.to_owned(),
        timestamp: "2024-01-15T10:30:00Z".to_owned(),
        severity: "info".to_owned(),
        source: "E2E-Test".to_owned(),
        message: "end to end".to_owned(),
        ..Default::default()
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 5s");
}

#[tokio::test]
async fn pushed_events_reach_the_broker() {
    let server = TestServer::start().await;
    let client = server.push_client();

    let response = client
        .send(&[event("e1", "t1"), event("e2", "t2"), event("e3", "t1")])
        .await
        .unwrap();
    assert_eq!(response.accepted, 3);
    assert_eq!(response.rejected, 0);

    let broker = server.client.clone();
    wait_for(|| broker.record_count() == 3).await;

    let records = broker.records();
    let mut keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["t1", "t1", "t2"]);

    server.shutdown().await;
}

#[tokio::test]
async fn partial_rejection_is_reported_to_the_client() {
    let server = TestServer::start().await;
    let client = server.push_client();

    let mut bad = event("e2", "t1");
    bad.severity = "LOUD".to_owned();

    let response = client
        .send(&[event("e1", "t1"), bad, event("e3", "t1")])
        .await
        .unwrap();
    assert_eq!(response.accepted, 2);
    assert_eq!(response.rejected, 1);
    assert_eq!(response.errors[0].index, 1);
    assert_eq!(response.errors[0].kind, "InvalidSeverity");

    server.shutdown().await;
}

#[tokio::test]
async fn bad_api_key_is_rejected() {
    let server = TestServer::start().await;
    let client = PushClient::new(format!("http://{}", server.address), "wrong-key");

    let err = client.send(&[event("e1", "t1")]).await.unwrap_err();
    match err {
        PushClientError::Rejected { status, .. } => assert_eq!(status.as_u16(), 401),
        other => panic!("expected rejection, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_flushes_accepted_events() {
    let server = TestServer::start().await;
    let client = server.push_client();

    let events: Vec<LogEventInput> = (0..7).map(|i| event(&format!("e{i}"), "t1")).collect();
    let response = client.send(&events).await.unwrap();
    assert_eq!(response.accepted, 7);

    // Shut down immediately; every acknowledged event must still land.
    let broker = server.client.clone();
    server.shutdown().await;
    assert_eq!(broker.record_count(), 7);
}
