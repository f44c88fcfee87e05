use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use floodgate_core::metrics::Metrics;
use floodgate_ingestor_core::EnvelopeQueue;
use floodgate_producer::{BrokerClient, LogProducer, MemoryClient, ProducerConfig};
use floodgate_server_http::HttpServer;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

fn test_server() -> (Router, Arc<MemoryClient>, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let client = Arc::new(MemoryClient::new());
    let producer = LogProducer::with_clients(
        ProducerConfig::default(),
        vec![client.clone() as Arc<dyn BrokerClient>],
        metrics.producer.clone(),
    )
    .unwrap();

    let queue = EnvelopeQueue::bounded(1000);
    let server = HttpServer::new(
        Arc::new(producer),
        queue,
        metrics.worker.clone(),
        metrics.clone(),
    );
    (server.into_router(), client, metrics)
}

async fn get_json(app: Router, path: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_healthy_broker() {
    let (app, _client, _metrics) = test_server();
    let (status, body) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn health_reports_broker_failure() {
    let (app, client, _metrics) = test_server();
    client.fail_always(true);

    let (status, body) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn stats_exposes_counters() {
    let (app, _client, metrics) = test_server();
    metrics.worker.processed.inc_by(42);
    metrics.worker.failed.inc_by(3);
    metrics.producer.messages_sent.inc_by(40);
    metrics.producer.bytes_written.inc_by(2048);

    let (status, body) = get_json(app, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["worker"]["processed"], 42);
    assert_eq!(body["worker"]["failed"], 3);
    assert_eq!(body["producer"]["messages_sent"], 40);
    assert_eq!(body["producer"]["bytes_written"], 2048);
    assert_eq!(body["queue"]["buffered"], 0);
    assert_eq!(body["queue"]["capacity"], 1000);
}

#[tokio::test]
async fn metrics_renders_prometheus_text() {
    let (app, _client, metrics) = test_server();
    metrics.worker.processed.inc_by(5);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("floodgate_worker_processed"));
    assert!(body.contains("floodgate_queue_capacity 1000"));
    assert!(body.contains("# HELP"));
}
