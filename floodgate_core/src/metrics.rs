//! Prometheus metrics shared across components.
//!
//! A single [`Metrics`] container owns the registry and hands out cheap
//! clones of per-component metric sets. Counter handles double as the stats
//! source: the `/stats` endpoint reads them back with `get()`, so there is
//! one set of numbers for both surfaces.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Labels for per-event ingest outcomes.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: Outcome,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Accepted,
    Rejected,
}

/// Labels for validation failures, keyed by the client-facing error kind.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorKindLabels {
    pub kind: String,
}

/// Labels for HTTP requests handled by the ingest surface.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub endpoint: String,
    pub status: u16,
}

/// Labels identifying the boundary that recovered a panic.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ComponentLabels {
    pub component: String,
}

impl ComponentLabels {
    pub fn worker() -> Self {
        Self {
            component: "worker".to_owned(),
        }
    }

    pub fn http_handler() -> Self {
        Self {
            component: "http_handler".to_owned(),
        }
    }
}

/// Metrics recorded by the ingest endpoint.
#[derive(Clone, Default)]
pub struct IngestMetrics {
    pub events: Family<OutcomeLabels, Counter>,
    pub validation_errors: Family<ErrorKindLabels, Counter>,
    pub http_requests: Family<HttpLabels, Counter>,
    pub panics_recovered: Family<ComponentLabels, Counter>,
}

impl IngestMetrics {
    fn register(registry: &mut Registry, panics: Family<ComponentLabels, Counter>) -> Self {
        let metrics = Self {
            panics_recovered: panics,
            ..Self::default()
        };
        registry.register(
            "floodgate_ingest_events",
            "Events received on the ingest endpoint by outcome",
            metrics.events.clone(),
        );
        registry.register(
            "floodgate_ingest_validation_errors",
            "Events rejected at the ingest endpoint by error kind",
            metrics.validation_errors.clone(),
        );
        registry.register(
            "floodgate_http_requests",
            "HTTP requests handled by the ingest surface",
            metrics.http_requests.clone(),
        );
        metrics
    }

    /// Record a rejected event under its error kind.
    pub fn record_rejection(&self, kind: &str) {
        self.events
            .get_or_create(&OutcomeLabels {
                outcome: Outcome::Rejected,
            })
            .inc();
        self.validation_errors
            .get_or_create(&ErrorKindLabels {
                kind: kind.to_owned(),
            })
            .inc();
    }

    pub fn record_acceptance(&self) {
        self.events
            .get_or_create(&OutcomeLabels {
                outcome: Outcome::Accepted,
            })
            .inc();
    }
}

/// Metrics recorded by the batching worker pool.
#[derive(Clone, Default)]
pub struct WorkerMetrics {
    pub processed: Counter,
    pub failed: Counter,
    pub batches_flushed: Counter,
    pub fallback_publishes: Counter,
    pub active_workers: Gauge,
    pub panics_recovered: Family<ComponentLabels, Counter>,
}

impl WorkerMetrics {
    fn register(registry: &mut Registry, panics: Family<ComponentLabels, Counter>) -> Self {
        let metrics = Self {
            panics_recovered: panics,
            ..Self::default()
        };
        registry.register(
            "floodgate_worker_processed",
            "Envelopes successfully published by workers",
            metrics.processed.clone(),
        );
        registry.register(
            "floodgate_worker_failed",
            "Envelopes abandoned after batch and individual publish failed",
            metrics.failed.clone(),
        );
        registry.register(
            "floodgate_worker_batches_flushed",
            "Batches flushed to the producer",
            metrics.batches_flushed.clone(),
        );
        registry.register(
            "floodgate_worker_fallback_publishes",
            "Batch failures that fell back to individual publishes",
            metrics.fallback_publishes.clone(),
        );
        registry.register(
            "floodgate_worker_active",
            "Workers currently running",
            metrics.active_workers.clone(),
        );
        metrics
    }
}

/// Metrics recorded by the broker producer.
#[derive(Clone, Default)]
pub struct ProducerMetrics {
    pub messages_sent: Counter,
    pub messages_failed: Counter,
    pub bytes_written: Counter,
    pub publish_retries: Counter,
}

impl ProducerMetrics {
    fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "floodgate_producer_messages_sent",
            "Records acknowledged by the broker",
            metrics.messages_sent.clone(),
        );
        registry.register(
            "floodgate_producer_messages_failed",
            "Records that failed to publish after retry exhaustion",
            metrics.messages_failed.clone(),
        );
        registry.register(
            "floodgate_producer_bytes_written",
            "Payload bytes acknowledged by the broker",
            metrics.bytes_written.clone(),
        );
        registry.register(
            "floodgate_producer_publish_retries",
            "Publish attempts beyond the first",
            metrics.publish_retries.clone(),
        );
        metrics
    }
}

/// Container for the registry and every component's metric set.
pub struct Metrics {
    registry: Registry,
    pub ingest: IngestMetrics,
    pub worker: WorkerMetrics,
    pub producer: ProducerMetrics,
    pub queue_depth: Gauge,
    pub queue_capacity: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let panics = Family::<ComponentLabels, Counter>::default();
        registry.register(
            "floodgate_panics_recovered",
            "Panics recovered at component boundaries",
            panics.clone(),
        );

        let ingest = IngestMetrics::register(&mut registry, panics.clone());
        let worker = WorkerMetrics::register(&mut registry, panics);
        let producer = ProducerMetrics::register(&mut registry);

        let queue_depth = Gauge::default();
        registry.register(
            "floodgate_queue_depth",
            "Envelopes currently buffered in the ingest queue",
            queue_depth.clone(),
        );
        let queue_capacity = Gauge::default();
        registry.register(
            "floodgate_queue_capacity",
            "Capacity of the ingest queue",
            queue_capacity.clone(),
        );

        Self {
            registry,
            ingest,
            worker,
            producer,
            queue_depth,
            queue_capacity,
        }
    }

    /// Encode the registry in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics should not fail");
        buffer
    }
}
