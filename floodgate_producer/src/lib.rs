//! Broker producer for Floodgate.
//!
//! [`LogProducer`] publishes envelopes to a partitioned topic keyed by
//! tenant, with a bounded pool of writer handles, per-call retry with
//! exponential backoff, and counters for every outcome. The broker binding
//! itself sits behind [`BrokerClient`]; [`KafkaClient`] talks to a real
//! cluster and [`MemoryClient`] is an in-process sink for tests and for
//! running without a broker.

pub mod client;
pub mod config;
pub mod error;
pub mod kafka;
pub mod memory;
pub mod producer;
pub mod record;

pub use client::{BrokerClient, BrokerRecord};
pub use config::{Compression, ProducerConfig, RequiredAcks};
pub use error::{BrokerError, ProducerError, Result};
pub use kafka::KafkaClient;
pub use memory::MemoryClient;
pub use producer::{LogProducer, ProducerStats, Publisher};
