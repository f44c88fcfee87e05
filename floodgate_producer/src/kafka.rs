//! Kafka-backed broker client.
//!
//! Thin binding from [`BrokerClient`] onto an rdkafka [`FutureProducer`].
//! One `KafkaClient` is one writer handle; the pool in
//! [`crate::LogProducer`] decides how many exist and who holds them.
//! Client-side retries are disabled so that the producer's own retry policy
//! is the only one in play.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::client::{BrokerClient, BrokerRecord};
use crate::config::ProducerConfig;
use crate::error::{BrokerError, TransportSnafu};

pub struct KafkaClient {
    producer: FutureProducer,
    topic: String,
}

impl KafkaClient {
    /// Create one writer handle from the producer configuration.
    pub fn new(config: &ProducerConfig) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("acks", config.required_acks.as_client_value())
            .set("compression.codec", config.compression.codec_name())
            .set("batch.num.messages", config.batch_size.to_string())
            .set("linger.ms", config.batch_timeout.as_millis().to_string())
            .set(
                "message.timeout.ms",
                config.write_timeout.as_millis().to_string(),
            )
            .set("retries", "0")
            .create()
            .map_err(|err| BrokerError::Transport {
                message: err.to_string(),
            })?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl BrokerClient for KafkaClient {
    async fn write(
        &self,
        records: Vec<BrokerRecord>,
        timeout: Duration,
    ) -> Result<(), BrokerError> {
        // Enqueue everything, then await every delivery; librdkafka batches
        // the in-flight records according to the linger and batch hints.
        let mut deliveries = Vec::with_capacity(records.len());
        for record in &records {
            let mut headers = OwnedHeaders::new_with_capacity(record.headers.len());
            for (name, value) in &record.headers {
                headers = headers.insert(Header {
                    key: name,
                    value: Some(value.as_slice()),
                });
            }

            let future_record = FutureRecord::to(&self.topic)
                .key(&record.key)
                .payload(&record.value)
                .headers(headers)
                .timestamp(record.timestamp.timestamp_millis());

            deliveries.push(self.producer.send(future_record, Timeout::After(timeout)));
        }

        for delivery in deliveries {
            delivery.await.map_err(|(err, _message)| {
                TransportSnafu {
                    message: err.to_string(),
                }
                .build()
            })?;
        }

        Ok(())
    }

    async fn health_check(&self, timeout: Duration) -> Result<(), BrokerError> {
        let client = self.producer.client();
        client
            .fetch_metadata(Some(&self.topic), timeout)
            .map_err(|err| BrokerError::Transport {
                message: err.to_string(),
            })?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let producer = self.producer.clone();
        // flush blocks the calling thread while the queue drains
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(Duration::from_secs(30))))
            .await
            .map_err(|err| BrokerError::Transport {
                message: err.to_string(),
            })?
            .map_err(|err| BrokerError::Transport {
                message: err.to_string(),
            })
    }
}
