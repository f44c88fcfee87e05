use std::str::FromStr;
use std::time::Duration;

use crate::error::{InvalidConfigSnafu, ProducerError, Result};

/// Acknowledgement durability required from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequiredAcks {
    /// Fire and forget.
    None,
    /// The partition leader has written the record.
    Leader,
    /// The full in-sync replica set has written the record.
    #[default]
    All,
}

impl RequiredAcks {
    /// Value for the client's `acks` property.
    pub fn as_client_value(&self) -> &'static str {
        match self {
            Self::None => "0",
            Self::Leader => "1",
            Self::All => "all",
        }
    }
}

impl FromStr for RequiredAcks {
    type Err = ProducerError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "none" | "0" => Ok(Self::None),
            "leader" | "1" => Ok(Self::Leader),
            "all" | "-1" => Ok(Self::All),
            other => InvalidConfigSnafu {
                message: format!("unknown required acks '{other}'"),
            }
            .fail(),
        }
    }
}

/// Compression codec applied to produced batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    /// Value for the client's `compression.codec` property.
    pub fn codec_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Snappy => "snappy",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }
}

impl FromStr for Compression {
    type Err = ProducerError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "none" | "" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "snappy" => Ok(Self::Snappy),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            other => InvalidConfigSnafu {
                message: format!("unknown compression codec '{other}'"),
            }
            .fail(),
        }
    }
}

/// Producer configuration.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Broker addresses; at least one is required.
    pub brokers: Vec<String>,
    /// Destination topic.
    pub topic: String,
    /// Number of writer handles in the pool.
    pub pool_size: usize,
    /// Writer-side aggregation hint: records per client batch.
    pub batch_size: usize,
    /// Writer-side aggregation hint: client linger time.
    pub batch_timeout: Duration,
    /// Wall-clock budget for a single write attempt.
    pub write_timeout: Duration,
    /// Retries beyond the first attempt.
    pub max_retries: u32,
    /// Initial backoff between attempts; doubled after each failure.
    pub retry_backoff: Duration,
    pub required_acks: RequiredAcks,
    pub compression: Compression,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_owned()],
            topic: "floodgate-events".to_owned(),
            pool_size: 4,
            batch_size: 100,
            batch_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_backoff: Duration::from_millis(100),
            required_acks: RequiredAcks::All,
            compression: Compression::None,
        }
    }
}

impl ProducerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.brokers.is_empty() {
            return InvalidConfigSnafu {
                message: "at least one broker is required".to_owned(),
            }
            .fail();
        }
        if self.topic.is_empty() {
            return InvalidConfigSnafu {
                message: "topic is required".to_owned(),
            }
            .fail();
        }
        if self.pool_size == 0 {
            return InvalidConfigSnafu {
                message: "pool size must be at least 1".to_owned(),
            }
            .fail();
        }
        Ok(())
    }
}
