//! In-process broker client.
//!
//! Records every successful write and supports injected failures, so the
//! producer and worker paths can be exercised without a broker. Also backs
//! `floodgate serve --memory-broker`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{BrokerClient, BrokerRecord};
use crate::error::BrokerError;

#[derive(Default)]
pub struct MemoryClient {
    writes: Mutex<Vec<Vec<BrokerRecord>>>,
    fail_remaining: AtomicU64,
    fail_always: AtomicBool,
    write_attempts: AtomicU64,
    closed: AtomicBool,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` writes with a transport error.
    pub fn fail_next(&self, count: u64) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Fail every write until cleared.
    pub fn fail_always(&self, enabled: bool) {
        self.fail_always.store(enabled, Ordering::SeqCst);
    }

    /// Write calls observed, including failed ones.
    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Successful write calls, preserving batch boundaries.
    pub fn writes(&self) -> Vec<Vec<BrokerRecord>> {
        self.writes.lock().expect("writes lock").clone()
    }

    /// All successfully written records in write order.
    pub fn records(&self) -> Vec<BrokerRecord> {
        self.writes
            .lock()
            .expect("writes lock")
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.writes
            .lock()
            .expect("writes lock")
            .iter()
            .map(Vec::len)
            .sum()
    }

    fn should_fail(&self) -> bool {
        if self.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

#[async_trait]
impl BrokerClient for MemoryClient {
    async fn write(
        &self,
        records: Vec<BrokerRecord>,
        _timeout: Duration,
    ) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::ClientClosed);
        }
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            return Err(BrokerError::Transport {
                message: "injected failure".to_owned(),
            });
        }
        self.writes.lock().expect("writes lock").push(records);
        Ok(())
    }

    async fn health_check(&self, _timeout: Duration) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::ClientClosed);
        }
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(BrokerError::Transport {
                message: "injected failure".to_owned(),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn record(key: &str) -> BrokerRecord {
        BrokerRecord {
            key: key.to_owned(),
            value: b"{}".to_vec(),
            headers: vec![],
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_batches() {
        let client = MemoryClient::new();
        client
            .write(vec![record("a"), record("b")], Duration::from_secs(1))
            .await
            .unwrap();
        client
            .write(vec![record("c")], Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(client.writes().len(), 2);
        assert_eq!(client.record_count(), 3);
        assert_eq!(client.records()[2].key, "c");
    }

    #[tokio::test]
    async fn fail_next_rejects_then_recovers() {
        let client = MemoryClient::new();
        client.fail_next(2);

        for _ in 0..2 {
            let err = client
                .write(vec![record("a")], Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, BrokerError::Transport { .. }));
        }

        client
            .write(vec![record("a")], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(client.record_count(), 1);
        assert_eq!(client.write_attempts(), 3);
    }

    #[tokio::test]
    async fn closed_client_rejects_writes() {
        let client = MemoryClient::new();
        client.close().await.unwrap();
        let err = client
            .write(vec![record("a")], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::ClientClosed));
    }
}
