use floodgate_producer::ProducerStats;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub worker: WorkerStats,
    pub producer: ProducerStats,
    pub queue: QueueStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub processed: u64,
    pub failed: u64,
    pub active_workers: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub buffered: usize,
    pub capacity: usize,
}
