//! Queueing and batching between the ingest endpoint and the producer.
//!
//! The ingest endpoint offers accepted envelopes to an [`EnvelopeQueue`];
//! a [`WorkerPool`] of long-running workers takes from the queue,
//! accumulates batches by size or time, and drives the producer.

pub mod pool;
pub mod queue;
mod worker;

pub use pool::{WorkerPool, WorkerPoolConfig};
pub use queue::{EnvelopeQueue, OfferOutcome, Take};
