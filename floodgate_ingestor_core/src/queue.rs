use floodgate_core::Envelope;
use tokio_util::sync::CancellationToken;

/// Result of a non-blocking offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    /// The queue is at capacity. This is the backpressure signal; the
    /// caller reports it per event and never blocks.
    Full,
    /// The queue was closed; no further envelopes are accepted.
    Closed,
}

/// Result of a blocking take.
#[derive(Debug)]
pub enum Take {
    Envelope(Envelope),
    /// The queue is closed and fully drained.
    Closed,
    /// The cancellation token fired while waiting.
    Cancelled,
}

/// Bounded multi-producer multi-consumer queue of accepted envelopes.
///
/// The queue owns accepted envelopes until a worker takes them. Offers are
/// FIFO per producer; takers race, so cross-taker ordering is up to the
/// broker's partition key. After [`close`](Self::close), remaining envelopes
/// are still handed to takers before `Closed` is reported.
#[derive(Clone)]
pub struct EnvelopeQueue {
    tx: async_channel::Sender<Envelope>,
    rx: async_channel::Receiver<Envelope>,
    capacity: usize,
}

impl EnvelopeQueue {
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = async_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Offer an envelope without blocking.
    pub fn offer(&self, envelope: Envelope) -> OfferOutcome {
        match self.tx.try_send(envelope) {
            Ok(()) => OfferOutcome::Accepted,
            Err(async_channel::TrySendError::Full(_)) => OfferOutcome::Full,
            Err(async_channel::TrySendError::Closed(_)) => OfferOutcome::Closed,
        }
    }

    /// Wait for the next envelope, queue closure, or cancellation.
    ///
    /// Pending envelopes win over a racing cancellation, so a cancelled
    /// taker still drains whatever was queued before the shutdown began.
    pub async fn take(&self, ct: &CancellationToken) -> Take {
        tokio::select! {
            biased;
            received = self.rx.recv() => match received {
                Ok(envelope) => Take::Envelope(envelope),
                Err(_) => Take::Closed,
            },
            _ = ct.cancelled() => Take::Cancelled,
        }
    }

    /// Take whatever is immediately available.
    pub fn try_take(&self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    /// Close the queue. Idempotent; offers fail afterwards and takers are
    /// woken once the backlog is consumed.
    pub fn close(&self) {
        self.tx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
