use tokio::sync::broadcast;

use crate::domain::SignalRecord;

/// In-process fan-out of dispatched signals to live subscribers (SSE clients).
#[derive(Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<SignalRecord>,
}

impl SignalBus {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalRecord> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers received the record. Slow subscribers lag
    /// and skip what they missed.
    pub fn publish(&self, record: SignalRecord) -> usize {
        self.tx.send(record).unwrap_or(0)
    }
}
