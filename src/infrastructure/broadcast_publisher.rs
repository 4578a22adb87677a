use async_trait::async_trait;

use crate::application::{AppResult, SignalPublisher};
use crate::domain::SignalRecord;
use crate::infrastructure::signal_bus::SignalBus;

pub struct BroadcastPublisher {
    bus: SignalBus,
}

impl BroadcastPublisher {
    pub fn new(bus: SignalBus) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl SignalPublisher for BroadcastPublisher {
    async fn publish(&self, record: &SignalRecord) -> AppResult<()> {
        let reached = self.bus.publish(record.clone());
        tracing::debug!(signal_id = %record.signal.signal_id, reached, "signal broadcast");
        Ok(())
    }
}
