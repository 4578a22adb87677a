use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::{AppError, AppResult, SignalSource};
use crate::domain::TradingSignal;

/// Fixed in-memory queue. Each poll drains everything pushed so far.
#[derive(Default)]
pub struct StaticSignalSource {
    queue: Mutex<VecDeque<TradingSignal>>,
}

impl StaticSignalSource {
    pub fn new(signals: Vec<TradingSignal>) -> Self {
        Self {
            queue: Mutex::new(signals.into()),
        }
    }

    pub fn push(&self, signal: TradingSignal) -> AppResult<()> {
        self.queue
            .lock()
            .map_err(|_| AppError::Source("lock poisoned".into()))?
            .push_back(signal);
        Ok(())
    }
}

#[async_trait]
impl SignalSource for StaticSignalSource {
    async fn poll(&self) -> AppResult<Vec<TradingSignal>> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| AppError::Source("lock poisoned".into()))?;
        Ok(queue.drain(..).collect())
    }
}
