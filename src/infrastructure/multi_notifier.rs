use async_trait::async_trait;

use crate::application::{AppError, AppResult, Notifier};
use crate::domain::TradingSignal;

/// Fans one signal out to every channel, even when an earlier one fails.
pub struct MultiNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    async fn notify(&self, signal: &TradingSignal) -> AppResult<()> {
        let mut failures = Vec::new();
        for n in &self.notifiers {
            if let Err(e) = n.notify(signal).await {
                tracing::warn!(signal_id = %signal.signal_id, "notifier failed: {e}");
                failures.push(e);
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            n => Err(AppError::Notifier(format!(
                "{n} of {} channels failed: {}",
                self.notifiers.len(),
                failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            ))),
        }
    }
}
