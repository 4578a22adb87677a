use async_trait::async_trait;

use crate::application::{AppResult, Notifier};
use crate::domain::TradingSignal;

pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, signal: &TradingSignal) -> AppResult<()> {
        println!(
            "SIGNAL: {} {} @ {} sl={} tp={} id={}",
            signal.side,
            signal.symbol,
            signal.entry_price,
            signal
                .stop_loss
                .map(|v| v.to_string())
                .unwrap_or_else(|| "(none)".into()),
            signal
                .take_profit
                .map(|v| v.to_string())
                .unwrap_or_else(|| "(none)".into()),
            signal.signal_id
        );
        Ok(())
    }
}
