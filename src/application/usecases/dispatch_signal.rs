use crate::application::{
    AppResult, Notifier, SignalCooldownManager, SignalPublisher, SignalStore,
};
use crate::domain::{SignalOutcome, SignalRecord, TradingSignal};

pub struct DispatchSignalUseCase<'a> {
    pub gate: &'a SignalCooldownManager,
    pub store: &'a dyn SignalStore,
    pub notifier: &'a dyn Notifier,
    pub publisher: Option<&'a dyn SignalPublisher>,
}

impl<'a> DispatchSignalUseCase<'a> {
    /// Gate, log and deliver one signal.
    ///
    /// Only dispatched signals are marked as seen, so a signal rejected by a
    /// cooldown, or one whose record could not be stored, can be submitted
    /// again later. A notifier failure is returned as
    /// an error after the cooldowns are armed and the record is stored.
    pub async fn execute(&self, signal: TradingSignal) -> AppResult<SignalRecord> {
        if self.store.has_seen(&signal.signal_id).await? {
            tracing::debug!(signal_id = %signal.signal_id, "duplicate signal ignored");
            let record = self.record(signal, SignalOutcome::Duplicate);
            self.store.append_record(&record).await?;
            return Ok(record);
        }

        let eligibility = self.gate.try_acquire(&signal.symbol);
        if let Some(reason) = eligibility.reason {
            tracing::info!(
                symbol = %signal.symbol,
                reason = %reason,
                next_allowed_time = ?eligibility.next_allowed_time,
                "signal blocked"
            );
            let record = self.record(
                signal,
                SignalOutcome::Blocked {
                    reason,
                    message: eligibility.message.unwrap_or_default(),
                    next_allowed_time: eligibility.next_allowed_time,
                },
            );
            self.store.append_record(&record).await?;
            return Ok(record);
        }

        // mark seen only after the record is stored
        let record = self.record(signal, SignalOutcome::Dispatched);
        self.store.append_record(&record).await?;
        self.store.mark_seen(&record.signal.signal_id).await?;

        if let Some(publisher) = self.publisher {
            if let Err(e) = publisher.publish(&record).await {
                tracing::warn!("publish failed: {e}");
            }
        }

        tracing::info!(
            symbol = %record.signal.symbol,
            side = %record.signal.side,
            signal_id = %record.signal.signal_id,
            "signal dispatched"
        );
        self.notifier.notify(&record.signal).await?;

        Ok(record)
    }

    fn record(&self, signal: TradingSignal, outcome: SignalOutcome) -> SignalRecord {
        SignalRecord {
            signal,
            outcome,
            decided_at: self.gate.now(),
        }
    }
}
