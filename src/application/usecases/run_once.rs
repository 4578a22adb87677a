use serde::Serialize;

use crate::application::usecases::DispatchSignalUseCase;
use crate::application::{AppResult, SignalSource};
use crate::domain::OutcomeKind;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dispatched: u32,
    pub blocked: u32,
    pub duplicate: u32,
    pub failed: u32,
}

pub struct RunOnceUseCase<'a> {
    pub source: &'a dyn SignalSource,
    pub dispatch: DispatchSignalUseCase<'a>,
}

impl<'a> RunOnceUseCase<'a> {
    /// Drains the source in order. One failing signal does not stop the rest.
    pub async fn execute(&self) -> AppResult<RunSummary> {
        let signals = self.source.poll().await?;
        let mut summary = RunSummary::default();

        for signal in signals {
            let signal_id = signal.signal_id.clone();
            match self.dispatch.execute(signal).await {
                Ok(record) => match record.outcome.kind() {
                    OutcomeKind::Dispatched => summary.dispatched += 1,
                    OutcomeKind::Blocked => summary.blocked += 1,
                    OutcomeKind::Duplicate => summary.duplicate += 1,
                },
                Err(e) => {
                    tracing::error!(signal_id = %signal_id, "dispatch failed: {e}");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}
