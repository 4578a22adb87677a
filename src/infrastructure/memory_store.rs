use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::application::{AppError, AppResult, SignalQuery, SignalStore};
use crate::domain::SignalRecord;

/// Records kept by [`InMemorySignalStore::new`].
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Process-local store.
///
/// The record log keeps the newest `max_records` entries and drops the oldest.
/// The seen set only holds dispatched ids, which the global cooldown already
/// rate-limits, and is never trimmed so dedup stays exact for the process
/// lifetime.
#[derive(Clone)]
pub struct InMemorySignalStore {
    inner: Arc<Mutex<Inner>>,
    max_records: usize,
}

#[derive(Default)]
struct Inner {
    seen: HashSet<String>,
    records: VecDeque<SignalRecord>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::with_max_records(DEFAULT_MAX_RECORDS)
    }

    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_records: max_records.max(1),
        }
    }
}

impl Default for InMemorySignalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn has_seen(&self, signal_id: &str) -> AppResult<bool> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        Ok(inner.seen.contains(signal_id))
    }

    async fn mark_seen(&self, signal_id: &str) -> AppResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        inner.seen.insert(signal_id.to_string());
        Ok(())
    }

    async fn append_record(&self, record: &SignalRecord) -> AppResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        if inner.records.len() >= self.max_records {
            inner.records.pop_front();
        }
        inner.records.push_back(record.clone());
        Ok(())
    }

    async fn list_records(&self, query: SignalQuery) -> AppResult<Vec<SignalRecord>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))?;
        // newest first (records are pushed at the end)
        Ok(inner
            .records
            .iter()
            .rev()
            .filter(|r| query.matches(r))
            .take(query.limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SignalOutcome, Side, Symbol, TradingSignal};

    fn record(id: &str, at: i64) -> SignalRecord {
        SignalRecord {
            signal: TradingSignal {
                signal_id: id.to_string(),
                symbol: Symbol::parse("BTCUSDT").unwrap(),
                side: Side::Sell,
                entry_price: 1.0,
                stop_loss: None,
                take_profit: None,
                confidence: None,
                strategy: None,
                note: None,
                created_at: at,
            },
            outcome: SignalOutcome::Duplicate,
            decided_at: at,
        }
    }

    #[tokio::test]
    async fn record_log_drops_oldest_past_capacity() {
        let store = InMemorySignalStore::with_max_records(3);
        for i in 0..5 {
            store.append_record(&record(&format!("r-{i}"), i)).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_records(SignalQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.signal.signal_id)
            .collect();
        assert_eq!(ids, vec!["r-4", "r-3", "r-2"]);
    }
}
