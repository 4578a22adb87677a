use crate::domain::{OutcomeKind, SignalRecord, Symbol, Timestamp, TradingSignal};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("source error: {0}")]
    Source(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("notifier error: {0}")]
    Notifier(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("invalid signal: {0}")]
    Invalid(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Clone, Debug)]
pub struct SignalQuery {
    pub since: Option<Timestamp>,
    pub limit: u32,
    pub symbol: Option<Symbol>,
    pub outcome: Option<OutcomeKind>,
}

impl Default for SignalQuery {
    fn default() -> Self {
        Self {
            since: None,
            limit: 100,
            symbol: None,
            outcome: None,
        }
    }
}

impl SignalQuery {
    pub fn matches(&self, record: &SignalRecord) -> bool {
        if let Some(since) = self.since {
            if record.decided_at < since {
                return false;
            }
        }
        if let Some(symbol) = &self.symbol {
            if record.signal.symbol != *symbol {
                return false;
            }
        }
        if let Some(kind) = self.outcome {
            if record.outcome.kind() != kind {
                return false;
            }
        }
        true
    }
}

/// Source of "now" for every time-based decision.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Timestamp;
}

/// Yields signals that producers have queued since the last poll.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn poll(&self) -> AppResult<Vec<TradingSignal>>;
}

/// Idempotency + dispatch audit log.
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn has_seen(&self, signal_id: &str) -> AppResult<bool>;
    async fn mark_seen(&self, signal_id: &str) -> AppResult<()>;

    async fn append_record(&self, record: &SignalRecord) -> AppResult<()>;

    /// Newest first.
    async fn list_records(&self, query: SignalQuery) -> AppResult<Vec<SignalRecord>>;
}

/// Deliver dispatched signals to people.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, signal: &TradingSignal) -> AppResult<()>;
}

#[async_trait]
pub trait SignalPublisher: Send + Sync {
    async fn publish(&self, record: &SignalRecord) -> AppResult<()>;
}
