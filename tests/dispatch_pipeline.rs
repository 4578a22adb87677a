use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use signalgate::application::usecases::{DispatchSignalUseCase, RunOnceUseCase, RunSummary};
use signalgate::application::{
    AppError, AppResult, Notifier, SignalCooldownManager, SignalQuery, SignalStore,
};
use signalgate::domain::{
    BlockReason, CooldownPolicy, OutcomeKind, Side, SignalOutcome, SignalRecord, Symbol,
    Timestamp, TradingSignal,
};
use signalgate::infrastructure::{
    broadcast_publisher::BroadcastPublisher, clock::ManualClock, memory_store::InMemorySignalStore,
    signal_bus::SignalBus, static_source::StaticSignalSource,
};

const T0: Timestamp = 1_750_000_000_000;
const MIN: i64 = 60_000;

#[derive(Clone, Default)]
struct CountingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl CountingNotifier {
    fn new() -> Self {
        Self::default()
    }
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
    fn get(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, signal: &TradingSignal) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Notifier("channel down".into()));
        }
        self.sent.lock().unwrap().push(signal.signal_id.clone());
        Ok(())
    }
}

/// Store whose first write of a dispatched record fails.
#[derive(Default)]
struct FailOnceStore {
    inner: InMemorySignalStore,
    failed: Mutex<bool>,
}

#[async_trait]
impl SignalStore for FailOnceStore {
    async fn has_seen(&self, signal_id: &str) -> AppResult<bool> {
        self.inner.has_seen(signal_id).await
    }

    async fn mark_seen(&self, signal_id: &str) -> AppResult<()> {
        self.inner.mark_seen(signal_id).await
    }

    async fn append_record(&self, record: &SignalRecord) -> AppResult<()> {
        if record.outcome == SignalOutcome::Dispatched {
            let mut failed = self.failed.lock().unwrap();
            if !*failed {
                *failed = true;
                return Err(AppError::Storage("disk full".into()));
            }
        }
        self.inner.append_record(record).await
    }

    async fn list_records(&self, query: SignalQuery) -> AppResult<Vec<SignalRecord>> {
        self.inner.list_records(query).await
    }
}

fn signal(id: &str, symbol: &str) -> TradingSignal {
    TradingSignal {
        signal_id: id.to_string(),
        symbol: Symbol::parse(symbol).unwrap(),
        side: Side::Buy,
        entry_price: 100.0,
        stop_loss: Some(95.0),
        take_profit: Some(110.0),
        confidence: Some(80.0),
        strategy: Some("breakout".into()),
        note: None,
        created_at: T0,
    }
}

/// Gate whose startup window is already over.
fn warm_gate() -> (SignalCooldownManager, ManualClock) {
    let clock = ManualClock::new(T0);
    let gate = SignalCooldownManager::new(CooldownPolicy::default(), Arc::new(clock.clone()));
    clock.advance(Duration::from_secs(10 * 60));
    (gate, clock)
}

#[tokio::test]
async fn should_notify_only_once_for_same_signal() {
    let (gate, clock) = warm_gate();
    let store = InMemorySignalStore::new();
    let notifier = CountingNotifier::new();
    let dispatch = DispatchSignalUseCase {
        gate: &gate,
        store: &store,
        notifier: &notifier,
        publisher: None,
    };

    let first = dispatch.execute(signal("s-1", "BTCUSDT")).await.unwrap();
    assert_eq!(first.outcome, SignalOutcome::Dispatched);

    // well past every cooldown: the repeat is still a duplicate
    clock.advance(Duration::from_secs(60 * 60));
    let second = dispatch.execute(signal("s-1", "BTCUSDT")).await.unwrap();
    assert_eq!(second.outcome, SignalOutcome::Duplicate);
    assert_eq!(notifier.get(), 1);

    // duplicates do not re-arm cooldowns
    assert!(gate.can_send_signal(&Symbol::parse("BTCUSDT").unwrap()).allowed);
}

#[tokio::test]
async fn blocked_signal_is_logged_and_can_be_resubmitted() {
    let (gate, clock) = warm_gate();
    let store = InMemorySignalStore::new();
    let notifier = CountingNotifier::new();
    let dispatch = DispatchSignalUseCase {
        gate: &gate,
        store: &store,
        notifier: &notifier,
        publisher: None,
    };

    dispatch.execute(signal("a", "BTCUSDT")).await.unwrap();
    let blocked = dispatch.execute(signal("b", "ETHUSDT")).await.unwrap();
    match &blocked.outcome {
        SignalOutcome::Blocked {
            reason,
            next_allowed_time,
            message,
        } => {
            assert_eq!(*reason, BlockReason::GlobalCooldown);
            assert_eq!(*next_allowed_time, Some(T0 + 13 * MIN));
            assert!(message.starts_with("GLOBAL_COOLDOWN"));
        }
        other => panic!("expected blocked, got {other:?}"),
    }

    clock.advance(Duration::from_secs(3 * 60));
    let retry = dispatch.execute(signal("b", "ETHUSDT")).await.unwrap();
    assert_eq!(retry.outcome, SignalOutcome::Dispatched);
    assert_eq!(notifier.get(), 2);

    let blocked_only = store
        .list_records(SignalQuery {
            outcome: Some(OutcomeKind::Blocked),
            ..SignalQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(blocked_only.len(), 1);
    assert_eq!(blocked_only[0].signal.signal_id, "b");
}

#[tokio::test]
async fn notifier_failure_still_arms_cooldown() {
    let (gate, _clock) = warm_gate();
    let store = InMemorySignalStore::new();
    let notifier = CountingNotifier::failing();
    let dispatch = DispatchSignalUseCase {
        gate: &gate,
        store: &store,
        notifier: &notifier,
        publisher: None,
    };

    let err = dispatch.execute(signal("x", "BTCUSDT")).await.unwrap_err();
    assert!(matches!(err, AppError::Notifier(_)));

    assert!(store.has_seen("x").await.unwrap());
    assert!(!gate.can_send_signal(&Symbol::parse("SOLUSDT").unwrap()).allowed);
}

#[tokio::test]
async fn dispatched_signals_are_published() {
    let (gate, _clock) = warm_gate();
    let store = InMemorySignalStore::new();
    let notifier = CountingNotifier::new();
    let bus = SignalBus::new(16);
    let mut rx = bus.subscribe();
    let publisher = BroadcastPublisher::new(bus.clone());
    let dispatch = DispatchSignalUseCase {
        gate: &gate,
        store: &store,
        notifier: &notifier,
        publisher: Some(&publisher),
    };

    dispatch.execute(signal("p-1", "BTCUSDT")).await.unwrap();
    dispatch.execute(signal("p-2", "ETHUSDT")).await.unwrap(); // blocked, not published

    let got = rx.recv().await.unwrap();
    assert_eq!(got.signal.signal_id, "p-1");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn run_once_drains_source_and_counts_outcomes() {
    let (gate, clock) = warm_gate();
    let store = InMemorySignalStore::new();
    let notifier = CountingNotifier::new();
    let source = StaticSignalSource::new(vec![
        signal("r-1", "BTCUSDT"),
        signal("r-2", "ETHUSDT"),
        signal("r-1", "BTCUSDT"),
    ]);

    let run_once = RunOnceUseCase {
        source: &source,
        dispatch: DispatchSignalUseCase {
            gate: &gate,
            store: &store,
            notifier: &notifier,
            publisher: None,
        },
    };

    let summary = run_once.execute().await.unwrap();
    assert_eq!(
        summary,
        RunSummary {
            dispatched: 1,
            blocked: 1,
            duplicate: 1,
            failed: 0,
        }
    );

    // empty source is a no-op
    assert_eq!(run_once.execute().await.unwrap(), RunSummary::default());

    clock.advance(Duration::from_secs(3 * 60));
    source.push(signal("r-2", "ETHUSDT")).unwrap();
    assert_eq!(run_once.execute().await.unwrap().dispatched, 1);
    assert_eq!(notifier.get(), 2);

    let all = store.list_records(SignalQuery::default()).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].signal.signal_id, "r-2"); // newest first
}

#[tokio::test]
async fn run_once_counts_failures_and_continues() {
    let clock = ManualClock::new(T0);
    let gate = SignalCooldownManager::new(
        CooldownPolicy {
            startup_cooldown: Duration::ZERO,
            global_cooldown: Duration::ZERO,
            symbol_cooldown: Duration::ZERO,
            min_signal_spacing: Duration::ZERO,
        },
        Arc::new(clock),
    );
    let store = InMemorySignalStore::new();
    let notifier = CountingNotifier::failing();
    let source = StaticSignalSource::new(vec![signal("f-1", "BTCUSDT"), signal("f-2", "ETHUSDT")]);

    let run_once = RunOnceUseCase {
        source: &source,
        dispatch: DispatchSignalUseCase {
            gate: &gate,
            store: &store,
            notifier: &notifier,
            publisher: None,
        },
    };

    let summary = run_once.execute().await.unwrap();
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.dispatched, 0);
}

#[tokio::test]
async fn failed_record_write_leaves_signal_retryable() {
    let (gate, clock) = warm_gate();
    let store = FailOnceStore::default();
    let notifier = CountingNotifier::new();
    let dispatch = DispatchSignalUseCase {
        gate: &gate,
        store: &store,
        notifier: &notifier,
        publisher: None,
    };

    let err = dispatch.execute(signal("w-1", "BTCUSDT")).await.unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    assert!(!store.has_seen("w-1").await.unwrap());
    assert_eq!(notifier.get(), 0);

    clock.advance(Duration::from_secs(60 * 60));
    let retry = dispatch.execute(signal("w-1", "BTCUSDT")).await.unwrap();
    assert_eq!(retry.outcome, SignalOutcome::Dispatched);
    assert_eq!(notifier.get(), 1);
    assert!(store.has_seen("w-1").await.unwrap());
}
