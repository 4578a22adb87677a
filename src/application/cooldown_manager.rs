use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::application::Clock;
use crate::domain::{CooldownPolicy, CooldownState, CooldownStatus, Eligibility, Symbol, Timestamp};

/// Rate gate in front of signal emission.
///
/// Four independent restrictions are layered: a one-time startup window, a
/// global cooldown shared by all symbols, a per-symbol cooldown and a minimum
/// spacing between any two accepted signals. The state lives in memory for the
/// lifetime of the manager and is never persisted.
///
/// Every method takes the internal lock exactly once, so the manager can be
/// shared across tasks behind an `Arc`. Callers that check and then record
/// should use [`SignalCooldownManager::try_acquire`], which does both inside a
/// single critical section.
pub struct SignalCooldownManager {
    policy: CooldownPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<CooldownState>,
}

impl SignalCooldownManager {
    pub fn new(policy: CooldownPolicy, clock: Arc<dyn Clock>) -> Self {
        let state = CooldownState::new(clock.now_millis(), &policy);
        tracing::info!(
            startup_until = state.startup_cooldown_until,
            "signal cooldown manager started"
        );
        Self {
            policy,
            clock,
            state: Mutex::new(state),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now_millis()
    }

    /// Read-only eligibility check.
    pub fn can_send_signal(&self, symbol: &Symbol) -> Eligibility {
        let now = self.now();
        self.state().check(symbol, now, &self.policy)
    }

    /// Arms the cooldowns unconditionally. Does not check eligibility.
    pub fn record_signal_sent(&self, symbol: &Symbol) {
        let now = self.now();
        let mut state = self.state();
        state.record(symbol, now, &self.policy);
        tracing::info!(
            symbol = %symbol,
            global_until = state.global_cooldown_until,
            "signal recorded, cooldowns armed"
        );
    }

    /// Check and record in one step. Records only when allowed.
    pub fn try_acquire(&self, symbol: &Symbol) -> Eligibility {
        let now = self.now();
        let mut state = self.state();
        let eligibility = state.check(symbol, now, &self.policy);
        if eligibility.allowed {
            state.record(symbol, now, &self.policy);
            tracing::debug!(symbol = %symbol, "cooldown slot acquired");
        }
        eligibility
    }

    pub fn get_status(&self) -> CooldownStatus {
        let now = self.now();
        self.state().status(now, &self.policy)
    }

    pub fn is_startup_complete(&self) -> bool {
        let now = self.now();
        now >= self.state().startup_cooldown_until
    }

    pub fn reset_startup_cooldown(&self) {
        let now = self.now();
        let mut state = self.state();
        state.reset_startup(now, &self.policy);
        tracing::warn!(
            startup_until = state.startup_cooldown_until,
            "startup cooldown re-armed"
        );
    }

    /// Admin override. The startup window stays armed.
    pub fn clear_all_cooldowns(&self) {
        self.state().clear_all();
        tracing::warn!("all cooldowns cleared");
    }

    pub fn clear_symbol_cooldown(&self, symbol: &Symbol) {
        if self.state().clear_symbol(symbol) {
            tracing::warn!(symbol = %symbol, "symbol cooldown cleared");
        }
    }

    pub fn prune_expired(&self) -> usize {
        let now = self.now();
        self.state().prune_expired(now)
    }

    // Writes are plain field stores, so a poisoned state is still consistent.
    fn state(&self) -> MutexGuard<'_, CooldownState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
