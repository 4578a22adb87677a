use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CooldownPolicy, Symbol, Timestamp};

/// Which gate rejected a signal. Gates are evaluated in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockReason {
    StartupCooldown,
    GlobalCooldown,
    SymbolCooldown,
    MinSpacing,
}

impl BlockReason {
    pub fn tag(&self) -> &'static str {
        match self {
            BlockReason::StartupCooldown => "STARTUP_COOLDOWN",
            BlockReason::GlobalCooldown => "GLOBAL_COOLDOWN",
            BlockReason::SymbolCooldown => "SYMBOL_COOLDOWN",
            BlockReason::MinSpacing => "MIN_SPACING",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Result of asking whether a symbol may emit a signal right now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<BlockReason>,
    /// Human readable, prefixed with the reason tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_allowed_time: Option<Timestamp>,
}

impl Eligibility {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
            next_allowed_time: None,
        }
    }

    pub fn block(reason: BlockReason, message: String, next_allowed_time: Timestamp) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            message: Some(message),
            next_allowed_time: Some(next_allowed_time),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCooldown {
    pub symbol: Symbol,
    pub until: Timestamp,
    pub remaining_ms: i64,
}

/// Point-in-time snapshot of every gate, for dashboards and the HTTP API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownStatus {
    pub now: Timestamp,
    pub startup_complete: bool,
    pub startup_remaining_ms: i64,
    pub global_cooldown_remaining_ms: i64,
    pub last_signal_time: Option<Timestamp>,
    /// Only unexpired entries, sorted by symbol.
    pub symbol_cooldowns: Vec<SymbolCooldown>,
    /// Earliest still-future gate deadline of any kind, or `now` if none is pending.
    pub next_signal_allowed: Timestamp,
    /// Earliest instant a symbol without its own cooldown would pass every gate.
    pub next_new_symbol_allowed: Timestamp,
}

/// The mutable bookkeeping behind the gates. Expiry is lazy: a deadline in the
/// past simply stops blocking.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CooldownState {
    /// 0 until the first signal is recorded.
    pub last_signal_time: Timestamp,
    pub global_cooldown_until: Timestamp,
    pub symbol_cooldowns: HashMap<Symbol, Timestamp>,
    pub startup_cooldown_until: Timestamp,
}

impl CooldownState {
    pub fn new(now: Timestamp, policy: &CooldownPolicy) -> Self {
        Self {
            startup_cooldown_until: now.saturating_add(policy.startup_ms()),
            ..Self::default()
        }
    }

    /// First blocking gate wins: startup, global, symbol, spacing.
    pub fn check(&self, symbol: &Symbol, now: Timestamp, policy: &CooldownPolicy) -> Eligibility {
        if now < self.startup_cooldown_until {
            let until = self.startup_cooldown_until;
            return Eligibility::block(
                BlockReason::StartupCooldown,
                format!(
                    "STARTUP_COOLDOWN: warming up, {} minute(s) remaining",
                    ceil_minutes(until - now)
                ),
                until,
            );
        }

        if now < self.global_cooldown_until {
            let until = self.global_cooldown_until;
            return Eligibility::block(
                BlockReason::GlobalCooldown,
                format!(
                    "GLOBAL_COOLDOWN: next signal allowed at {} ({} minute(s) remaining)",
                    clock_time(until),
                    ceil_minutes(until - now)
                ),
                until,
            );
        }

        let symbol_until = self.symbol_cooldowns.get(symbol).copied().unwrap_or(0);
        if now < symbol_until {
            return Eligibility::block(
                BlockReason::SymbolCooldown,
                format!(
                    "SYMBOL_COOLDOWN: {} blocked until {} ({} minute(s) remaining)",
                    symbol,
                    clock_time(symbol_until),
                    ceil_minutes(symbol_until - now)
                ),
                symbol_until,
            );
        }

        if self.last_signal_time > 0 {
            let until = self.last_signal_time.saturating_add(policy.spacing_ms());
            if now < until {
                return Eligibility::block(
                    BlockReason::MinSpacing,
                    format!(
                        "MIN_SPACING: {}s since last signal, minimum spacing is {}s",
                        (now - self.last_signal_time).max(0) / 1000,
                        policy.spacing_ms() / 1000
                    ),
                    until,
                );
            }
        }

        Eligibility::allow()
    }

    /// Arms the global and symbol cooldowns from `now`. Never moves a deadline
    /// backwards, so a clock step back cannot shorten an active cooldown.
    pub fn record(&mut self, symbol: &Symbol, now: Timestamp, policy: &CooldownPolicy) {
        self.prune_expired(now);

        self.last_signal_time = self.last_signal_time.max(now);
        self.global_cooldown_until = self
            .global_cooldown_until
            .max(now.saturating_add(policy.global_ms()));

        let until = now.saturating_add(policy.symbol_ms());
        let entry = self.symbol_cooldowns.entry(symbol.clone()).or_insert(until);
        *entry = (*entry).max(until);
    }

    pub fn status(&self, now: Timestamp, policy: &CooldownPolicy) -> CooldownStatus {
        let mut symbol_cooldowns: Vec<SymbolCooldown> = self
            .symbol_cooldowns
            .iter()
            .filter(|(_, until)| **until > now)
            .map(|(symbol, until)| SymbolCooldown {
                symbol: symbol.clone(),
                until: *until,
                remaining_ms: *until - now,
            })
            .collect();
        symbol_cooldowns.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let spacing_until = (self.last_signal_time > 0)
            .then(|| self.last_signal_time.saturating_add(policy.spacing_ms()));

        let next_signal_allowed = [
            Some(self.startup_cooldown_until),
            Some(self.global_cooldown_until),
            spacing_until,
        ]
        .into_iter()
        .flatten()
        .chain(symbol_cooldowns.iter().map(|c| c.until))
        .filter(|t| *t > now)
        .min()
        .unwrap_or(now);

        let next_new_symbol_allowed = [
            self.startup_cooldown_until,
            self.global_cooldown_until,
            spacing_until.unwrap_or(0),
        ]
        .into_iter()
        .fold(now, Timestamp::max);

        CooldownStatus {
            now,
            startup_complete: now >= self.startup_cooldown_until,
            startup_remaining_ms: (self.startup_cooldown_until - now).max(0),
            global_cooldown_remaining_ms: (self.global_cooldown_until - now).max(0),
            last_signal_time: (self.last_signal_time > 0).then_some(self.last_signal_time),
            symbol_cooldowns,
            next_signal_allowed,
            next_new_symbol_allowed,
        }
    }

    /// Leaves the startup window alone.
    pub fn clear_all(&mut self) {
        self.last_signal_time = 0;
        self.global_cooldown_until = 0;
        self.symbol_cooldowns.clear();
    }

    pub fn clear_symbol(&mut self, symbol: &Symbol) -> bool {
        self.symbol_cooldowns.remove(symbol).is_some()
    }

    pub fn reset_startup(&mut self, now: Timestamp, policy: &CooldownPolicy) {
        self.startup_cooldown_until = now.saturating_add(policy.startup_ms());
    }

    /// Drops symbol entries whose deadline has passed. Returns how many went.
    pub fn prune_expired(&mut self, now: Timestamp) -> usize {
        let before = self.symbol_cooldowns.len();
        self.symbol_cooldowns.retain(|_, until| *until > now);
        before - self.symbol_cooldowns.len()
    }
}

fn ceil_minutes(ms: i64) -> i64 {
    if ms <= 0 {
        return 0;
    }
    (ms + 59_999) / 60_000
}

/// Local wall-clock rendering for messages. Cosmetic only.
fn clock_time(ts: Timestamp) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| ts.to_string())
}
