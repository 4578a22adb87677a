use std::time::Duration;

use super::Timestamp;

/// Durations of the four signal gates. A zero duration disables that gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// One-time grace window after construction.
    pub startup_cooldown: Duration,
    /// Shared by every symbol, re-armed on each accepted signal.
    pub global_cooldown: Duration,
    /// Re-armed only for the symbol that was accepted.
    pub symbol_cooldown: Duration,
    /// Smallest gap between two accepted signals system-wide.
    pub min_signal_spacing: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            startup_cooldown: Duration::from_secs(5 * 60),
            global_cooldown: Duration::from_secs(3 * 60),
            symbol_cooldown: Duration::from_secs(30 * 60),
            min_signal_spacing: Duration::from_secs(2 * 60),
        }
    }
}

impl CooldownPolicy {
    pub fn startup_ms(&self) -> Timestamp {
        to_millis(self.startup_cooldown)
    }

    pub fn global_ms(&self) -> Timestamp {
        to_millis(self.global_cooldown)
    }

    pub fn symbol_ms(&self) -> Timestamp {
        to_millis(self.symbol_cooldown)
    }

    pub fn spacing_ms(&self) -> Timestamp {
        to_millis(self.min_signal_spacing)
    }
}

fn to_millis(d: Duration) -> Timestamp {
    Timestamp::try_from(d.as_millis()).unwrap_or(Timestamp::MAX)
}
