use serde::{Deserialize, Serialize};

use super::{BlockReason, Side, Symbol, SymbolError, Timestamp};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub signal_id: String, // idempotency key
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// 0..=100
    pub confidence: Option<f64>,
    pub strategy: Option<String>,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

impl TradingSignal {
    /// Deterministic id for submitters that do not provide one.
    pub fn make_signal_id(symbol: &Symbol, side: Side, entry_price: f64, created_at: Timestamp) -> String {
        format!("{}|{}|{}|{}", symbol, side, entry_price, created_at)
    }
}

/// Wire shape accepted from producers (HTTP body, inbox line).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SignalSubmission {
    pub signal_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub confidence: Option<f64>,
    pub strategy: Option<String>,
    pub note: Option<String>,
    pub created_at: Option<Timestamp>,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SignalError {
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    #[error("{field} must be a positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("confidence must be within 0..=100, got {0}")]
    Confidence(f64),
    #[error("signal_id must not contain control characters")]
    InvalidId,
}

impl SignalSubmission {
    pub fn into_signal(self, now: Timestamp) -> Result<TradingSignal, SignalError> {
        let symbol = Symbol::parse(&self.symbol)?;

        positive("entry_price", self.entry_price)?;
        if let Some(v) = self.stop_loss {
            positive("stop_loss", v)?;
        }
        if let Some(v) = self.take_profit {
            positive("take_profit", v)?;
        }
        if let Some(c) = self.confidence {
            if !(0.0..=100.0).contains(&c) {
                return Err(SignalError::Confidence(c));
            }
        }

        let created_at = self.created_at.unwrap_or(now);
        let signal_id = match self.signal_id {
            Some(id) if id.chars().any(char::is_control) => return Err(SignalError::InvalidId),
            Some(id) if !id.trim().is_empty() => id,
            _ => TradingSignal::make_signal_id(&symbol, self.side, self.entry_price, created_at),
        };

        Ok(TradingSignal {
            signal_id,
            symbol,
            side: self.side,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            confidence: self.confidence,
            strategy: self.strategy,
            note: self.note,
            created_at,
        })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), SignalError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SignalError::NotPositive { field, value })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalOutcome {
    Dispatched,
    Blocked {
        reason: BlockReason,
        message: String,
        next_allowed_time: Option<Timestamp>,
    },
    /// Same signal_id was already dispatched; cooldowns untouched.
    Duplicate,
}

impl SignalOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            SignalOutcome::Dispatched => OutcomeKind::Dispatched,
            SignalOutcome::Blocked { .. } => OutcomeKind::Blocked,
            SignalOutcome::Duplicate => OutcomeKind::Duplicate,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Dispatched,
    Blocked,
    Duplicate,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Dispatched => "dispatched",
            OutcomeKind::Blocked => "blocked",
            OutcomeKind::Duplicate => "duplicate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dispatched" => Some(OutcomeKind::Dispatched),
            "blocked" => Some(OutcomeKind::Blocked),
            "duplicate" => Some(OutcomeKind::Duplicate),
            _ => None,
        }
    }
}

/// One row of the dispatch audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub signal: TradingSignal,
    pub outcome: SignalOutcome,
    pub decided_at: Timestamp,
}
