use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::application::{AppError, AppResult, Clock, SignalSource};
use crate::domain::{SignalSubmission, TradingSignal};

/// Tails a JSON-lines file of `SignalSubmission`s.
///
/// Only complete (newline-terminated) lines are consumed; a partially written
/// last line is picked up on a later poll. Malformed lines are logged and
/// skipped. If the file shrinks it is treated as rotated and read from the
/// start again.
pub struct JsonlInboxSource {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    offset: Mutex<u64>,
}

impl JsonlInboxSource {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            offset: Mutex::new(0),
        }
    }

    /// Take the not-yet-consumed complete lines and advance the offset past them.
    fn take_complete_lines(&self, bytes: &[u8]) -> AppResult<Vec<u8>> {
        let mut offset = self
            .offset
            .lock()
            .map_err(|_| AppError::Source("lock poisoned".into()))?;

        if (bytes.len() as u64) < *offset {
            tracing::warn!(path = %self.path.display(), "inbox shrank, reading from start");
            *offset = 0;
        }

        let pending = &bytes[*offset as usize..];
        let Some(last_newline) = pending.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete = &pending[..=last_newline];
        *offset += complete.len() as u64;
        Ok(complete.to_vec())
    }
}

#[async_trait]
impl SignalSource for JsonlInboxSource {
    async fn poll(&self) -> AppResult<Vec<TradingSignal>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Source(format!(
                    "read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let complete = self.take_complete_lines(&bytes)?;
        let now = self.clock.now_millis();
        let text = String::from_utf8_lossy(&complete);

        let mut out = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let submission: SignalSubmission = match serde_json::from_str(line) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), "skipping malformed inbox line: {e}");
                    continue;
                }
            };
            match submission.into_signal(now) {
                Ok(signal) => out.push(signal),
                Err(e) => tracing::warn!(path = %self.path.display(), "skipping invalid signal: {e}"),
            }
        }

        if !out.is_empty() {
            tracing::debug!(count = out.len(), "inbox signals read");
        }
        Ok(out)
    }
}
