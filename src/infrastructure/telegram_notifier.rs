use async_trait::async_trait;
use serde::Serialize;

use crate::application::{AppError, AppResult, Notifier};
use crate::domain::{Side, TradingSignal};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Posts dispatched signals to a chat through the Bot API `sendMessage` call.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token,
            chat_id,
        }
    }

    /// Point at a Bot API compatible endpoint (self-hosted server, local stub).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, signal: &TradingSignal) -> AppResult<()> {
        let text = format_signal_text(signal);

        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            disable_web_page_preview: true,
        };

        // the URL embeds the bot token, keep it out of error messages
        self.client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notifier(e.without_url().to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Notifier(e.without_url().to_string()))?;

        Ok(())
    }
}

pub fn format_signal_text(signal: &TradingSignal) -> String {
    let mut lines = vec![];

    let arrow = match signal.side {
        Side::Buy => "🟢",
        Side::Sell => "🔴",
    };
    lines.push(format!("{} {} {}", arrow, signal.side, signal.symbol));
    lines.push(format!("Entry: {}", signal.entry_price));

    if let Some(sl) = signal.stop_loss {
        lines.push(format!("Stop loss: {}", sl));
    }
    if let Some(tp) = signal.take_profit {
        lines.push(format!("Take profit: {}", tp));
    }
    if let Some(c) = signal.confidence {
        lines.push(format!("Confidence: {:.0}%", c));
    }
    if let Some(s) = &signal.strategy {
        lines.push(format!("Strategy: {}", s));
    }
    if let Some(n) = &signal.note {
        lines.push(n.clone());
    }

    lines.join("\n")
}
