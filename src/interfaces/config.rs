use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::CooldownPolicy;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: String,
    pub api_token: Option<String>,
    /// Absent = in-memory audit log.
    pub database_url: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// JSON-lines file polled for new signals.
    pub inbox: Option<PathBuf>,
    #[serde(default)]
    pub cooldown: CooldownCfg,
    pub telegram: Option<TelegramCfg>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CooldownCfg {
    pub startup_seconds: u64,
    pub global_seconds: u64,
    pub symbol_seconds: u64,
    pub min_spacing_seconds: u64,
}

impl Default for CooldownCfg {
    fn default() -> Self {
        let p = CooldownPolicy::default();
        Self {
            startup_seconds: p.startup_cooldown.as_secs(),
            global_seconds: p.global_cooldown.as_secs(),
            symbol_seconds: p.symbol_cooldown.as_secs(),
            min_spacing_seconds: p.min_signal_spacing.as_secs(),
        }
    }
}

impl CooldownCfg {
    pub fn to_policy(&self) -> CooldownPolicy {
        CooldownPolicy {
            startup_cooldown: Duration::from_secs(self.startup_seconds),
            global_cooldown: Duration::from_secs(self.global_seconds),
            symbol_cooldown: Duration::from_secs(self.symbol_seconds),
            min_signal_spacing: Duration::from_secs(self.min_spacing_seconds),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TelegramCfg {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

impl Config {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        let raw = expand_env(raw);
        let mut cfg: Config = serde_yaml::from_str(&raw)?;
        cfg.api_token = cfg.api_token.filter(|t| !t.trim().is_empty());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_seconds == 0 {
            anyhow::bail!("poll_interval_seconds must be greater than 0");
        }
        if let Some(tg) = &self.telegram {
            for (name, value) in [("bot_token", &tg.bot_token), ("chat_id", &tg.chat_id)] {
                if value.trim().is_empty() || value.contains("${") {
                    anyhow::bail!("telegram.{name} is empty or references an unset variable");
                }
            }
        }
        if let Some(token) = &self.api_token {
            if token.contains("${") {
                anyhow::bail!("api_token references an unset variable");
            }
        }
        Ok(())
    }
}

/// very small ${VAR} expansion to keep config simple
fn expand_env(s: &str) -> String {
    let mut out = s.to_string();
    for (k, v) in std::env::vars() {
        out = out.replace(&format!("${{{}}}", k), &v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_standard_cooldowns() {
        let cfg = Config::from_yaml_str("{}").unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:8080");
        assert_eq!(cfg.poll_interval_seconds, 10);
        assert_eq!(cfg.cooldown.to_policy(), CooldownPolicy::default());
        assert!(cfg.telegram.is_none());
    }

    #[test]
    fn partial_cooldown_section_keeps_other_defaults() {
        let cfg = Config::from_yaml_str(
            r#"
cooldown:
  startup_seconds: 0
  symbol_seconds: 600
"#,
        )
        .unwrap();
        let policy = cfg.cooldown.to_policy();
        assert_eq!(policy.startup_cooldown, Duration::ZERO);
        assert_eq!(policy.symbol_cooldown, Duration::from_secs(600));
        assert_eq!(policy.global_cooldown, Duration::from_secs(180));
        assert_eq!(policy.min_signal_spacing, Duration::from_secs(120));
    }

    #[test]
    fn expands_env_vars() {
        std::env::set_var("SIGNALGATE_TEST_CHAT", "-1001");
        let cfg = Config::from_yaml_str(
            r#"
telegram:
  bot_token: "123:abc"
  chat_id: "${SIGNALGATE_TEST_CHAT}"
"#,
        )
        .unwrap();
        assert_eq!(cfg.telegram.unwrap().chat_id, "-1001");
    }

    #[test]
    fn rejects_unresolved_telegram_token() {
        let err = Config::from_yaml_str(
            r#"
telegram:
  bot_token: "${SIGNALGATE_TEST_DEFINITELY_UNSET}"
  chat_id: "1"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("telegram.bot_token"));
    }

    #[test]
    fn blank_api_token_means_no_auth() {
        let cfg = Config::from_yaml_str("api_token: \"\"").unwrap();
        assert!(cfg.api_token.is_none());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        assert!(Config::from_yaml_str("poll_interval_seconds: 0").is_err());
    }
}
