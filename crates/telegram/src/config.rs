use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

/// Long-poll timeout Telegram is asked to hold `getUpdates` open for.
pub const DEFAULT_POLL_TIMEOUT_SECS: u32 = 30;

/// Connection settings for the bot.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: Secret<String>,

    /// Seconds each `getUpdates` call may wait for new updates.
    pub poll_timeout_secs: u32,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token.into()),
            ..Default::default()
        }
    }

    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        }
    }
}
