//! Config schema. Every section and field has a default, so an empty file
//! (or no file) is a valid config apart from the bot token.

use std::{num::NonZeroUsize, time::Duration};

use serde::Deserialize;

pub use lectern_telegram::TelegramConfig;

/// Username the bot treats as the instructor unless configured otherwise.
pub const DEFAULT_INSTRUCTOR: &str = "daniarmakyev";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LecternConfig {
    pub instructor: InstructorConfig,
    pub session: SessionConfig,
    pub broadcast: BroadcastConfig,
    pub telegram: TelegramConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstructorConfig {
    /// Telegram username, with or without the leading `@`.
    pub username: String,
}

impl Default for InstructorConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_INSTRUCTOR.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a student stays subscribed after `/start`.
    pub ttl_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 30 * 60 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Upper bound on concurrent deliveries per broadcast. Unbounded if unset.
    pub max_in_flight: Option<usize>,
}

impl BroadcastConfig {
    pub fn limit(&self) -> Option<NonZeroUsize> {
        self.max_in_flight.and_then(NonZeroUsize::new)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
        }
    }
}
