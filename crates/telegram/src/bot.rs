use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use lectern_relay::SessionController;

use crate::{config::TelegramConfig, error::Result, handlers, outbound::TelegramOutbound};

/// Slash commands registered for autocomplete in Telegram clients.
pub const BOT_COMMANDS: [(&str, &str); 3] = [
    ("start", "Присоединиться к сессии"),
    ("exit", "Выйти из сессии"),
    ("count", "Сколько студентов в сессии"),
];

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A verified bot, ready to send and to poll.
#[derive(Clone)]
pub struct TelegramBot {
    bot: Bot,
    username: Option<String>,
    poll_timeout_secs: u32,
}

/// Build a client for the configured token and verify it.
pub async fn connect(config: &TelegramConfig) -> Result<TelegramBot> {
    // The client timeout must outlast the long-poll timeout.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 15))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);
    TelegramBot::verify(bot, config.poll_timeout_secs).await
}

impl TelegramBot {
    /// Check the token with `getMe`, clear any webhook and register the
    /// slash commands.
    pub async fn verify(bot: Bot, poll_timeout_secs: u32) -> Result<Self> {
        let me = bot.get_me().await?;
        bot.delete_webhook().send().await?;

        let commands = BOT_COMMANDS
            .iter()
            .map(|(name, description)| BotCommand::new(*name, *description))
            .collect::<Vec<_>>();
        if let Err(e) = bot.set_my_commands(commands).await {
            warn!("failed to register bot commands: {e}");
        }

        info!(username = ?me.username, "telegram bot connected (webhook cleared)");

        Ok(Self {
            bot,
            username: me.username.clone(),
            poll_timeout_secs,
        })
    }

    /// Wrap an already configured bot without calling the API.
    pub fn from_bot(bot: Bot, poll_timeout_secs: u32) -> Self {
        Self {
            bot,
            username: None,
            poll_timeout_secs,
        }
    }

    /// Username reported by `getMe`; `None` for a bot built with [`Self::from_bot`].
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn outbound(&self) -> TelegramOutbound {
        TelegramOutbound::new(self.bot.clone())
    }

    /// Poll for updates until `cancel` fires or another instance takes over
    /// the token. Each message is routed through `controller` in arrival order.
    pub fn spawn_polling(
        &self,
        controller: Arc<SessionController>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let bot = self.bot.clone();
        let timeout = self.poll_timeout_secs;
        tokio::spawn(async move {
            info!("starting telegram polling loop");
            poll_updates(bot, controller, cancel, timeout).await;
            info!("telegram polling stopped");
        })
    }
}

async fn poll_updates(
    bot: Bot,
    controller: Arc<SessionController>,
    cancel: CancellationToken,
    timeout: u32,
) {
    let mut offset: i32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(timeout)
            .allowed_updates(vec![AllowedUpdate::Message]);

        let result = tokio::select! {
            () = cancel.cancelled() => return,
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    match update.kind {
                        UpdateKind::Message(msg) => {
                            debug!(chat_id = msg.chat.id.0, "received telegram message");
                            if let Err(e) = handlers::handle_message(&msg, &controller).await {
                                error!(
                                    chat_id = msg.chat.id.0,
                                    error = %e,
                                    "error handling telegram message"
                                );
                            }
                        },
                        other => {
                            debug!("ignoring non-message update: {other:?}");
                        },
                    }
                }
            },
            Err(e) => {
                if is_conflict(&e) {
                    error!("telegram polling disabled: another instance is already running with this token");
                    return;
                }

                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }
}

fn is_conflict(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::TerminatedByOtherGetUpdates))
}
