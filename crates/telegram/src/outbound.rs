use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        ApiError, RequestError,
        payloads::{SendDocumentSetters, SendPhotoSetters, SendVideoSetters},
        prelude::*,
        types::{ChatId, InputFile},
    },
    tracing::{debug, warn},
};

use lectern_channels::{ChannelOutbound, Error as ChannelError, SubscriberId};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Sends replies and broadcasts through the Bot API.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Run a request, waiting out Telegram rate limits a bounded number of times.
    async fn run_with_retry<T, F, Fut>(
        &self,
        to: &SubscriberId,
        operation: &'static str,
        mut request: F,
    ) -> lectern_channels::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => {
                    debug!(chat_id = %to, operation, "telegram send ok");
                    return Ok(value);
                },
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(send_error(operation, err));
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = %to,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(send_error(operation, err));
                    }

                    retries += 1;
                    warn!(
                        chat_id = %to,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send_text(&self, to: &SubscriberId, text: &str) -> lectern_channels::Result<()> {
        let chat_id = chat_id(to)?;
        self.run_with_retry(to, "send message", || {
            let req = self.bot.send_message(chat_id, text);
            async move { req.await }
        })
        .await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        to: &SubscriberId,
        file_id: &str,
        caption: Option<&str>,
    ) -> lectern_channels::Result<()> {
        let chat_id = chat_id(to)?;
        self.run_with_retry(to, "send photo", || {
            let mut req = self
                .bot
                .send_photo(chat_id, InputFile::file_id(file_id.to_owned()));
            if let Some(caption) = caption {
                req = req.caption(caption);
            }
            async move { req.await }
        })
        .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        to: &SubscriberId,
        file_id: &str,
        caption: Option<&str>,
    ) -> lectern_channels::Result<()> {
        let chat_id = chat_id(to)?;
        self.run_with_retry(to, "send document", || {
            let mut req = self
                .bot
                .send_document(chat_id, InputFile::file_id(file_id.to_owned()));
            if let Some(caption) = caption {
                req = req.caption(caption);
            }
            async move { req.await }
        })
        .await?;
        Ok(())
    }

    async fn send_video(
        &self,
        to: &SubscriberId,
        file_id: &str,
        caption: Option<&str>,
    ) -> lectern_channels::Result<()> {
        let chat_id = chat_id(to)?;
        self.run_with_retry(to, "send video", || {
            let mut req = self
                .bot
                .send_video(chat_id, InputFile::file_id(file_id.to_owned()));
            if let Some(caption) = caption {
                req = req.caption(caption);
            }
            async move { req.await }
        })
        .await?;
        Ok(())
    }
}

fn chat_id(to: &SubscriberId) -> lectern_channels::Result<ChatId> {
    Ok(ChatId(to.as_str().parse::<i64>()?))
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn send_error(operation: &'static str, err: RequestError) -> ChannelError {
    match &err {
        RequestError::Api(
            ApiError::BotBlocked
            | ApiError::UserDeactivated
            | ApiError::ChatNotFound
            | ApiError::BotKicked,
        ) => ChannelError::unavailable(err),
        _ => ChannelError::external(format!("telegram {operation}"), err),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn retry_after_duration_extracts_wait() {
        let err = RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(42));
        assert_eq!(retry_after_duration(&err), Some(Duration::from_secs(42)));
    }

    #[test]
    fn retry_after_duration_ignores_other_errors() {
        let err = RequestError::Io(std::io::Error::other("boom"));
        assert_eq!(retry_after_duration(&err), None);
    }

    #[rstest]
    #[case("42", Some(42))]
    #[case("-100123", Some(-100_123))]
    #[case("alice", None)]
    #[case("", None)]
    fn chat_id_parses_numeric_ids(#[case] raw: &str, #[case] expected: Option<i64>) {
        let parsed = chat_id(&SubscriberId::from(raw)).ok();
        assert_eq!(parsed, expected.map(ChatId));
    }

    fn rate_limited(secs: u32) -> RequestError {
        RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(secs))
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_is_waited_out_before_success() {
        let outbound = TelegramOutbound::new(Bot::new("test-token"));
        let attempts = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let result = outbound
            .run_with_retry(&SubscriberId::from("42"), "send message", || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(rate_limited(3))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limit_gives_up_after_max_retries() {
        let outbound = TelegramOutbound::new(Bot::new("test-token"));
        let attempts = AtomicUsize::new(0);

        let result: lectern_channels::Result<()> = outbound
            .run_with_retry(&SubscriberId::from("42"), "send message", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited(1)) }
            })
            .await;

        assert!(matches!(result, Err(ChannelError::External { .. })));
        assert_eq!(
            attempts.load(Ordering::SeqCst),
            TELEGRAM_RETRY_AFTER_MAX_RETRIES + 1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let outbound = TelegramOutbound::new(Bot::new("test-token"));
        let attempts = AtomicUsize::new(0);

        let result: lectern_channels::Result<()> = outbound
            .run_with_retry(&SubscriberId::from("42"), "send message", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(RequestError::Io(std::io::Error::other("reset"))) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[case(ApiError::BotBlocked)]
    #[case(ApiError::UserDeactivated)]
    #[case(ApiError::ChatNotFound)]
    fn unreachable_recipient_is_unavailable(#[case] api: ApiError) {
        let err = send_error("send message", RequestError::Api(api));
        assert!(matches!(err, ChannelError::Unavailable { .. }));
    }

    #[test]
    fn other_api_errors_are_external() {
        let err = send_error("send message", RequestError::Api(ApiError::MessageTextIsEmpty));
        assert!(matches!(err, ChannelError::External { .. }));
    }

    #[tokio::test]
    async fn non_numeric_recipient_fails_without_a_request() {
        let bot = Bot::new("test-token")
            .set_api_url(reqwest::Url::parse("http://127.0.0.1:9/").unwrap());
        let outbound = TelegramOutbound::new(bot);
        let result = outbound
            .send_text(&SubscriberId::from("not-a-chat"), "hi")
            .await;
        assert!(matches!(result, Err(ChannelError::ParseInt(_))));
    }
}
