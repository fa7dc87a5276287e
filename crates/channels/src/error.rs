use std::error::Error as StdError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors a channel adapter reports for a single send.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The recipient cannot be reached (blocked the bot, account gone).
    #[error("recipient unavailable: {message}")]
    Unavailable { message: String },

    /// The platform call failed for any other reason.
    #[error("channel operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Recipient id is not a platform chat id.
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
}

impl Error {
    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
