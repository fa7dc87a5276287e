use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A Bot API call failed.
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Relay(#[from] lectern_relay::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
