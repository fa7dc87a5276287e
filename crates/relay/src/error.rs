use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Channel(#[from] lectern_channels::Error),

    #[error(transparent)]
    Sessions(#[from] lectern_sessions::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
