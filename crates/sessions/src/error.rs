use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A tokio-backed clock was requested outside of a runtime.
    #[error(transparent)]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

pub type Result<T> = std::result::Result<T, Error>;
