use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("segment is full")]
    Overflow,

    #[error("no item available")]
    Underflow,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("pool is empty and no factory is configured")]
    Unavailable,
}
