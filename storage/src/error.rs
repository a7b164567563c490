use fred::error::RedisError;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Redis error: {0}")]
    RedisError(#[from] RedisError),
    #[error("Problem from std::io library: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Group id can't be used as a storage key: {0:?}")]
    InvalidId(String),
    #[error("Stored document {0} is not valid UTF-8")]
    NotUtf8(String),
    #[error("Storage lock poisoned: {0}")]
    Lock(String),
}
