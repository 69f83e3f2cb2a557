use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed queue payload: {0}")]
    Decode(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        QueueError::Unavailable(e.to_string())
    }
}
