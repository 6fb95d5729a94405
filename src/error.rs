use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue entry not found: {0}")]
    EntryNotFound(String),

    #[error("Queue state drift: {0}")]
    Inconsistency(String),

    #[error("Immediate capacity exhausted, rejecting {0}")]
    CapacityExhausted(String),

    #[error("No active reservation for {0}")]
    NoActiveReservation(String),

    #[error("Malformed queue key: {0}")]
    MalformedKey(String),

    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
