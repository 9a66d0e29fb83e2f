//! Error types for neurobus

use crate::subscription::SubscriptionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("event topic cannot be empty")]
    EmptyTopic,

    #[error("subscription pattern cannot be empty")]
    EmptyPattern,

    #[error("threshold must be between 0.0 and 1.0, got {0}")]
    InvalidThreshold(f32),

    #[error("invalid pattern `{0}`: the `**` wildcard is reserved and not implemented")]
    InvalidPattern(String),

    #[error("bus has not been started")]
    BusNotStarted,

    #[error("bus has already been stopped")]
    BusAlreadyStopped,

    #[error("registry is full (capacity {capacity})")]
    RegistryFull { capacity: usize },

    #[error("subscription {0} already exists")]
    DuplicateSubscription(SubscriptionId),

    #[error("subscription {0} not found")]
    SubscriptionNotFound(SubscriptionId),

    #[error("handler for subscription {subscription} failed: {message}")]
    HandlerFailure {
        subscription: SubscriptionId,
        message: String,
    },

    #[error("seam `{seam}` failed: {message}")]
    SeamFailure { seam: &'static str, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
