//! Domain error types

use thiserror::Error;

/// Upstream feed failures. Every variant is treated as "no data this tick".
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{feed} request timed out")]
    Timeout { feed: &'static str },

    #[error("{feed} returned HTTP {status}")]
    Status { feed: &'static str, status: u16 },

    #[error("{feed} transport error: {source}")]
    Transport {
        feed: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{feed} payload could not be decoded: {message}")]
    Decode { feed: &'static str, message: String },

    #[error("{feed} is not configured: {message}")]
    NotConfigured { feed: &'static str, message: String },
}

impl FeedError {
    pub fn from_reqwest(feed: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout { feed }
        } else if let Some(status) = err.status() {
            FeedError::Status {
                feed,
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            FeedError::Decode {
                feed,
                message: err.to_string(),
            }
        } else {
            FeedError::Transport { feed, source: err }
        }
    }
}

/// Snapshot store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),

    #[error(transparent)]
    Invalid(#[from] crate::types::ObservationError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Sportsbook provider failures
#[derive(Debug, Error, PartialEq)]
pub enum SportsbookError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("invalid market: {0} (expected OU|Spread|ML)")]
    InvalidMarket(String),

    #[error("side {side} is not valid for market {market}")]
    InvalidSide { market: String, side: String },

    #[error("invalid price: {0}")]
    InvalidPrice(f64),

    #[error("stake must be > 0, got {0}")]
    InvalidStake(rust_decimal::Decimal),

    #[error("provider {0} is already registered")]
    DuplicateProvider(String),
}
