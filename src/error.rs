use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single upstream provider call. Never retried.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider}: request failed: {source}")]
    Network {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: request timed out")]
    Timeout { provider: &'static str },

    #[error("{provider}: HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{provider}: malformed response: {reason}")]
    Malformed {
        provider: &'static str,
        reason: String,
    },
}

impl ProviderError {
    pub fn malformed(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            provider,
            reason: reason.into(),
        }
    }

    pub(crate) fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { provider }
        } else {
            Self::Network {
                provider,
                source: err,
            }
        }
    }
}

/// Failure of a cache refresh in the aggregation engine.
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

pub type AggregationResult<T> = Result<T, AggregationError>;

/// Failure to deliver a reply through the messaging platform.
#[derive(Error, Debug)]
#[error("failed to deliver reply to chat {chat_id}: {source}")]
pub struct DeliveryError {
    pub chat_id: i64,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}
