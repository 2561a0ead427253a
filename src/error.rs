//! Error taxonomy for a single investment run.
//!
//! Every variant is fatal to the run that raised it. Rejected bids only
//! become an error under [`BidFailurePolicy::Abort`](crate::config::BidFailurePolicy).

use std::time::Duration;

/// Errors raised while configuring or executing an investment run.
#[derive(Debug, thiserror::Error)]
pub enum InvestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error ({endpoint}): {message}")]
    Api {
        endpoint: &'static str,
        message: String,
    },

    #[error("Bid on listing {listing_number} rejected: {detail}")]
    Bid { listing_number: u64, detail: String },

    #[error("Request to {endpoint} timed out after {}s", .after.as_secs())]
    Timeout {
        endpoint: &'static str,
        after: Duration,
    },

    #[error("Transport error ({endpoint}): {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Secret store error: {0}")]
    SecretStore(String),
}

pub type Result<T> = std::result::Result<T, InvestError>;

impl InvestError {
    /// Classify a reqwest failure, separating timeouts from other
    /// transport faults.
    pub fn from_transport(endpoint: &'static str, after: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { endpoint, after }
        } else {
            Self::Transport {
                endpoint,
                source: err,
            }
        }
    }

    pub fn api(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::Api {
            endpoint,
            message: message.into(),
        }
    }
}
