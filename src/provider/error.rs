//! Shared error type for the text and image providers.

use thiserror::Error;

/// Failure of a single provider call. Every variant is fatal to the run; nothing is retried.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: API key is not set. Export {var} or add it to .env.")]
    MissingApiKey {
        provider: &'static str,
        var: &'static str,
    },

    #[error("{provider}: invalid request: {reason}")]
    InvalidRequest {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider}: network error: could not reach {url}: {source}")]
    Network {
        provider: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        /// Raw response body, kept for diagnosis.
        body: String,
    },

    #[error("{provider}: malformed response: {reason}")]
    Malformed {
        provider: &'static str,
        reason: String,
    },
}

impl ProviderError {
    /// Provider name carried by every variant.
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::MissingApiKey { provider, .. }
            | ProviderError::InvalidRequest { provider, .. }
            | ProviderError::Network { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::Malformed { provider, .. } => provider,
        }
    }
}
