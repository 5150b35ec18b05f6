//! TRIAS error types

use thiserror::Error;

/// Coarse classification of a [`TriasError`]
///
/// Lets callers decide per kind whether to give up, retry later, or
/// only mark the affected entity as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Local setup is wrong (URL, key, arguments); retrying will not help
    Configuration,
    /// The request did not make it through the network or HTTP layer
    Transport,
    /// The service answered, but with an error or a body we cannot read
    Protocol,
    /// The call succeeded but the result failed a plausibility check
    Validation,
}

/// Errors that can occur while talking to a TRIAS endpoint
#[derive(Debug, Error)]
pub enum TriasError {
    /// Base URL is missing or not an absolute http(s) URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No usable API key (requestor reference) was configured
    #[error("Invalid API key: an API key is required")]
    InvalidApiKey,

    /// A request argument was rejected before anything was sent
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A value handed to the time codec cannot be converted
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The endpoint answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body as returned by the server
        body: String,
    },

    /// Connection to the TRIAS endpoint failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timeout
    #[error("Request timed out after {timeout_secs} seconds")]
    Timeout {
        /// The timeout duration in seconds
        timeout_secs: u64,
    },

    /// The response body is not valid XML or lacks a required element
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The service reported an error inside an otherwise successful response
    #[error("API error: {message}")]
    Api {
        /// Message taken from `ErrorMessage/Text/Text`
        message: String,
    },

    /// A location search matched something, but not convincingly
    #[error("{requested} <> {found} - probability of a correct result: {probability}")]
    InvalidLocationName {
        /// Name that was searched for
        requested: String,
        /// Best match returned by the service
        found: String,
        /// Match probability reported by the service
        probability: f64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TriasError {
    /// Classify this error
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidUrl(_)
            | Self::InvalidApiKey
            | Self::InvalidParameter(_)
            | Self::InvalidInput(_)
            | Self::Configuration(_) => ErrorClass::Configuration,
            Self::Http { .. } | Self::ConnectionFailed(_) | Self::Timeout { .. } => {
                ErrorClass::Transport
            },
            Self::ParseError(_) | Self::Api { .. } => ErrorClass::Protocol,
            Self::InvalidLocationName { .. } => ErrorClass::Validation,
        }
    }

    /// Returns true if this error is retryable
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Build a parse error for a required element that is not there
    pub(crate) fn missing(path: &str) -> Self {
        Self::ParseError(format!("missing required element `{path}`"))
    }
}
