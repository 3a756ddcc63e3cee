//! Error types for the studio and its remote collaborators.

use std::time::Duration;

/// Longest provider error body kept in an error message.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while redesigning rooms or estimating costs.
///
/// The credit ledger never produces these; its failures are absorbed locally.
#[derive(Debug, thiserror::Error)]
pub enum MonospaceError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-suggested delay, if any.
        retry_after: Option<Duration>,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Billing is not enabled on the model account.
    #[error("billing error: {0}")]
    Billing(String),

    /// The model answered, but not with what was asked for.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Neither free quota nor purchased credits are left for this identity.
    #[error("no credits left for {identity}: daily free limit reached and no purchased credits")]
    InsufficientCredits {
        /// Display form of the identity that ran out.
        identity: String,
    },

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MonospaceError {
    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }
}

/// Result type alias for studio operations.
pub type Result<T> = std::result::Result<T, MonospaceError>;

/// Strips anything that looks like an API key from a provider error body and
/// truncates it to a readable length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let bare = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-');
            if bare.starts_with("AIza") && bare.len() >= 30 {
                word.replace(bare, "[REDACTED]")
            } else if let Some(pos) = word.find("key=") {
                format!("{}key=[REDACTED]", &word[..pos])
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = redacted.join(" ");

    if joined.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = joined.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}

/// Reads a `Retry-After` header expressed in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
