//! Provider error classification.
//!
//! Every adapter failure is classified at the boundary so callers never
//! have to inspect provider-specific payloads: transient errors may be
//! retried or re-polled, everything else is terminal.

/// How a provider failure should be treated downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Rate limits, 5xx responses, network blips. Safe to retry.
    Transient,
    /// Malformed responses, rejected input. Not retried.
    Permanent,
    /// Account quota exhausted. Not retried; may trigger fallbacks.
    QuotaExceeded,
    /// Referenced model or job does not exist.
    NotFound,
    /// The provider's content policy rejected the input.
    ContentPolicy,
}

/// An error from an external provider call.
#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Permanent, message)
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::QuotaExceeded, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    pub fn content_policy(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ContentPolicy, message)
    }

    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        // Connection-level failures are always retryable.
        Self::transient(e.to_string())
    }
}

/// Map an HTTP error response onto the taxonomy. 429 and 5xx are
/// retryable; everything else is terminal in some flavor.
pub(crate) fn classify_response(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let message = format!("provider returned {status}: {body}");
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ProviderError::transient(message)
    } else if status == reqwest::StatusCode::NOT_FOUND {
        ProviderError::not_found(message)
    } else if status == reqwest::StatusCode::PAYMENT_REQUIRED {
        ProviderError::quota_exceeded(message)
    } else if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        && body.to_ascii_lowercase().contains("policy")
    {
        ProviderError::content_policy(message)
    } else {
        ProviderError::permanent(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(classify_response(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_response(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_response(StatusCode::INTERNAL_SERVER_ERROR, "").is_transient());
    }

    #[test]
    fn client_errors_are_terminal() {
        assert_eq!(
            classify_response(StatusCode::NOT_FOUND, "").kind,
            ProviderErrorKind::NotFound
        );
        assert_eq!(
            classify_response(StatusCode::PAYMENT_REQUIRED, "").kind,
            ProviderErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify_response(StatusCode::UNPROCESSABLE_ENTITY, "content policy violation").kind,
            ProviderErrorKind::ContentPolicy
        );
        assert_eq!(
            classify_response(StatusCode::BAD_REQUEST, "bad input").kind,
            ProviderErrorKind::Permanent
        );
    }
}
