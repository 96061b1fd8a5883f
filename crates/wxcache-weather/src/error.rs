//! Weather cache error types.
//!
//! Every failure surfaces as one of four kinds so presentation layers can show
//! a distinct message for "no network" versus "download failed" versus
//! "local storage broken" versus "bad input".

use thiserror::Error;

use crate::types::DocumentError;

/// Failures of the remote weather provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error code: {status}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(#[from] DocumentError),
}

impl ProviderError {
    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Malformed(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("No network connection")]
    NetworkUnavailable,

    #[error("Unable to download weather data: {0}")]
    FetchFailed(#[from] ProviderError),

    #[error("Storage error for {key}: {message}")]
    Storage { key: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Coarse classification of [`WeatherError`], for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkUnavailable,
    FetchFailed,
    Storage,
    InvalidArgument,
}

impl WeatherError {
    pub fn storage(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Storage {
            key: key.into(),
            message: err.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkUnavailable => ErrorKind::NetworkUnavailable,
            Self::FetchFailed(_) => ErrorKind::FetchFailed,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NetworkUnavailable => "No network connection",
            Self::FetchFailed(ProviderError::Status { status: 404, .. }) => {
                "City not found. Check the name and try again."
            }
            Self::FetchFailed(ProviderError::Status { status: 401, .. }) => {
                "Weather API key is invalid. Check settings."
            }
            Self::FetchFailed(_) => "Unable to update weather data",
            Self::Storage { .. } => "Local weather data could not be accessed",
            Self::InvalidArgument(_) => "Invalid input. Check and try again.",
        }
    }

    /// Whether the caller may reasonably try again later (e.g. pull-to-refresh).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkUnavailable | Self::Storage { .. } => true,
            Self::FetchFailed(e) => match e.status() {
                // request timeout, rate limited
                Some(408 | 429) => true,
                Some(status) => !(400..=499).contains(&status),
                None => !matches!(e, ProviderError::Malformed(_)),
            },
            Self::InvalidArgument(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> WeatherError {
        WeatherError::FetchFailed(ProviderError::Status {
            status: code,
            body: String::new(),
        })
    }

    #[test]
    fn test_kinds_are_distinct() {
        assert_eq!(WeatherError::NetworkUnavailable.kind(), ErrorKind::NetworkUnavailable);
        assert_eq!(status(500).kind(), ErrorKind::FetchFailed);
        assert_eq!(WeatherError::storage("a.json", "disk full").kind(), ErrorKind::Storage);
        assert_eq!(WeatherError::invalid("empty").kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_error_user_messages() {
        assert!(WeatherError::NetworkUnavailable.user_message().contains("network"));
        assert!(status(404).user_message().contains("not found"));
        assert!(status(401).user_message().contains("key"));
        assert_ne!(
            WeatherError::NetworkUnavailable.user_message(),
            status(503).user_message()
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(WeatherError::NetworkUnavailable.is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(status(429).is_retryable());
        assert!(status(408).is_retryable());
        assert!(!WeatherError::FetchFailed(ProviderError::Malformed(DocumentError(
            "missing \"list\"".into()
        )))
        .is_retryable());
        assert!(!WeatherError::invalid("units").is_retryable());
    }

    #[test]
    fn test_storage_error_names_key() {
        let err = WeatherError::storage("london:metric.json", "permission denied");
        let text = err.to_string();
        assert!(text.contains("london:metric.json"));
        assert!(text.contains("permission denied"));
    }
}
