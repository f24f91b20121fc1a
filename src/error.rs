//! Error types for Taskboard

use thiserror::Error;

use crate::auth::Provider;

/// Result type alias for Taskboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fallback text shown when a failure carries no better message
pub const GENERIC_AUTH_FAILURE: &str = "Authentication failed";

/// Errors that can occur in Taskboard
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} OAuth is not configured. Set its client ID in the config file or environment.", .0.display_name())]
    MisconfiguredProvider(Provider),

    #[error("No {field} received from {}", .provider.display_name())]
    MissingCredential {
        provider: Provider,
        field: &'static str,
    },

    #[error("Social login failed: {0}")]
    ExchangeFailed(String),

    #[error("OAuth state mismatch for {}", .0.display_name())]
    StateMismatch(Provider),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// The backend refused the token (401/403)
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Message suitable for the sign-in failure screen
    pub fn user_message(&self) -> String {
        match self {
            Error::MissingCredential { .. } => GENERIC_AUTH_FAILURE.to_string(),
            Error::ExchangeFailed(message) | Error::Auth(message) | Error::Unauthorized(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_user_message_is_generic() {
        let err = Error::MissingCredential {
            provider: Provider::GitHub,
            field: "authorization code",
        };
        assert_eq!(err.to_string(), "No authorization code received from GitHub");
        assert_eq!(err.user_message(), GENERIC_AUTH_FAILURE);
    }

    #[test]
    fn test_exchange_failed_passes_message_through() {
        let err = Error::ExchangeFailed("invalid_grant".to_string());
        assert_eq!(err.user_message(), "invalid_grant");
    }

    #[test]
    fn test_misconfigured_provider_message() {
        let err = Error::MisconfiguredProvider(Provider::Google);
        assert!(err.user_message().starts_with("Google OAuth is not configured"));
    }
}
