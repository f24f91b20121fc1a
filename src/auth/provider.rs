//! Provider registry - static OAuth2 settings for each supported identity provider
//!
//! Each provider is a variant of [`Provider`]; everything provider-specific
//! (endpoints, scopes, how the credential comes back) hangs off a `match` on
//! that enum, so adding a provider is a local change here and in `callback.rs`.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::config::Config;
use crate::error::Error;

/// Google OAuth2 authorization endpoint
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_SCOPE: &str = "openid email profile";

/// GitHub OAuth authorization endpoint
const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_SCOPE: &str = "read:user user:email";

/// Supported identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    #[serde(rename = "github")]
    GitHub,
}

/// How the provider hands its credential back to the redirect URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Implicit flow: `access_token` in the URL fragment
    Token,
    /// Authorization-code flow: `code` in the query string
    Code,
}

impl ResponseMode {
    /// Value of the `response_type` authorization parameter
    pub fn response_type(self) -> &'static str {
        match self {
            ResponseMode::Token => "token",
            ResponseMode::Code => "code",
        }
    }
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Google, Provider::GitHub];

    /// Identifier used on the wire and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::GitHub => "github",
        }
    }

    /// Human-readable name
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Google => "Google",
            Provider::GitHub => "GitHub",
        }
    }

    pub fn response_mode(self) -> ResponseMode {
        match self {
            Provider::Google => ResponseMode::Token,
            Provider::GitHub => ResponseMode::Code,
        }
    }

    /// Path of the redirect URL registered with the provider
    pub fn callback_path(self) -> &'static str {
        match self {
            Provider::Google => "/auth/callback/google",
            Provider::GitHub => "/auth/callback/github",
        }
    }

    fn authorization_endpoint(self) -> &'static str {
        match self {
            Provider::Google => GOOGLE_AUTH_URL,
            Provider::GitHub => GITHUB_AUTH_URL,
        }
    }

    fn scope(self) -> &'static str {
        match self {
            Provider::Google => GOOGLE_SCOPE,
            Provider::GitHub => GITHUB_SCOPE,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::GitHub),
            other => Err(Error::Config(format!("Unsupported provider: {other}"))),
        }
    }
}

/// Static description of one identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: Provider,
    /// Empty when not configured
    pub client_id: String,
    pub authorization_endpoint: String,
    /// Must match the redirect URL registered with the provider exactly
    pub redirect_uri: String,
    pub scope: String,
    pub response_mode: ResponseMode,
}

impl ProviderConfig {
    fn new(provider: Provider, client_id: &str, app_origin: &str) -> Self {
        Self {
            provider,
            client_id: client_id.trim().to_string(),
            authorization_endpoint: provider.authorization_endpoint().to_string(),
            redirect_uri: format!("{}{}", app_origin.trim_end_matches('/'), provider.callback_path()),
            scope: provider.scope().to_string(),
            response_mode: provider.response_mode(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
    }
}

/// Immutable lookup table of provider settings, built once at startup
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    google: ProviderConfig,
    github: ProviderConfig,
}

impl ProviderRegistry {
    pub fn from_config(config: &Config) -> Self {
        Self {
            google: ProviderConfig::new(Provider::Google, &config.oauth.google_client_id, &config.app_origin),
            github: ProviderConfig::new(Provider::GitHub, &config.oauth.github_client_id, &config.app_origin),
        }
    }

    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Google => &self.google,
            Provider::GitHub => &self.github,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::default();
        config.app_origin = "https://board.example.com/".to_string();
        config.oauth.github_client_id = "gh-client".to_string();
        config
    }

    #[test]
    fn test_registry_builds_redirect_uris() {
        let registry = ProviderRegistry::from_config(&config());

        let google = registry.get(Provider::Google);
        assert_eq!(google.redirect_uri, "https://board.example.com/auth/callback/google");
        assert_eq!(google.response_mode, ResponseMode::Token);
        assert_eq!(google.scope, "openid email profile");

        let github = registry.get(Provider::GitHub);
        assert_eq!(github.redirect_uri, "https://board.example.com/auth/callback/github");
        assert_eq!(github.response_mode, ResponseMode::Code);
        assert_eq!(github.authorization_endpoint, GITHUB_AUTH_URL);
    }

    #[test]
    fn test_missing_client_id_is_not_an_error() {
        let registry = ProviderRegistry::from_config(&config());
        assert!(!registry.get(Provider::Google).is_configured());
        assert!(registry.get(Provider::GitHub).is_configured());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("GitHub".parse::<Provider>().unwrap(), Provider::GitHub);
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert!("gitlab".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::GitHub).unwrap(), "\"github\"");
        assert_eq!(serde_json::to_string(&Provider::Google).unwrap(), "\"google\"");
    }
}
