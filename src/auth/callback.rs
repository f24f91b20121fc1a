//! Callback resolver - pulls the provider's credential out of a redirect URL
//!
//! Pure parsing; no network I/O and no hidden state, so resolving the same URL
//! twice yields equal artifacts.

use url::{form_urlencoded, Url};
use crate::Result;
use crate::error::Error;
use super::provider::{Provider, ResponseMode};

/// The credential a provider hands back after user consent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Implicit flow: the provider's own access token
    AccessToken(String),
    /// Authorization-code flow: a one-time code the backend exchanges
    AuthorizationCode(String),
}

impl Credential {
    pub fn value(&self) -> &str {
        match self {
            Credential::AccessToken(v) | Credential::AuthorizationCode(v) => v,
        }
    }
}

/// Result of resolving a provider callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackArtifact {
    pub provider: Provider,
    pub credential: Credential,
    /// `state` echoed back by the provider, if any
    pub state: Option<String>,
}

/// Resolve a full redirect URL for `provider`.
///
/// Fragment-mode providers are read from the part after `#` only; query-mode
/// providers from the query string only.
pub fn resolve_callback(provider: Provider, raw_url: &str) -> Result<CallbackArtifact> {
    let url = Url::parse(raw_url).map_err(|e| {
        tracing::warn!("Unparseable {} redirect URL: {}", provider.display_name(), e);
        missing(provider)
    })?;

    match provider.response_mode() {
        ResponseMode::Token => {
            let fragment = url.fragment().unwrap_or_default();
            let params: Vec<(String, String)> = form_urlencoded::parse(fragment.as_bytes())
                .into_owned()
                .collect();
            resolve_params(provider, &params)
        }
        ResponseMode::Code => {
            let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            resolve_params(provider, &params)
        }
    }
}

/// Resolve already-split query parameters for a query-mode provider.
///
/// Fragment-mode providers never put their credential in the query, so for
/// them this always fails with `MissingCredential`.
pub fn resolve_query(provider: Provider, query: &[(String, String)]) -> Result<CallbackArtifact> {
    match provider.response_mode() {
        ResponseMode::Code => resolve_params(provider, query),
        ResponseMode::Token => Err(missing(provider)),
    }
}

fn resolve_params(provider: Provider, params: &[(String, String)]) -> Result<CallbackArtifact> {
    let get = |key: &str| {
        params
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
    };

    let credential = match provider.response_mode() {
        ResponseMode::Token => get("access_token").map(Credential::AccessToken),
        ResponseMode::Code => get("code").map(Credential::AuthorizationCode),
    };

    let Some(credential) = credential else {
        if let Some(error) = get("error") {
            tracing::warn!(
                "{} returned error '{}': {}",
                provider.display_name(),
                error,
                get("error_description").unwrap_or_default()
            );
        }
        return Err(missing(provider));
    };

    tracing::debug!("Resolved {} callback", provider.display_name());

    Ok(CallbackArtifact {
        provider,
        credential,
        state: get("state"),
    })
}

fn missing(provider: Provider) -> Error {
    let field = match provider.response_mode() {
        ResponseMode::Token => "access token",
        ResponseMode::Code => "authorization code",
    };
    Error::MissingCredential { provider, field }
}
