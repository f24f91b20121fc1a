//! Session exchanger - trades a provider credential for Taskboard's own tokens

use crate::Result;
use crate::error::Error;
use super::backend::{AuthBackend, SocialLoginRequest};
use super::callback::{CallbackArtifact, Credential};
use super::session::SessionStore;
use super::storage::{SessionCredential, TokenStorage};

/// Default route after a successful sign-in
pub const DEFAULT_AUTHENTICATED_ROUTE: &str = "/workspaces";

/// Exchanges callback artifacts through the backend's social-login endpoint
pub struct SessionExchanger<'a, B, S> {
    store: &'a SessionStore<B, S>,
}

impl<'a, B: AuthBackend, S: TokenStorage> SessionExchanger<'a, B, S> {
    pub fn new(store: &'a SessionStore<B, S>) -> Self {
        Self { store }
    }

    /// One round trip: send the credential, persist the returned pair and
    /// publish the new session. Never retried.
    pub async fn exchange(&self, artifact: &CallbackArtifact) -> Result<SessionCredential> {
        let request = social_login_request(artifact);
        tracing::info!("Exchanging {} credential with backend", artifact.provider.display_name());

        let response = self
            .store
            .backend()
            .social_login(&request)
            .await
            .map_err(|e| match e {
                Error::ExchangeFailed(_) => e,
                other => Error::ExchangeFailed(other.user_message()),
            })?;

        let session = self.store.login_with(response)?;
        Ok(session.credential.clone())
    }
}

fn social_login_request(artifact: &CallbackArtifact) -> SocialLoginRequest {
    let (token, code) = match &artifact.credential {
        Credential::AccessToken(token) => (Some(token.clone()), None),
        Credential::AuthorizationCode(code) => (None, Some(code.clone())),
    };
    SocialLoginRequest {
        provider: artifact.provider,
        token,
        code,
    }
}
