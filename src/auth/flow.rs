//! Sign-in journey: redirect, callback, exchange, done
//!
//! ```text
//! Idle -> Redirecting -> CallbackReceived -> ArtifactResolved -> Exchanging -> Authenticated
//!                                                                          \-> Failed -> Idle
//! ```
//!
//! Every failure is terminal for the attempt; the user starts over from `Idle`.

use std::time::Duration;
use crate::Result;
use crate::error::Error;
use super::backend::{AuthBackend, User};
use super::callback::{resolve_callback, CallbackArtifact};
use super::exchanger::{SessionExchanger, DEFAULT_AUTHENTICATED_ROUTE};
use super::initiator::{LoginInitiator, Navigator, PendingLogin};
use super::provider::Provider;
use super::session::SessionStore;
use super::storage::TokenStorage;

/// How long a failure stays on screen before going back to sign-in
pub const FAILURE_REDIRECT_DELAY: Duration = Duration::from_secs(3);

/// Where the user is sent after a failure
pub const SIGN_IN_ROUTE: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInState {
    Idle,
    Redirecting(Provider),
    CallbackReceived { provider: Provider, raw_url: String },
    ArtifactResolved(CallbackArtifact),
    Exchanging(Provider),
    Authenticated { user: User, redirect_to: &'static str },
    Failed { message: String },
}

/// Drives one sign-in attempt against a session store
pub struct SignInFlow<'a, B, S> {
    store: &'a SessionStore<B, S>,
    state: SignInState,
    expected_state: Option<String>,
}

impl<'a, B: AuthBackend, S: TokenStorage> SignInFlow<'a, B, S> {
    pub fn new(store: &'a SessionStore<B, S>) -> Self {
        Self {
            store,
            state: SignInState::Idle,
            expected_state: None,
        }
    }

    pub fn state(&self) -> &SignInState {
        &self.state
    }

    /// Send the user to the provider and remember the `state` nonce
    pub fn start<N: Navigator>(&mut self, initiator: &LoginInitiator<N>, provider: Provider) -> Result<PendingLogin> {
        self.ensure_idle()?;
        let pending = initiator.initiate(provider)?;
        self.expected_state = Some(pending.state.clone());
        self.state = SignInState::Redirecting(provider);
        Ok(pending)
    }

    /// Handle the provider's redirect back to us.
    ///
    /// Runs resolve, `state` check (when a nonce was issued by [`SignInFlow::start`])
    /// and the backend exchange exactly once. On failure the flow lands in
    /// `Failed` and the error is returned.
    pub async fn complete(&mut self, provider: Provider, raw_url: &str) -> Result<User> {
        match &self.state {
            SignInState::Idle => {}
            SignInState::Redirecting(p) if *p == provider => {}
            SignInState::Redirecting(p) => {
                tracing::warn!("Callback for {} while waiting on {}", provider, p);
            }
            other => {
                return Err(Error::Other(format!("Sign-in already in progress: {:?}", other)));
            }
        }

        self.state = SignInState::CallbackReceived {
            provider,
            raw_url: raw_url.to_string(),
        };

        match self.run(provider, raw_url).await {
            Ok(user) => {
                self.state = SignInState::Authenticated {
                    user: user.clone(),
                    redirect_to: DEFAULT_AUTHENTICATED_ROUTE,
                };
                Ok(user)
            }
            Err(e) => {
                tracing::warn!("{} sign-in failed: {}", provider.display_name(), e);
                self.state = SignInState::Failed { message: e.user_message() };
                Err(e)
            }
        }
    }

    /// Leave `Failed` for `Idle` and return the route to show next.
    ///
    /// Does nothing and returns `None` from any other state.
    pub fn reset_after_failure(&mut self) -> Option<&'static str> {
        if !matches!(self.state, SignInState::Failed { .. }) {
            return None;
        }
        self.state = SignInState::Idle;
        self.expected_state = None;
        Some(SIGN_IN_ROUTE)
    }

    async fn run(&mut self, provider: Provider, raw_url: &str) -> Result<User> {
        let artifact = resolve_callback(provider, raw_url)?;

        if let Some(expected) = self.expected_state.as_deref() {
            if artifact.state.as_deref() != Some(expected) {
                return Err(Error::StateMismatch(provider));
            }
        }

        self.state = SignInState::ArtifactResolved(artifact.clone());
        tracing::debug!("Callback resolved for {}", provider);

        self.state = SignInState::Exchanging(provider);

        SessionExchanger::new(self.store).exchange(&artifact).await?;
        self.store
            .current_user()
            .ok_or_else(|| Error::Other("Session missing after sign-in".to_string()))
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.state {
            SignInState::Idle => Ok(()),
            ref other => Err(Error::Other(format!("Sign-in already in progress: {:?}", other))),
        }
    }
}
