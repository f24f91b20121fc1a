//! Federated sign-in for Taskboard
//!
//! This module provides:
//! - Provider registry for Google and GitHub
//! - Login initiation (authorization URL + browser navigation)
//! - Callback resolution from the redirect URL
//! - Session exchange with the Taskboard backend
//! - Session store with durable token storage and change notification
//! - A local callback server that captures provider redirects

mod provider;
mod initiator;
mod callback;
mod callback_server;
mod backend;
mod storage;
mod exchanger;
mod session;
mod flow;

pub use provider::{Provider, ProviderConfig, ProviderRegistry, ResponseMode};
pub use initiator::{BrowserNavigator, LoginInitiator, Navigator, PendingLogin};
pub use callback::{resolve_callback, resolve_query, CallbackArtifact, Credential};
pub use callback_server::wait_for_callback;
pub use backend::{ApiClient, AuthBackend, AuthResponse, SocialLoginRequest, User};
pub use storage::{
    credentials_path, FileTokenStorage, MemoryTokenStorage, SessionCredential, TokenStorage,
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
pub use exchanger::{SessionExchanger, DEFAULT_AUTHENTICATED_ROUTE};
pub use session::{Session, SessionState, SessionStore};
pub use flow::{SignInFlow, SignInState, FAILURE_REDIRECT_DELAY, SIGN_IN_ROUTE};
