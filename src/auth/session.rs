//! Session store - the single owner of the signed-in session
//!
//! Initialization order is: read durable storage, fetch the current user if a
//! token pair was found, then publish. Every change replaces the whole
//! [`SessionState`] on a `watch` channel, so subscribers see either the old
//! session or the new one, never a mix.

use std::sync::Arc;
use tokio::sync::watch;
use crate::Result;
use crate::error::Error;
use super::backend::{AuthBackend, AuthResponse, User};
use super::storage::{SessionCredential, TokenStorage};

/// Credentials and the user they belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credential: SessionCredential,
    pub user: User,
}

/// Snapshot published to subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(Arc<Session>),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(session) => Some(&session.user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Process-wide session holder, passed by reference to whoever needs it
pub struct SessionStore<B, S> {
    backend: B,
    storage: S,
    state: watch::Sender<SessionState>,
}

impl<B: AuthBackend, S: TokenStorage> SessionStore<B, S> {
    /// Create an unauthenticated store; call [`SessionStore::initialize`] next
    pub fn new(backend: B, storage: S) -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self { backend, storage, state }
    }

    /// Create and initialize from durable storage
    pub async fn open(backend: B, storage: S) -> Result<Self> {
        let store = Self::new(backend, storage);
        store.initialize().await?;
        Ok(store)
    }

    /// Restore the session from storage.
    ///
    /// A stored pair the backend rejects is discarded. Any other failure to
    /// fetch the user starts the store anonymous but leaves storage untouched.
    pub async fn initialize(&self) -> Result<()> {
        let Some(credential) = self.storage.load()? else {
            tracing::debug!("No stored session");
            self.publish(SessionState::Anonymous);
            return Ok(());
        };

        match self.backend.current_user(&credential.access_token).await {
            Ok(user) => {
                tracing::info!("Restored session for {}", user.username);
                self.publish(SessionState::Authenticated(Arc::new(Session { credential, user })));
            }
            Err(Error::Unauthorized(reason)) => {
                tracing::warn!("Stored session rejected ({}), signing out", reason);
                self.storage.clear()?;
                self.publish(SessionState::Anonymous);
            }
            Err(e) => {
                // Keep the pair on disk; the backend may just be unreachable
                tracing::warn!("Could not restore session: {}", e);
                self.publish(SessionState::Anonymous);
            }
        }
        Ok(())
    }

    /// Persist a new token pair and make it the current session
    pub fn login(&self, credential: SessionCredential, user: User) -> Result<Arc<Session>> {
        self.storage.store(&credential)?;
        let session = Arc::new(Session { credential, user });
        tracing::info!("Signed in as {}", session.user.username);
        self.publish(SessionState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Clear durable storage and in-memory state
    pub fn logout(&self) -> Result<()> {
        self.storage.clear()?;
        self.publish(SessionState::Anonymous);
        tracing::info!("Signed out");
        Ok(())
    }

    /// Sign in with email and password
    pub async fn password_login(&self, email: &str, password: &str) -> Result<Arc<Session>> {
        let response = self.backend.password_login(email, password).await?;
        self.login_with(response)
    }

    /// Create an account and sign in with it
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Arc<Session>> {
        let response = self.backend.register(username, email, password).await?;
        self.login_with(response)
    }

    /// Swap the access token for a fresh one, keeping the refresh token
    pub async fn refresh_access(&self) -> Result<Arc<Session>> {
        let current = match self.state() {
            SessionState::Authenticated(session) => session,
            SessionState::Anonymous => {
                return Err(Error::Auth("Not signed in".to_string()));
            }
        };

        let access = self.backend.refresh(&current.credential.refresh_token).await?;
        let credential = SessionCredential::new(access, current.credential.refresh_token.clone());
        self.login(credential, current.user.clone())
    }

    pub(crate) fn login_with(&self, response: AuthResponse) -> Result<Arc<Session>> {
        let credential = SessionCredential::new(response.access, response.refresh);
        self.login(credential, response.user)
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receive every session change from now on
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn publish(&self, next: SessionState) {
        self.state.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::backend::FakeBackend;
    use crate::auth::storage::{
        FileTokenStorage, MemoryTokenStorage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
    };
    use tokio_test::{assert_err, assert_ok};

    fn backend_knowing(access: &str) -> FakeBackend {
        let mut backend = FakeBackend::new();
        backend.users.insert(access.to_string(), FakeBackend::user(1, "ada"));
        backend
    }

    #[tokio::test]
    async fn test_initialize_without_tokens() {
        let store = SessionStore::open(FakeBackend::new(), MemoryTokenStorage::new()).await.unwrap();
        assert_eq!(store.state(), SessionState::Anonymous);
        assert!(store.current_user().is_none());
    }

    #[tokio::test]
    async fn test_initialize_restores_user() {
        let storage = MemoryTokenStorage::new();
        storage.store(&SessionCredential::new("acc", "ref")).unwrap();

        let store = SessionStore::open(backend_knowing("acc"), storage).await.unwrap();
        assert_eq!(store.current_user().map(|u| u.username), Some("ada".to_string()));
    }

    #[tokio::test]
    async fn test_initialize_discards_rejected_tokens() {
        let storage = MemoryTokenStorage::new();
        storage.store(&SessionCredential::new("stale", "ref")).unwrap();

        let store = SessionStore::open(FakeBackend::new(), storage).await.unwrap();
        assert!(!store.state().is_authenticated());
        assert!(store.storage.get(ACCESS_TOKEN_KEY).is_none());
    }

    #[tokio::test]
    async fn test_initialize_keeps_tokens_when_backend_unreachable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let storage = FileTokenStorage::new(&path);
        storage.store(&SessionCredential::new("good-access", "good-refresh")).unwrap();

        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = crate::auth::backend::ApiClient::new(&format!("http://{addr}"));
        let store = SessionStore::open(backend, FileTokenStorage::new(&path)).await.unwrap();

        assert!(!store.state().is_authenticated());
        assert!(path.exists());
        assert_eq!(
            store.storage().load().unwrap(),
            Some(SessionCredential::new("good-access", "good-refresh"))
        );
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let store = SessionStore::new(FakeBackend::new(), FileTokenStorage::new(&path));

        assert_ok!(store.login(SessionCredential::new("a", "r"), FakeBackend::user(1, "ada")));
        assert!(path.exists());

        assert_ok!(store.logout());
        assert!(!path.exists());
        assert!(store.current_user().is_none());

        let memory = SessionStore::new(FakeBackend::new(), MemoryTokenStorage::new());
        memory.login(SessionCredential::new("a", "r"), FakeBackend::user(1, "ada")).unwrap();
        memory.logout().unwrap();
        assert!(memory.storage.get(ACCESS_TOKEN_KEY).is_none());
        assert!(memory.storage.get(REFRESH_TOKEN_KEY).is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_whole_snapshots() {
        let store = SessionStore::new(FakeBackend::new(), MemoryTokenStorage::new());
        let mut rx = store.subscribe();

        store.login(SessionCredential::new("a1", "r1"), FakeBackend::user(1, "ada")).unwrap();
        rx.changed().await.unwrap();
        match &*rx.borrow_and_update() {
            SessionState::Authenticated(session) => {
                assert_eq!(session.credential.access_token, "a1");
                assert_eq!(session.user.username, "ada");
            }
            other => panic!("unexpected state: {other:?}"),
        }

        store.login(SessionCredential::new("a2", "r2"), FakeBackend::user(2, "grace")).unwrap();
        rx.changed().await.unwrap();
        match &*rx.borrow_and_update() {
            SessionState::Authenticated(session) => {
                assert_eq!(session.credential.access_token, "a2");
                assert_eq!(session.user.username, "grace");
            }
            other => panic!("unexpected state: {other:?}"),
        }

        store.logout().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_password_login_and_register() {
        let mut backend = FakeBackend::new();
        backend.users.insert("x".to_string(), FakeBackend::user(5, "linus"));
        let store = SessionStore::new(backend, MemoryTokenStorage::new());

        assert_err!(store.password_login("nobody@example.com", "pw").await);
        assert!(!store.state().is_authenticated());

        let session = store.password_login("linus@example.com", "pw").await.unwrap();
        assert_eq!(session.credential.access_token, "access-5");
        assert_eq!(store.storage.get(REFRESH_TOKEN_KEY).as_deref(), Some("refresh-5"));

        let session = store.register("barbara", "b@example.com", "pw").await.unwrap();
        assert_eq!(session.user.username, "barbara");
        assert_eq!(store.storage.get(ACCESS_TOKEN_KEY).as_deref(), Some("access-barbara"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token() {
        let store = SessionStore::new(FakeBackend::new(), MemoryTokenStorage::new());
        assert_err!(store.refresh_access().await);

        store.login(SessionCredential::new("a", "r"), FakeBackend::user(1, "ada")).unwrap();
        let session = store.refresh_access().await.unwrap();
        assert_eq!(session.credential, SessionCredential::new("r-renewed", "r"));
        assert_eq!(store.storage.get(ACCESS_TOKEN_KEY).as_deref(), Some("r-renewed"));
    }
}
