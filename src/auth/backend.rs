//! Taskboard REST API client for authentication endpoints.
//!
//! This module provides:
//! - [`AuthBackend`] trait, the seam the session code talks through
//! - [`ApiClient`], the reqwest implementation
//! - Wire types shared by both

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, GENERIC_AUTH_FAILURE};
use crate::Result;
use super::provider::Provider;

/// Signed-in user as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl User {
    /// "First Last" when available, otherwise the username
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() { self.username.clone() } else { full }
    }
}

/// Body of `POST /api/auth/social/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialLoginRequest {
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Token pair plus user, returned by login, register and social login
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    data: User,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Authentication endpoints of the Taskboard backend
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Trade a provider token or code for Taskboard tokens.
    ///
    /// Failures are reported as `ExchangeFailed`.
    async fn social_login(&self, request: &SocialLoginRequest) -> Result<AuthResponse>;

    /// Fetch the user the access token belongs to
    async fn current_user(&self, access_token: &str) -> Result<User>;

    async fn password_login(&self, email: &str, password: &str) -> Result<AuthResponse>;

    async fn register(&self, username: &str, email: &str, password: &str) -> Result<AuthResponse>;

    /// Get a new access token for a refresh token
    async fn refresh(&self, refresh_token: &str) -> Result<String>;
}

/// reqwest-backed [`AuthBackend`]
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode a JSON success body
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> std::result::Result<T, Failure> {
        let response = request.send().await.map_err(|e| Failure::Transport(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Backend returned {}: {}", status, body);
            return Err(Failure::Rejected {
                status,
                message: error_message(status, &body),
            });
        }

        response.json::<T>().await.map_err(|e| Failure::Transport(e.to_string()))
    }
}

/// Why a backend call did not produce a usable body
#[derive(Debug)]
enum Failure {
    /// The request never got a response, or the body could not be read
    Transport(String),
    /// The backend answered with a non-2xx status
    Rejected { status: StatusCode, message: String },
}

impl Failure {
    fn message(self) -> String {
        match self {
            Failure::Transport(message) | Failure::Rejected { message, .. } => message,
        }
    }

    /// 401/403 become `Unauthorized`; anything else is a plain `Auth` error
    fn into_auth_error(self) -> Error {
        match self {
            Failure::Rejected { status, message }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                Error::Unauthorized(message)
            }
            other => Error::Auth(other.message()),
        }
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn social_login(&self, request: &SocialLoginRequest) -> Result<AuthResponse> {
        let req = self.client.post(self.endpoint("/api/auth/social/")).json(request);
        self.send(req).await.map_err(|f| Error::ExchangeFailed(f.message()))
    }

    async fn current_user(&self, access_token: &str) -> Result<User> {
        let req = self.client.get(self.endpoint("/api/auth/current/")).bearer_auth(access_token);
        let body: CurrentUserResponse = self.send(req).await.map_err(Failure::into_auth_error)?;
        Ok(body.data)
    }

    async fn password_login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let req = self
            .client
            .post(self.endpoint("/api/auth/login/"))
            .json(&LoginRequest { email, password });
        self.send(req).await.map_err(Failure::into_auth_error)
    }

    async fn register(&self, username: &str, email: &str, password: &str) -> Result<AuthResponse> {
        let req = self
            .client
            .post(self.endpoint("/api/auth/register/"))
            .json(&RegisterRequest { username, email, password });
        self.send(req).await.map_err(Failure::into_auth_error)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let req = self
            .client
            .post(self.endpoint("/api/auth/refresh/"))
            .json(&RefreshRequest { refresh: refresh_token });
        let body: RefreshResponse = self.send(req).await.map_err(Failure::into_auth_error)?;
        Ok(body.access)
    }
}

/// Pick the message to show for a failed response body.
///
/// Order: `error`, then `detail`, then the first message of the first field
/// error list, then a generic fallback.
fn error_message(status: StatusCode, body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return GENERIC_AUTH_FAILURE.to_string();
    };

    for key in ["error", "detail"] {
        if let Some(msg) = value.get(key).and_then(Value::as_str) {
            return msg.to_string();
        }
    }

    if let Some(obj) = value.as_object() {
        let field_message = obj.values().find_map(|v| match v {
            Value::Array(items) => items.iter().find_map(Value::as_str),
            Value::String(s) => Some(s.as_str()),
            _ => None,
        });
        if let Some(msg) = field_message {
            return msg.to_string();
        }
    }

    tracing::debug!("No message in {} response body", status);
    GENERIC_AUTH_FAILURE.to_string()
}

/// Fake backend for testing.
#[cfg(test)]
pub struct FakeBackend {
    pub social: std::sync::Mutex<std::collections::VecDeque<Result<AuthResponse>>>,
    pub users: std::collections::HashMap<String, User>,
    pub requests: std::sync::Mutex<Vec<SocialLoginRequest>>,
}

#[cfg(test)]
impl FakeBackend {
    pub fn new() -> Self {
        Self {
            social: std::sync::Mutex::new(Default::default()),
            users: Default::default(),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn user(id: i64, username: &str) -> User {
        User {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            first_name: None,
            last_name: None,
        }
    }

    /// Next social login succeeds with these tokens; the user is also
    /// recognised by `current_user` afterwards
    pub fn with_social_success(mut self, access: &str, refresh: &str, user: User) -> Self {
        self.users.insert(access.to_string(), user.clone());
        self.social.lock().unwrap().push_back(Ok(AuthResponse {
            access: access.to_string(),
            refresh: refresh.to_string(),
            user,
        }));
        self
    }

    pub fn with_social_failure(self, message: &str) -> Self {
        self.social
            .lock()
            .unwrap()
            .push_back(Err(Error::ExchangeFailed(message.to_string())));
        self
    }
}

#[cfg(test)]
#[async_trait]
impl AuthBackend for FakeBackend {
    async fn social_login(&self, request: &SocialLoginRequest) -> Result<AuthResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.social
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::ExchangeFailed(GENERIC_AUTH_FAILURE.to_string())))
    }

    async fn current_user(&self, access_token: &str) -> Result<User> {
        self.users
            .get(access_token)
            .cloned()
            .ok_or_else(|| Error::Unauthorized("Given token not valid for any token type".to_string()))
    }

    async fn password_login(&self, email: &str, _password: &str) -> Result<AuthResponse> {
        let user = self
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| Error::Auth("Invalid credentials".to_string()))?;
        Ok(AuthResponse {
            access: format!("access-{}", user.id),
            refresh: format!("refresh-{}", user.id),
            user,
        })
    }

    async fn register(&self, username: &str, _email: &str, _password: &str) -> Result<AuthResponse> {
        Ok(AuthResponse {
            access: format!("access-{username}"),
            refresh: format!("refresh-{username}"),
            user: Self::user(99, username),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        Ok(format!("{refresh_token}-renewed"))
    }
}
