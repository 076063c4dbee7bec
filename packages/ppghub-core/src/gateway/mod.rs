//! Auth gateway: the stateless contract with the remote PPG Hub API.
//!
//! Provides the [`AuthGateway`] trait and its HTTP implementation.

mod client;
pub mod config;

pub use client::AuthClient;
pub use config::{load_api_config, ApiEndpointConfig, ConfigSource};

use crate::error::AuthError;
use crate::session::{SessionGrant, UserIdentity};
use serde::Serialize;
use std::fmt;
use std::future::Future;

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/register`.
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
}

impl RegisterRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Request/response contract with the remote authentication service.
///
/// Implementations own no session state; grants are handed back to the
/// caller, which passes them to the session store.
pub trait AuthGateway {
    /// Exchange an email/password pair for a grant.
    ///
    /// Fails with [`AuthError::InvalidCredentials`] when the pair is rejected.
    fn login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<SessionGrant, AuthError>> + Send;

    /// Create an account and return a grant for it.
    ///
    /// Fails with [`AuthError::ValidationFailure`] on e.g. a duplicate email.
    fn register(
        &self,
        request: &RegisterRequest,
    ) -> impl Future<Output = Result<SessionGrant, AuthError>> + Send;

    /// Best-effort server-side invalidation of `access_token`.
    fn logout(&self, access_token: &str) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Resolve the principal behind `access_token`.
    ///
    /// Fails with [`AuthError::Unauthorized`] when the token is invalid or expired.
    fn fetch_current_user(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<UserIdentity, AuthError>> + Send;
}
