use super::config::{load_api_config, ApiEndpointConfig};
use super::{AuthGateway, LoginRequest, RegisterRequest};
use crate::error::AuthError;
use crate::session::{SessionGrant, SessionState, UserIdentity};
use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// HTTP implementation of [`AuthGateway`] against the PPG Hub REST API.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

/// Gateway call being mapped, since the same status means different things
/// per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Login,
    Register,
    Logout,
    CurrentUser,
    Resource,
}

/// Standard error body returned by the API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl AuthClient {
    pub fn new(config: &ApiEndpointConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// Client for the endpoint resolved from environment/config file/defaults.
    pub fn from_env() -> Result<Self> {
        Self::new(&load_api_config())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build a request against `path` carrying the session's bearer token.
    ///
    /// Fails with [`AuthError::Unauthorized`] when no one is logged in.
    pub fn authorized(
        &self,
        method: Method,
        path: &str,
        state: &SessionState,
    ) -> Result<RequestBuilder, AuthError> {
        let token = state.access_token().ok_or(AuthError::Unauthorized)?;
        Ok(self.bearer(method, path, token))
    }

    fn bearer(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http.request(method, self.url(path)).bearer_auth(token)
    }

    /// Send an authorized GET and decode the JSON body.
    pub async fn get_json(
        &self,
        path: &str,
        state: &SessionState,
    ) -> Result<serde_json::Value, AuthError> {
        let request = self.authorized(Method::GET, path, state)?;
        let resp = send(request).await?;
        check(Operation::Resource, resp).await?.json().await.map_err(decode_failure)
    }
}

impl AuthGateway for AuthClient {
    async fn login(&self, request: &LoginRequest) -> Result<SessionGrant, AuthError> {
        tracing::debug!("Logging in as {}", request.email);
        let resp = send(self.http.post(self.url("auth/login")).json(request)).await?;
        decode(Operation::Login, resp).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<SessionGrant, AuthError> {
        tracing::debug!("Registering account for {}", request.email);
        let resp = send(self.http.post(self.url("auth/register")).json(request)).await?;
        decode(Operation::Register, resp).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let resp = send(self.bearer(Method::POST, "auth/logout", access_token)).await?;
        check(Operation::Logout, resp).await.map(|_| ())
    }

    async fn fetch_current_user(&self, access_token: &str) -> Result<UserIdentity, AuthError> {
        let resp = send(self.bearer(Method::GET, "usuarios/me", access_token)).await?;
        decode(Operation::CurrentUser, resp).await
    }
}

async fn send(request: RequestBuilder) -> Result<Response, AuthError> {
    request.send().await.map_err(|e| {
        tracing::debug!("Request failed before a response: {}", e);
        AuthError::NetworkFailure(e.to_string())
    })
}

/// Pass successful responses through, map the rest to [`AuthError`].
async fn check(op: Operation, resp: Response) -> Result<Response, AuthError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify(op, status, error_message(&body)))
}

async fn decode<T: DeserializeOwned>(op: Operation, resp: Response) -> Result<T, AuthError> {
    check(op, resp).await?.json::<T>().await.map_err(decode_failure)
}

fn decode_failure(e: reqwest::Error) -> AuthError {
    AuthError::NetworkFailure(format!("unexpected response: {}", e))
}

/// Pull the human-readable message out of an API error body.
fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.error)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

fn classify(op: Operation, status: StatusCode, message: Option<String>) -> AuthError {
    let code = status.as_u16();
    match (op, code) {
        (Operation::Login, 400 | 401 | 403) => AuthError::InvalidCredentials(
            message.unwrap_or_else(|| "Invalid email or password".to_string()),
        ),
        (Operation::Register, 400 | 409 | 422) => AuthError::ValidationFailure(
            message.unwrap_or_else(|| "Registration rejected".to_string()),
        ),
        (Operation::Logout | Operation::CurrentUser | Operation::Resource, 401 | 403) => {
            AuthError::Unauthorized
        }
        _ => {
            tracing::debug!("{:?} returned unexpected status {}", op, code);
            AuthError::NetworkFailure(match message {
                Some(m) => format!("server returned {}: {}", status, m),
                None => format!("server returned {}", status),
            })
        }
    }
}
