//! Error taxonomy shared by the session store and the auth gateway.

use thiserror::Error;

/// Errors raised by session state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A mutator was handed malformed input. State is left unchanged.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: &'static str,
    },
    /// The persisted slot could not be decoded into a consistent state.
    #[error("corrupt session slot: {0}")]
    Corrupt(String),
}

/// Failures surfaced by the auth gateway and the sign-in flows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Wrong email/password pair.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    /// Request rejected by server-side validation (e.g. duplicate email).
    #[error("validation failed: {0}")]
    ValidationFailure(String),
    /// Transport, DNS, timeout or server-side failure.
    #[error("network failure: {0}")]
    NetworkFailure(String),
    /// The held access token is invalid or expired.
    #[error("unauthorized: session token rejected")]
    Unauthorized,
    /// The server returned a grant the session store refused.
    #[error("malformed grant: {0}")]
    MalformedGrant(#[from] SessionError),
}

impl AuthError {
    /// Whether the user can fix this by editing the form and resubmitting.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials(_) | AuthError::ValidationFailure(_)
        )
    }

    /// Message suitable for showing next to the triggering form.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials(msg) | AuthError::ValidationFailure(msg) => msg.clone(),
            AuthError::NetworkFailure(_) => {
                "Could not reach the PPG Hub service. Please try again.".to_string()
            }
            AuthError::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            AuthError::MalformedGrant(_) => {
                "The server returned an unexpected response. Please try again.".to_string()
            }
        }
    }
}
