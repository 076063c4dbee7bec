//! Session data model and the pure state-transition function.

use crate::error::SessionError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The authenticated principal as reported by the PPG Hub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    #[serde(rename = "nome")]
    pub display_name: String,
    pub email: String,
    /// Authorization labels. Order is irrelevant, only membership matters.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub roles: BTreeSet<String>,
}

/// The API sends `"roles": null` for accounts without roles.
fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl UserIdentity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Token + identity bundle returned by a successful login or register call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Seconds until the access token expires. Informational only.
    pub expires_in: u64,
    #[serde(rename = "usuario")]
    pub user: UserIdentity,
}

impl fmt::Debug for SessionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGrant")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// A complete credential triple. Either all of it is held or none of it.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user: UserIdentity,
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Current authentication state. Partial states are unrepresentable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    session: Option<Session>,
}

/// On-disk shape of the session slot.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    user: Option<UserIdentity>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl SessionState {
    /// The fully-absent state.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.refresh_token.as_str())
    }

    /// Serialize the whole state for the durable slot.
    pub fn to_slot(&self) -> Result<String, SessionError> {
        let persisted = match &self.session {
            Some(s) => PersistedState {
                user: Some(s.user.clone()),
                access_token: Some(s.access_token.clone()),
                refresh_token: Some(s.refresh_token.clone()),
            },
            None => PersistedState {
                user: None,
                access_token: None,
                refresh_token: None,
            },
        };
        serde_json::to_string(&persisted).map_err(|e| SessionError::Corrupt(e.to_string()))
    }

    /// Decode a durable slot. Anything but all-present or all-absent is corrupt.
    pub fn from_slot(raw: &str) -> Result<Self, SessionError> {
        let persisted: PersistedState =
            serde_json::from_str(raw).map_err(|e| SessionError::Corrupt(e.to_string()))?;

        match (
            persisted.user,
            persisted.access_token,
            persisted.refresh_token,
        ) {
            (None, None, None) => Ok(Self::empty()),
            (Some(user), Some(access_token), Some(refresh_token)) => {
                let session = Session {
                    user,
                    access_token,
                    refresh_token,
                };
                validate(&session)?;
                Ok(Self {
                    session: Some(session),
                })
            }
            _ => Err(SessionError::Corrupt(
                "slot holds a partial session".to_string(),
            )),
        }
    }
}

/// Mutations accepted by [`transition`].
#[derive(Debug, Clone)]
pub enum SessionAction {
    Login {
        access_token: String,
        refresh_token: String,
        user: UserIdentity,
    },
    Logout,
}

/// Compute the next state without touching storage.
///
/// Every action replaces the state wholesale; the current state is never
/// patched field by field.
pub fn transition(
    _current: &SessionState,
    action: SessionAction,
) -> Result<SessionState, SessionError> {
    match action {
        SessionAction::Login {
            access_token,
            refresh_token,
            user,
        } => {
            let session = Session {
                user,
                access_token,
                refresh_token,
            };
            validate(&session)?;
            Ok(SessionState {
                session: Some(session),
            })
        }
        SessionAction::Logout => Ok(SessionState::empty()),
    }
}

fn validate(session: &Session) -> Result<(), SessionError> {
    if session.access_token.trim().is_empty() {
        return Err(SessionError::InvalidInput {
            field: "access_token",
            reason: "must not be empty",
        });
    }
    if session.refresh_token.trim().is_empty() {
        return Err(SessionError::InvalidInput {
            field: "refresh_token",
            reason: "must not be empty",
        });
    }
    if session.user.email.trim().is_empty() {
        return Err(SessionError::InvalidInput {
            field: "user.email",
            reason: "must not be empty",
        });
    }
    if session.user.display_name.trim().is_empty() {
        return Err(SessionError::InvalidInput {
            field: "user.display_name",
            reason: "must not be empty",
        });
    }
    Ok(())
}
