//! The session store: single owner of the current [`SessionState`].
//!
//! Mutators run the pure [`transition`], write the full state through the
//! persistence port, commit it in memory and broadcast it, all before
//! returning. Reads never suspend.

use super::model::{transition, SessionAction, SessionGrant, SessionState, UserIdentity};
use crate::error::SessionError;
use crate::storage::SessionStorage;
use tokio::sync::watch;

pub struct SessionStore<S: SessionStorage> {
    state: SessionState,
    storage: S,
    updates: watch::Sender<SessionState>,
}

impl<S: SessionStorage> SessionStore<S> {
    /// Rehydrate from durable storage. A missing, unreadable or corrupt slot
    /// yields the empty state.
    pub fn open(storage: S) -> Self {
        let state = rehydrate(&storage);
        let (updates, _) = watch::channel(state.clone());
        Self {
            state,
            storage,
            updates,
        }
    }

    /// Replace the whole session with the given credentials.
    ///
    /// On error the current state is left untouched.
    pub fn login(
        &mut self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        user: UserIdentity,
    ) -> Result<(), SessionError> {
        let next = transition(
            &self.state,
            SessionAction::Login {
                access_token: access_token.into(),
                refresh_token: refresh_token.into(),
                user,
            },
        )?;
        self.commit(next);
        if let Some(user) = self.state.user() {
            tracing::info!("Session started for user: {}", user.email);
        }
        Ok(())
    }

    /// Hand a gateway grant to [`login`](Self::login) unmodified.
    pub fn login_with_grant(&mut self, grant: &SessionGrant) -> Result<(), SessionError> {
        self.login(
            grant.access_token.clone(),
            grant.refresh_token.clone(),
            grant.user.clone(),
        )
    }

    /// Reset to the fully-absent state. Idempotent.
    pub fn logout(&mut self) {
        let was_authenticated = self.state.is_authenticated();
        // Logout cannot fail validation.
        let next = transition(&self.state, SessionAction::Logout).unwrap_or_default();
        self.commit(next);
        if was_authenticated {
            tracing::info!("Session cleared");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.state.user()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.state.access_token()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.state.refresh_token()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Receive every committed state, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.updates.subscribe()
    }

    fn commit(&mut self, next: SessionState) {
        self.persist(&next);
        self.state = next;
        self.updates.send_replace(self.state.clone());
    }

    fn persist(&self, state: &SessionState) {
        let raw = match state.to_slot() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize session, storage not updated: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.write_slot(&raw) {
            tracing::warn!("Failed to persist session ({}): {:#}", self.storage.describe(), e);
        }
    }
}

fn rehydrate<S: SessionStorage>(storage: &S) -> SessionState {
    match storage.read_slot() {
        Ok(Some(raw)) => match SessionState::from_slot(&raw) {
            Ok(state) => {
                if let Some(user) = state.user() {
                    tracing::debug!("Rehydrated session for user: {}", user.email);
                }
                state
            }
            Err(e) => {
                tracing::warn!("Discarding unreadable session slot: {}", e);
                if let Err(e) = storage.clear_slot() {
                    tracing::warn!("Failed to remove corrupt session slot: {:#}", e);
                }
                SessionState::empty()
            }
        },
        Ok(None) => {
            tracing::debug!("No persisted session found");
            SessionState::empty()
        }
        Err(e) => {
            tracing::warn!("Failed to read session slot, starting logged out: {:#}", e);
            SessionState::empty()
        }
    }
}
