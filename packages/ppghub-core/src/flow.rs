//! Sign-in, sign-up, sign-out and startup validation.
//!
//! Each flow calls the gateway first and touches the store only after the
//! call resolves, so dropping a flow's future before the gateway answers
//! leaves the session as it was.

use crate::error::AuthError;
use crate::gateway::{AuthGateway, LoginRequest, RegisterRequest};
use crate::session::{SessionGrant, SessionStore, UserIdentity};
use crate::storage::SessionStorage;

/// Result of the server-side half of a sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutOutcome {
    /// Server confirmed the token was invalidated.
    Invalidated,
    /// Local session cleared, server call failed.
    ServerFailed(AuthError),
    /// There was no session to sign out of.
    NotLoggedIn,
}

/// Result of checking a rehydrated session against the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValidation {
    /// No session held locally.
    Anonymous,
    /// Server accepted the token.
    Valid(UserIdentity),
    /// Server rejected the token; the local session was cleared.
    Revoked,
    /// Server could not be asked, or its answer could not be stored; the
    /// local session was kept.
    Unverified(String),
}

fn adopt_grant<S: SessionStorage>(
    store: &mut SessionStore<S>,
    grant: SessionGrant,
) -> Result<UserIdentity, AuthError> {
    store.login_with_grant(&grant)?;
    Ok(grant.user)
}

/// Log in with email/password and hand the grant to the store.
pub async fn sign_in<G: AuthGateway, S: SessionStorage>(
    gateway: &G,
    store: &mut SessionStore<S>,
    request: LoginRequest,
) -> Result<UserIdentity, AuthError> {
    let grant = gateway.login(&request).await?;
    tracing::debug!(
        "Login grant received ({} token, expires in {}s)",
        grant.token_type,
        grant.expires_in
    );
    adopt_grant(store, grant)
}

/// Register an account; the new account is immediately logged in.
pub async fn sign_up<G: AuthGateway, S: SessionStorage>(
    gateway: &G,
    store: &mut SessionStore<S>,
    request: RegisterRequest,
) -> Result<UserIdentity, AuthError> {
    let grant = gateway.register(&request).await?;
    tracing::info!("Account created for {}", grant.user.email);
    adopt_grant(store, grant)
}

/// Clear the local session, then tell the server.
///
/// Local clearing never depends on the server call.
pub async fn sign_out<G: AuthGateway, S: SessionStorage>(
    gateway: &G,
    store: &mut SessionStore<S>,
) -> SignOutOutcome {
    let Some(token) = store.access_token().map(str::to_owned) else {
        store.logout();
        return SignOutOutcome::NotLoggedIn;
    };

    store.logout();

    match gateway.logout(&token).await {
        Ok(()) => SignOutOutcome::Invalidated,
        Err(e) => {
            tracing::warn!("Server-side logout failed: {}", e);
            SignOutOutcome::ServerFailed(e)
        }
    }
}

/// Confirm a rehydrated session is still accepted by the server.
///
/// A rejected token clears the session. Transport failures keep it, since
/// the next authorized call will surface a real rejection anyway.
pub async fn validate_session<G: AuthGateway, S: SessionStorage>(
    gateway: &G,
    store: &mut SessionStore<S>,
) -> SessionValidation {
    let Some(token) = store.access_token().map(str::to_owned) else {
        return SessionValidation::Anonymous;
    };

    match gateway.fetch_current_user(&token).await {
        Ok(user) => {
            if store.user() != Some(&user) {
                tracing::info!("Refreshing stored identity for {}", user.email);
                let refresh = store.refresh_token().unwrap_or_default().to_owned();
                if let Err(e) = store.login(token, refresh, user.clone()) {
                    tracing::warn!("Server identity rejected by session store: {}", e);
                    return SessionValidation::Unverified(e.to_string());
                }
            }
            SessionValidation::Valid(user)
        }
        Err(AuthError::Unauthorized) => {
            tracing::warn!("Token rejected by server, clearing session");
            store.logout();
            SessionValidation::Revoked
        }
        Err(e) => {
            tracing::info!("Could not verify session ({}), keeping it", e);
            SessionValidation::Unverified(e.to_string())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeGateway;
    use super::*;
    use crate::storage::MemoryStorage;

    fn ana() -> UserIdentity {
        UserIdentity {
            id: 7,
            display_name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            roles: ["STUDENT".to_string()].into(),
        }
    }

    #[tokio::test]
    async fn test_sign_in_success() {
        let gateway = FakeGateway::with_account("ana@x.com", "s3cret", ana());
        let mut store = SessionStore::open(MemoryStorage::new());

        let user = sign_in(&gateway, &mut store, LoginRequest::new("ana@x.com", "s3cret"))
            .await
            .unwrap();
        assert_eq!(user, ana());
        assert!(store.is_authenticated());
        assert_eq!(store.user(), Some(&ana()));
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password_leaves_store_empty() {
        let gateway = FakeGateway::with_account("ana@x.com", "s3cret", ana());
        let mut store = SessionStore::open(MemoryStorage::new());

        let err = sign_in(&gateway, &mut store, LoginRequest::new("ana@x.com", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert!(err.is_user_correctable());
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_in_offline() {
        let gateway = FakeGateway::offline();
        let mut store = SessionStore::open(MemoryStorage::new());
        let err = sign_in(&gateway, &mut store, LoginRequest::new("ana@x.com", "s3cret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NetworkFailure(_)));
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_up_logs_in_new_account() {
        let gateway = FakeGateway::default();
        let mut store = SessionStore::open(MemoryStorage::new());

        let user = sign_up(
            &gateway,
            &mut store,
            RegisterRequest::new("Bruno", "bruno@x.com", "pw"),
        )
        .await
        .unwrap();
        assert_eq!(user.display_name, "Bruno");
        assert_eq!(store.user(), Some(&user));

        let mut other = SessionStore::open(MemoryStorage::new());
        let err = sign_up(
            &gateway,
            &mut other,
            RegisterRequest::new("Bruno 2", "bruno@x.com", "pw"),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            AuthError::ValidationFailure("Email já cadastrado".to_string())
        );
        assert!(!other.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_server_fails() {
        let storage = MemoryStorage::new();
        let mut store = SessionStore::open(storage.clone());
        store.login("acc1", "ref1", ana()).unwrap();

        let gateway = FakeGateway::offline();
        let outcome = sign_out(&gateway, &mut store).await;
        assert!(matches!(outcome, SignOutOutcome::ServerFailed(_)));
        assert!(!store.is_authenticated());
        assert_eq!(*gateway.logout_calls.lock().unwrap(), vec!["acc1".to_string()]);

        let reopened = SessionStore::open(storage);
        assert!(!reopened.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_out_invalidates_server_token() {
        let gateway = FakeGateway::with_account("ana@x.com", "s3cret", ana());
        let mut store = SessionStore::open(MemoryStorage::new());
        sign_in(&gateway, &mut store, LoginRequest::new("ana@x.com", "s3cret"))
            .await
            .unwrap();
        let token = store.access_token().unwrap().to_string();

        assert_eq!(sign_out(&gateway, &mut store).await, SignOutOutcome::Invalidated);
        assert_eq!(
            gateway.fetch_current_user(&token).await,
            Err(AuthError::Unauthorized)
        );
        assert_eq!(sign_out(&gateway, &mut store).await, SignOutOutcome::NotLoggedIn);
    }

    #[tokio::test]
    async fn test_validate_session_outcomes() {
        let gateway = FakeGateway::with_account("ana@x.com", "s3cret", ana());
        let mut store = SessionStore::open(MemoryStorage::new());
        assert_eq!(
            validate_session(&gateway, &mut store).await,
            SessionValidation::Anonymous
        );

        sign_in(&gateway, &mut store, LoginRequest::new("ana@x.com", "s3cret"))
            .await
            .unwrap();
        assert_eq!(
            validate_session(&gateway, &mut store).await,
            SessionValidation::Valid(ana())
        );

        gateway.revoke_all();
        assert_eq!(
            validate_session(&gateway, &mut store).await,
            SessionValidation::Revoked
        );
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_validate_session_keeps_session_when_offline() {
        let mut store = SessionStore::open(MemoryStorage::new());
        store.login("acc1", "ref1", ana()).unwrap();

        let outcome = validate_session(&FakeGateway::offline(), &mut store).await;
        assert!(matches!(outcome, SessionValidation::Unverified(_)));
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_validate_session_refreshes_identity() {
        let gateway = FakeGateway::with_account("ana@x.com", "s3cret", ana());
        let mut store = SessionStore::open(MemoryStorage::new());
        sign_in(&gateway, &mut store, LoginRequest::new("ana@x.com", "s3cret"))
            .await
            .unwrap();
        let token = store.access_token().unwrap().to_string();

        gateway.rename("ana@x.com", "Ana Souza");
        let outcome = validate_session(&gateway, &mut store).await;
        let SessionValidation::Valid(user) = outcome else {
            panic!("expected a valid session, got {:?}", outcome);
        };
        assert_eq!(user.display_name, "Ana Souza");
        assert_eq!(store.user().unwrap().display_name, "Ana Souza");
        assert_eq!(store.access_token(), Some(token.as_str()));
        assert_eq!(store.refresh_token(), Some("refresh-7"));
    }

    #[tokio::test]
    async fn test_validate_session_keeps_stored_identity_when_refresh_is_invalid() {
        let gateway = FakeGateway::with_account("ana@x.com", "s3cret", ana());
        let mut store = SessionStore::open(MemoryStorage::new());
        sign_in(&gateway, &mut store, LoginRequest::new("ana@x.com", "s3cret"))
            .await
            .unwrap();

        gateway.rename("ana@x.com", "  ");
        let outcome = validate_session(&gateway, &mut store).await;
        assert!(matches!(outcome, SessionValidation::Unverified(_)));
        assert_eq!(store.user(), Some(&ana()));
        assert!(store.is_authenticated());
    }
}
