//! PPG Hub Core Library
//!
//! Client-side session and credential lifecycle for the PPG Hub API:
//! - Session store (who is logged in, durable across restarts, observable)
//! - Auth gateway (login, register, logout, current user over HTTP)
//! - Session storage (keyring with file fallback, or in-memory)
//!
//! # Features
//!
//! - `keyring-storage` (default): Use platform keyring for the session slot
//! - `file-storage`: Use file-based session storage (for headless Linux)
//!
//! # Example
//!
//! ```no_run
//! use ppghub_core::{flow, gateway, session, storage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut store = session::SessionStore::open(storage::default_storage()?);
//!     let client = gateway::AuthClient::from_env()?;
//!
//!     if !store.is_authenticated() {
//!         let request = gateway::LoginRequest::new("ana@ppg.br", "s3cret");
//!         flow::sign_in(&client, &mut store, request).await?;
//!     }
//!
//!     println!("Logged in as {:?}", store.user().map(|u| &u.display_name));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod flow;
pub mod gateway;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use error::{AuthError, SessionError};
pub use flow::{SessionValidation, SignOutOutcome};
pub use gateway::{AuthClient, AuthGateway, LoginRequest, RegisterRequest};
pub use session::{SessionGrant, SessionState, SessionStore, UserIdentity};
pub use storage::{MemoryStorage, SessionStorage};
