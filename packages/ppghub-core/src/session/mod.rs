//! Session state, its store and the route guard reading it.

mod guard;
mod model;
mod store;

pub use guard::{guard, Route, RouteDecision};
pub use model::{transition, Session, SessionAction, SessionGrant, SessionState, UserIdentity};
pub use store::SessionStore;
