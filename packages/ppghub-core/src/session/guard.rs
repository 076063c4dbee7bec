//! Route gating on top of the session store.
//!
//! The guard only reads `is_authenticated()`; it never mutates the session.

use super::store::SessionStore;
use crate::storage::SessionStorage;

/// Screens of the PPG Hub client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Register,
    Dashboard,
    NotFound,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Route::Landing,
            "/login" => Route::Login,
            "/register" => Route::Register,
            "/dashboard" => Route::Dashboard,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/dashboard",
            Route::NotFound => "/404",
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard)
    }
}

/// What the router should do with a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Render(Route),
    Redirect(Route),
}

pub fn guard<S: SessionStorage>(store: &SessionStore<S>, route: Route) -> RouteDecision {
    let authenticated = store.is_authenticated();
    match route {
        r if r.is_protected() && !authenticated => RouteDecision::Redirect(Route::Login),
        Route::Login | Route::Register if authenticated => RouteDecision::Redirect(Route::Dashboard),
        r => RouteDecision::Render(r),
    }
}
